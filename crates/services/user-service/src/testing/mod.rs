//! Test substitutes for the user store.
//!
//! The user repository contract is re-anchored here, in the consumer's own
//! scope, so test code depends on this module rather than on the contract's
//! definition site:
//!
//! - [`MockUserStore`] is generated from a re-declaration of the full
//!   [`UserRepository`] signature set. The re-declaration must stay in
//!   lockstep with the trait: if an operation is added, removed, or reshaped
//!   upstream, this module stops compiling, which is the intended signal.
//! - [`FakeUserStore`] is a stateful in-memory implementation for
//!   integration-style tests that want real data flow without a database.

pub use crate::repository::UserRepository;

mod fake;

pub use fake::FakeUserStore;

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use common::AppResult;
    use domain::{Platform, User};

    use super::UserRepository;

    mockall::mock! {
        /// Expectation-based substitute for the user store.
        ///
        /// Mirrors every operation of [`UserRepository`], no more, no fewer.
        pub UserStore {}

        #[async_trait]
        impl UserRepository for UserStore {
            async fn upsert(&self, user: User) -> AppResult<User>;
            async fn update(&self, user: &User) -> AppResult<()>;
            async fn delete(&self, id: Uuid) -> AppResult<()>;
            async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
            async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;
            async fn find_by_platform_id(
                &self,
                platform: Platform,
                platform_id: &str,
            ) -> AppResult<Option<User>>;
            async fn find_by_platform_username(
                &self,
                platform: Platform,
                username: &str,
            ) -> AppResult<Option<User>>;
            async fn list_recently_active(&self, limit: u64) -> AppResult<Vec<User>>;
            async fn touch_last_seen(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()>;
            async fn merge(&self, primary: &User, secondary_id: Uuid) -> AppResult<()>;
            async fn last_cooldown(
                &self,
                user_id: Uuid,
                action: &str,
            ) -> AppResult<Option<DateTime<Utc>>>;
            async fn update_cooldown(
                &self,
                user_id: Uuid,
                action: &str,
                at: DateTime<Utc>,
            ) -> AppResult<()>;
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockUserStore;
