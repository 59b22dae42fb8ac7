//! User service - Handles user-related business logic.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use common::{AppError, AppResult, OptionExt};
use domain::{
    NewUser, Platform, User, MAX_RECENTLY_ACTIVE, MAX_USERNAME_LENGTH, MIN_USERNAME_LENGTH,
};

use crate::repository::UserRepository;

/// User service trait for dependency injection.
#[async_trait]
pub trait UserService: Send + Sync {
    /// Register a new user from a platform identity
    async fn register_user(&self, new_user: NewUser) -> AppResult<User>;

    /// Record activity from a platform identity, auto-registering unknown users
    async fn track_activity(
        &self,
        platform: Platform,
        platform_id: &str,
        username: &str,
    ) -> AppResult<User>;

    /// Get user by internal ID
    async fn get_user(&self, id: Uuid) -> AppResult<User>;

    /// Find a user by their external platform ID
    async fn find_by_platform_id(
        &self,
        platform: Platform,
        platform_id: &str,
    ) -> AppResult<Option<User>>;

    /// Get a user by username, restricted to users linked on a platform
    async fn get_by_platform_username(
        &self,
        platform: Platform,
        username: &str,
    ) -> AppResult<User>;

    /// Change a user's display username
    async fn rename_user(&self, id: Uuid, username: String) -> AppResult<User>;

    /// Delete a user account
    async fn delete_user(&self, id: Uuid) -> AppResult<()>;

    /// Merge the secondary account into the primary and delete the secondary
    async fn merge_users(&self, primary_id: Uuid, secondary_id: Uuid) -> AppResult<User>;

    /// Remove a platform link from a user
    async fn unlink_platform(&self, user_id: Uuid, platform: Platform) -> AppResult<User>;

    /// Platforms linked to the account that owns a platform identity
    async fn linked_platforms(
        &self,
        platform: Platform,
        platform_id: &str,
    ) -> AppResult<Vec<Platform>>;

    /// Most recently active users, capped at the domain limit
    async fn recently_active(&self, limit: u64) -> AppResult<Vec<User>>;

    /// Gate a rate-limited action: errors while the cooldown window is open,
    /// otherwise records the new timestamp.
    async fn begin_action(&self, user_id: Uuid, action: &str, window: Duration) -> AppResult<()>;
}

/// Concrete implementation of UserService using the repository contract.
pub struct UserManager {
    repo: Arc<dyn UserRepository>,
}

impl UserManager {
    /// Create new user service instance with repository
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    /// Trim surrounding whitespace and enforce the length bounds. Length is
    /// counted in characters, not bytes, so multibyte names get the same
    /// limit. The trimmed name is what gets stored.
    fn validate_username(username: &str) -> AppResult<String> {
        let trimmed = username.trim();
        let length = trimmed.chars().count();
        if length < MIN_USERNAME_LENGTH {
            return Err(AppError::validation("Username must not be empty"));
        }
        if length > MAX_USERNAME_LENGTH {
            return Err(AppError::validation(format!(
                "Username must be at most {} characters",
                MAX_USERNAME_LENGTH
            )));
        }
        Ok(trimmed.to_string())
    }
}

#[async_trait]
impl UserService for UserManager {
    async fn register_user(&self, new_user: NewUser) -> AppResult<User> {
        let username = Self::validate_username(&new_user.username)?;
        if new_user.platform_id.is_empty() {
            return Err(AppError::validation("Platform ID must not be empty"));
        }

        if self
            .repo
            .find_by_platform_id(new_user.platform, &new_user.platform_id)
            .await?
            .is_some()
        {
            return Err(AppError::conflict("Platform link"));
        }
        if self.repo.find_by_username(&username).await?.is_some() {
            return Err(AppError::conflict("Username"));
        }

        let user = User::new(username, new_user.platform, new_user.platform_id);
        let user = self.repo.upsert(user).await?;

        tracing::info!(
            user_id = %user.id,
            username = %user.username,
            platform = %new_user.platform,
            "User registered"
        );
        Ok(user)
    }

    async fn track_activity(
        &self,
        platform: Platform,
        platform_id: &str,
        username: &str,
    ) -> AppResult<User> {
        if let Some(mut user) = self.repo.find_by_platform_id(platform, platform_id).await? {
            let now = Utc::now();
            self.repo.touch_last_seen(user.id, now).await?;
            user.last_seen_at = now;
            tracing::debug!(user_id = %user.id, platform = %platform, "Activity recorded");
            return Ok(user);
        }

        tracing::info!(
            platform = %platform,
            username = %username,
            "Unknown platform identity, auto-registering"
        );
        self.register_user(NewUser {
            platform,
            platform_id: platform_id.to_string(),
            username: username.to_string(),
        })
        .await
    }

    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.repo.find_by_id(id).await?.ok_or_not_found()
    }

    async fn find_by_platform_id(
        &self,
        platform: Platform,
        platform_id: &str,
    ) -> AppResult<Option<User>> {
        self.repo.find_by_platform_id(platform, platform_id).await
    }

    async fn get_by_platform_username(
        &self,
        platform: Platform,
        username: &str,
    ) -> AppResult<User> {
        self.repo
            .find_by_platform_username(platform, username)
            .await?
            .ok_or_not_found()
    }

    async fn rename_user(&self, id: Uuid, username: String) -> AppResult<User> {
        let username = Self::validate_username(&username)?;

        if let Some(existing) = self.repo.find_by_username(&username).await? {
            if existing.id != id {
                return Err(AppError::conflict("Username"));
            }
        }

        let mut user = self.get_user(id).await?;
        user.username = username;
        user.updated_at = Utc::now();
        self.repo.update(&user).await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User renamed");
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<()> {
        self.repo.delete(id).await?;
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    async fn merge_users(&self, primary_id: Uuid, secondary_id: Uuid) -> AppResult<User> {
        if primary_id == secondary_id {
            return Err(AppError::validation("Cannot merge a user into itself"));
        }

        let mut primary = self.get_user(primary_id).await?;
        let secondary = self.get_user(secondary_id).await?;

        // Primary's platform links always win; secondary fills the gaps.
        primary.absorb(&secondary);
        self.repo.merge(&primary, secondary_id).await?;

        tracing::info!(
            primary = %primary_id,
            secondary = %secondary_id,
            "Users merged"
        );
        Ok(primary)
    }

    async fn unlink_platform(&self, user_id: Uuid, platform: Platform) -> AppResult<User> {
        let mut user = self.get_user(user_id).await?;
        if !user.is_linked(platform) {
            return Err(AppError::validation(format!(
                "Platform {} is not linked",
                platform
            )));
        }

        user.clear_platform_id(platform);
        self.repo.update(&user).await?;

        tracing::info!(user_id = %user_id, platform = %platform, "Platform unlinked");
        Ok(user)
    }

    async fn linked_platforms(
        &self,
        platform: Platform,
        platform_id: &str,
    ) -> AppResult<Vec<Platform>> {
        let user = self
            .repo
            .find_by_platform_id(platform, platform_id)
            .await?
            .ok_or_not_found()?;

        Ok(user.linked_platforms())
    }

    async fn recently_active(&self, limit: u64) -> AppResult<Vec<User>> {
        let capped = limit.max(1).min(MAX_RECENTLY_ACTIVE);
        self.repo.list_recently_active(capped).await
    }

    async fn begin_action(&self, user_id: Uuid, action: &str, window: Duration) -> AppResult<()> {
        if action.is_empty() {
            return Err(AppError::validation("Action must not be empty"));
        }

        let now = Utc::now();
        if let Some(last) = self.repo.last_cooldown(user_id, action).await? {
            let elapsed = now - last;
            if elapsed < window {
                let remaining_seconds = (window - elapsed).num_seconds().max(1);
                tracing::debug!(
                    user_id = %user_id,
                    action = action,
                    remaining_seconds,
                    "Action still on cooldown"
                );
                return Err(AppError::CooldownActive { remaining_seconds });
            }
        }

        self.repo.update_cooldown(user_id, action, now).await
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use crate::testing::MockUserStore;

    use super::*;

    fn test_user(platform: Platform, platform_id: &str) -> User {
        User::new("tester".to_string(), platform, platform_id.to_string())
    }

    fn manager(repo: MockUserStore) -> UserManager {
        UserManager::new(Arc::new(repo))
    }

    #[tokio::test]
    async fn get_user_success() {
        let user = test_user(Platform::Twitch, "t-1");
        let user_id = user.id;

        let mut repo = MockUserStore::new();
        repo.expect_find_by_id()
            .with(eq(user_id))
            .returning(move |_| Ok(Some(user.clone())));

        let result = manager(repo).get_user(user_id).await;
        assert_eq!(result.unwrap().id, user_id);
    }

    #[tokio::test]
    async fn get_user_not_found() {
        let mut repo = MockUserStore::new();
        repo.expect_find_by_id().returning(|_| Ok(None));

        let result = manager(repo).get_user(Uuid::new_v4()).await;
        assert!(matches!(result.unwrap_err(), AppError::NotFound));
    }

    #[tokio::test]
    async fn register_user_success() {
        let mut repo = MockUserStore::new();
        repo.expect_find_by_platform_id().returning(|_, _| Ok(None));
        repo.expect_find_by_username().returning(|_| Ok(None));
        repo.expect_upsert().returning(|user| Ok(user));

        let result = manager(repo)
            .register_user(NewUser {
                platform: Platform::Discord,
                platform_id: "d-1".to_string(),
                username: "newbie".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(result.username, "newbie");
        assert_eq!(result.platform_id(Platform::Discord), Some("d-1"));
    }

    #[tokio::test]
    async fn register_user_rejects_claimed_platform_id() {
        let mut repo = MockUserStore::new();
        repo.expect_find_by_platform_id()
            .returning(|platform, id| Ok(Some(test_user(platform, id))));

        let result = manager(repo)
            .register_user(NewUser {
                platform: Platform::Twitch,
                platform_id: "t-1".to_string(),
                username: "imposter".to_string(),
            })
            .await;

        assert!(matches!(result.unwrap_err(), AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn register_user_rejects_empty_username() {
        let repo = MockUserStore::new();

        let result = manager(repo)
            .register_user(NewUser {
                platform: Platform::Twitch,
                platform_id: "t-1".to_string(),
                username: "  ".to_string(),
            })
            .await;

        assert!(matches!(result.unwrap_err(), AppError::Validation(_)));
    }

    #[tokio::test]
    async fn register_user_stores_the_trimmed_username() {
        let mut repo = MockUserStore::new();
        repo.expect_find_by_platform_id().returning(|_, _| Ok(None));
        repo.expect_find_by_username()
            .with(eq("bob"))
            .returning(|_| Ok(None));
        repo.expect_upsert().returning(|user| Ok(user));

        let result = manager(repo)
            .register_user(NewUser {
                platform: Platform::Twitch,
                platform_id: "t-1".to_string(),
                username: "  bob  ".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(result.username, "bob");
    }

    #[tokio::test]
    async fn username_length_counts_characters_not_bytes() {
        let mut repo = MockUserStore::new();
        repo.expect_find_by_platform_id().returning(|_, _| Ok(None));
        repo.expect_find_by_username().returning(|_| Ok(None));
        repo.expect_upsert().returning(|user| Ok(user));

        // 64 two-byte characters are within the limit even at 128 bytes.
        let name = "ü".repeat(MAX_USERNAME_LENGTH);
        let result = manager(repo)
            .register_user(NewUser {
                platform: Platform::Twitch,
                platform_id: "t-1".to_string(),
                username: name.clone(),
            })
            .await
            .unwrap();
        assert_eq!(result.username, name);

        // One character over is rejected regardless of byte width.
        let result = manager(MockUserStore::new())
            .register_user(NewUser {
                platform: Platform::Twitch,
                platform_id: "t-2".to_string(),
                username: "ü".repeat(MAX_USERNAME_LENGTH + 1),
            })
            .await;
        assert!(matches!(result.unwrap_err(), AppError::Validation(_)));
    }

    #[tokio::test]
    async fn rename_user_stores_the_trimmed_username() {
        let user = test_user(Platform::Twitch, "t-1");
        let user_id = user.id;

        let mut repo = MockUserStore::new();
        repo.expect_find_by_username()
            .with(eq("gamma"))
            .returning(|_| Ok(None));
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        repo.expect_update()
            .withf(|u| u.username == "gamma")
            .times(1)
            .returning(|_| Ok(()));

        let renamed = manager(repo)
            .rename_user(user_id, " gamma ".to_string())
            .await
            .unwrap();
        assert_eq!(renamed.username, "gamma");
    }

    #[tokio::test]
    async fn track_activity_touches_known_user() {
        let user = test_user(Platform::Twitch, "t-1");
        let user_id = user.id;

        let mut repo = MockUserStore::new();
        repo.expect_find_by_platform_id()
            .with(eq(Platform::Twitch), eq("t-1"))
            .returning(move |_, _| Ok(Some(user.clone())));
        repo.expect_touch_last_seen()
            .with(eq(user_id), mockall::predicate::always())
            .times(1)
            .returning(|_, _| Ok(()));

        let result = manager(repo)
            .track_activity(Platform::Twitch, "t-1", "tester")
            .await
            .unwrap();
        assert_eq!(result.id, user_id);
    }

    #[tokio::test]
    async fn track_activity_registers_unknown_user() {
        let mut repo = MockUserStore::new();
        repo.expect_find_by_platform_id().returning(|_, _| Ok(None));
        repo.expect_find_by_username().returning(|_| Ok(None));
        repo.expect_upsert().times(1).returning(|user| Ok(user));

        let result = manager(repo)
            .track_activity(Platform::Youtube, "y-1", "drifter")
            .await
            .unwrap();
        assert_eq!(result.username, "drifter");
    }

    #[tokio::test]
    async fn merge_users_rejects_self_merge() {
        let repo = MockUserStore::new();
        let id = Uuid::new_v4();

        let result = manager(repo).merge_users(id, id).await;
        assert!(matches!(result.unwrap_err(), AppError::Validation(_)));
    }

    #[tokio::test]
    async fn merge_users_absorbs_secondary_links() {
        let primary = test_user(Platform::Twitch, "t-1");
        let secondary = test_user(Platform::Discord, "d-2");
        let (primary_id, secondary_id) = (primary.id, secondary.id);

        let mut repo = MockUserStore::new();
        let p = primary.clone();
        repo.expect_find_by_id()
            .with(eq(primary_id))
            .returning(move |_| Ok(Some(p.clone())));
        let s = secondary.clone();
        repo.expect_find_by_id()
            .with(eq(secondary_id))
            .returning(move |_| Ok(Some(s.clone())));
        repo.expect_merge()
            .withf(move |merged, sid| {
                merged.id == primary_id
                    && merged.platform_id(Platform::Discord) == Some("d-2")
                    && *sid == secondary_id
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let merged = manager(repo)
            .merge_users(primary_id, secondary_id)
            .await
            .unwrap();
        assert_eq!(merged.platform_id(Platform::Twitch), Some("t-1"));
        assert_eq!(merged.platform_id(Platform::Discord), Some("d-2"));
    }

    #[tokio::test]
    async fn unlink_platform_requires_existing_link() {
        let user = test_user(Platform::Twitch, "t-1");
        let user_id = user.id;

        let mut repo = MockUserStore::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));

        let result = manager(repo).unlink_platform(user_id, Platform::Discord).await;
        assert!(matches!(result.unwrap_err(), AppError::Validation(_)));
    }

    #[tokio::test]
    async fn unlink_platform_clears_the_link() {
        let mut user = test_user(Platform::Twitch, "t-1");
        user.set_platform_id(Platform::Discord, "d-1".to_string());
        let user_id = user.id;

        let mut repo = MockUserStore::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        repo.expect_update()
            .withf(|u| !u.is_linked(Platform::Discord) && u.is_linked(Platform::Twitch))
            .times(1)
            .returning(|_| Ok(()));

        let result = manager(repo)
            .unlink_platform(user_id, Platform::Discord)
            .await
            .unwrap();
        assert!(!result.is_linked(Platform::Discord));
    }

    #[tokio::test]
    async fn recently_active_caps_the_limit() {
        let mut repo = MockUserStore::new();
        repo.expect_list_recently_active()
            .with(eq(MAX_RECENTLY_ACTIVE))
            .returning(|_| Ok(vec![]));

        let result = manager(repo).recently_active(10_000).await;
        assert!(result.unwrap().is_empty());
    }

    #[tokio::test]
    async fn begin_action_blocks_inside_the_window() {
        let user_id = Uuid::new_v4();

        let mut repo = MockUserStore::new();
        repo.expect_last_cooldown()
            .with(eq(user_id), eq("search"))
            .returning(|_, _| Ok(Some(Utc::now() - Duration::seconds(10))));

        let result = manager(repo)
            .begin_action(user_id, "search", Duration::seconds(60))
            .await;

        match result.unwrap_err() {
            AppError::CooldownActive { remaining_seconds } => {
                assert!(remaining_seconds > 0 && remaining_seconds <= 60);
            }
            other => panic!("expected CooldownActive, got {:?}", other.code()),
        }
    }

    #[tokio::test]
    async fn begin_action_records_after_the_window() {
        let user_id = Uuid::new_v4();

        let mut repo = MockUserStore::new();
        repo.expect_last_cooldown()
            .returning(|_, _| Ok(Some(Utc::now() - Duration::seconds(120))));
        repo.expect_update_cooldown()
            .with(eq(user_id), eq("search"), mockall::predicate::always())
            .times(1)
            .returning(|_, _, _| Ok(()));

        let result = manager(repo)
            .begin_action(user_id, "search", Duration::seconds(60))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn begin_action_allows_first_use() {
        let user_id = Uuid::new_v4();

        let mut repo = MockUserStore::new();
        repo.expect_last_cooldown().returning(|_, _| Ok(None));
        repo.expect_update_cooldown()
            .times(1)
            .returning(|_, _, _| Ok(()));

        let result = manager(repo)
            .begin_action(user_id, "search", Duration::seconds(60))
            .await;
        assert!(result.is_ok());
    }
}
