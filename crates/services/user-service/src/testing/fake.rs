//! Stateful in-memory user store for integration-style tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use common::{AppError, AppResult};
use domain::{Platform, User};

use crate::repository::UserRepository;

/// In-memory implementation of [`UserRepository`].
///
/// Enforces the same uniqueness rules as the database schema (username and
/// per-platform external IDs) so tests exercise realistic conflict paths.
#[derive(Default)]
pub struct FakeUserStore {
    users: Mutex<HashMap<Uuid, User>>,
    cooldowns: Mutex<HashMap<(Uuid, String), DateTime<Utc>>>,
}

impl FakeUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users, for test assertions.
    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    fn check_uniqueness(&self, users: &HashMap<Uuid, User>, candidate: &User) -> AppResult<()> {
        for other in users.values() {
            if other.id == candidate.id {
                continue;
            }
            if other.username == candidate.username {
                return Err(AppError::conflict("Username"));
            }
            for platform in Platform::ALL {
                if let (Some(a), Some(b)) =
                    (other.platform_id(platform), candidate.platform_id(platform))
                {
                    if a == b {
                        return Err(AppError::conflict("Platform link"));
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for FakeUserStore {
    async fn upsert(&self, user: User) -> AppResult<User> {
        let mut users = self.users.lock().unwrap();
        self.check_uniqueness(&users, &user)?;
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, user: &User) -> AppResult<()> {
        let mut users = self.users.lock().unwrap();
        if !users.contains_key(&user.id) {
            return Err(AppError::NotFound);
        }
        self.check_uniqueness(&users, user)?;
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut users = self.users.lock().unwrap();
        users.remove(&id).ok_or(AppError::NotFound)?;
        self.cooldowns.lock().unwrap().retain(|(uid, _), _| *uid != id);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_platform_id(
        &self,
        platform: Platform,
        platform_id: &str,
    ) -> AppResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.platform_id(platform) == Some(platform_id))
            .cloned())
    }

    async fn find_by_platform_username(
        &self,
        platform: Platform,
        username: &str,
    ) -> AppResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.username == username && u.is_linked(platform))
            .cloned())
    }

    async fn list_recently_active(&self, limit: u64) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = self.users.lock().unwrap().values().cloned().collect();
        users.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at));
        users.truncate(limit as usize);
        Ok(users)
    }

    async fn touch_last_seen(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&id).ok_or(AppError::NotFound)?;
        user.last_seen_at = at;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn merge(&self, primary: &User, secondary_id: Uuid) -> AppResult<()> {
        let mut users = self.users.lock().unwrap();
        if !users.contains_key(&primary.id) {
            return Err(AppError::NotFound);
        }
        if users.remove(&secondary_id).is_none() {
            return Err(AppError::NotFound);
        }
        users.insert(primary.id, primary.clone());
        drop(users);

        // Move cooldowns, keeping the more recent timestamp per action.
        let mut cooldowns = self.cooldowns.lock().unwrap();
        let moved: Vec<(String, DateTime<Utc>)> = cooldowns
            .iter()
            .filter(|((uid, _), _)| *uid == secondary_id)
            .map(|((_, action), at)| (action.clone(), *at))
            .collect();
        for (action, at) in moved {
            let key = (primary.id, action);
            let keep = cooldowns.get(&key).map_or(true, |current| at > *current);
            if keep {
                cooldowns.insert(key, at);
            }
        }
        cooldowns.retain(|(uid, _), _| *uid != secondary_id);

        Ok(())
    }

    async fn last_cooldown(
        &self,
        user_id: Uuid,
        action: &str,
    ) -> AppResult<Option<DateTime<Utc>>> {
        Ok(self
            .cooldowns
            .lock()
            .unwrap()
            .get(&(user_id, action.to_string()))
            .copied())
    }

    async fn update_cooldown(
        &self,
        user_id: Uuid,
        action: &str,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.cooldowns
            .lock()
            .unwrap()
            .insert((user_id, action.to_string()), at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_rejects_duplicate_platform_links() {
        let store = FakeUserStore::new();
        let first = User::new("alpha".to_string(), Platform::Twitch, "t-1".to_string());
        store.upsert(first).await.unwrap();

        let clash = User::new("beta".to_string(), Platform::Twitch, "t-1".to_string());
        let err = store.upsert(clash).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn merge_moves_cooldowns_keeping_most_recent() {
        let store = FakeUserStore::new();
        let mut primary = User::new("alpha".to_string(), Platform::Twitch, "t-1".to_string());
        let secondary = User::new("beta".to_string(), Platform::Discord, "d-1".to_string());
        store.upsert(primary.clone()).await.unwrap();
        store.upsert(secondary.clone()).await.unwrap();

        let older = Utc::now() - chrono::Duration::minutes(10);
        let newer = Utc::now();
        store.update_cooldown(primary.id, "search", older).await.unwrap();
        store.update_cooldown(secondary.id, "search", newer).await.unwrap();

        primary.absorb(&secondary);
        store.merge(&primary, secondary.id).await.unwrap();

        let last = store.last_cooldown(primary.id, "search").await.unwrap();
        assert_eq!(last, Some(newer));
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn delete_removes_user_and_cooldowns() {
        let store = FakeUserStore::new();
        let user = User::new("gamma".to_string(), Platform::Youtube, "y-1".to_string());
        store.upsert(user.clone()).await.unwrap();
        store
            .update_cooldown(user.id, "search", Utc::now())
            .await
            .unwrap();

        store.delete(user.id).await.unwrap();

        assert!(store.find_by_id(user.id).await.unwrap().is_none());
        assert!(store.last_cooldown(user.id, "search").await.unwrap().is_none());
    }
}
