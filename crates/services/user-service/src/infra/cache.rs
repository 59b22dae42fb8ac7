//! Read-through cache over the user repository.
//!
//! Wraps any [`UserRepository`] and implements the same contract, so callers
//! cannot tell a cached store from a bare one. ID and platform-ID lookups are
//! cached; every write path invalidates the affected entries. Username
//! lookups and cooldowns always go to the inner store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use uuid::Uuid;

use common::{AppResult, CacheConfig};
use domain::{Platform, User};

use crate::repository::UserRepository;

/// Point-in-time cache metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

/// Caching decorator for a user repository.
pub struct CachedUserStore {
    inner: Arc<dyn UserRepository>,
    by_id: Cache<Uuid, User>,
    by_platform: Cache<(Platform, String), User>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedUserStore {
    /// Wrap a repository with an in-process cache.
    pub fn new(inner: Arc<dyn UserRepository>, config: &CacheConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_seconds);
        Self {
            inner,
            by_id: Cache::builder()
                .max_capacity(config.capacity)
                .time_to_live(ttl)
                .build(),
            by_platform: Cache::builder()
                .max_capacity(config.capacity)
                .time_to_live(ttl)
                .build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Current hit/miss counters and entry count.
    pub async fn stats(&self) -> CacheStats {
        self.by_id.run_pending_tasks().await;
        self.by_platform.run_pending_tasks().await;
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.by_id.entry_count() + self.by_platform.entry_count(),
        }
    }

    async fn cache_user(&self, user: &User) {
        self.by_id.insert(user.id, user.clone()).await;
        for platform in user.linked_platforms() {
            if let Some(platform_id) = user.platform_id(platform) {
                self.by_platform
                    .insert((platform, platform_id.to_string()), user.clone())
                    .await;
            }
        }
    }

    async fn invalidate_user(&self, user: &User) {
        self.by_id.invalidate(&user.id).await;
        for platform in user.linked_platforms() {
            if let Some(platform_id) = user.platform_id(platform) {
                self.by_platform
                    .invalidate(&(platform, platform_id.to_string()))
                    .await;
            }
        }
    }

    /// Invalidate by ID when only the ID is known. The stored row may carry
    /// platform links the caller's copy does not, so look it up first.
    async fn invalidate_by_id(&self, id: Uuid) -> AppResult<()> {
        if let Some(user) = self.inner.find_by_id(id).await? {
            self.invalidate_user(&user).await;
        } else {
            self.by_id.invalidate(&id).await;
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for CachedUserStore {
    async fn upsert(&self, user: User) -> AppResult<User> {
        self.invalidate_user(&user).await;
        let stored = self.inner.upsert(user).await?;
        self.cache_user(&stored).await;
        Ok(stored)
    }

    async fn update(&self, user: &User) -> AppResult<()> {
        self.invalidate_by_id(user.id).await?;
        self.invalidate_user(user).await;
        self.inner.update(user).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.invalidate_by_id(id).await?;
        self.inner.delete(id).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        if let Some(user) = self.by_id.get(&id).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(user));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let found = self.inner.find_by_id(id).await?;
        if let Some(user) = &found {
            self.cache_user(user).await;
        }
        Ok(found)
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        self.inner.find_by_username(username).await
    }

    async fn find_by_platform_id(
        &self,
        platform: Platform,
        platform_id: &str,
    ) -> AppResult<Option<User>> {
        let key = (platform, platform_id.to_string());
        if let Some(user) = self.by_platform.get(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(user));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let found = self.inner.find_by_platform_id(platform, platform_id).await?;
        if let Some(user) = &found {
            self.cache_user(user).await;
        }
        Ok(found)
    }

    async fn find_by_platform_username(
        &self,
        platform: Platform,
        username: &str,
    ) -> AppResult<Option<User>> {
        self.inner.find_by_platform_username(platform, username).await
    }

    async fn list_recently_active(&self, limit: u64) -> AppResult<Vec<User>> {
        self.inner.list_recently_active(limit).await
    }

    async fn touch_last_seen(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        self.invalidate_by_id(id).await?;
        self.inner.touch_last_seen(id, at).await
    }

    async fn merge(&self, primary: &User, secondary_id: Uuid) -> AppResult<()> {
        self.invalidate_by_id(secondary_id).await?;
        self.invalidate_user(primary).await;
        self.inner.merge(primary, secondary_id).await
    }

    async fn last_cooldown(
        &self,
        user_id: Uuid,
        action: &str,
    ) -> AppResult<Option<DateTime<Utc>>> {
        self.inner.last_cooldown(user_id, action).await
    }

    async fn update_cooldown(
        &self,
        user_id: Uuid,
        action: &str,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.inner.update_cooldown(user_id, action, at).await
    }
}
