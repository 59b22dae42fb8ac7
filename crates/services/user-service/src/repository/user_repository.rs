//! User repository: the capability set for user data access, and its
//! Postgres-backed implementation.
//!
//! The [`UserRepository`] trait is the authoritative contract. Every backend
//! or test substitute must implement the full operation set; a partial
//! implementation does not compile. Substitutes for testing are anchored in
//! [`crate::testing`], not here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionError, TransactionTrait,
};
use uuid::Uuid;

use common::{AppError, AppResult};
use domain::{Platform, User};

use super::entities::cooldown::{self, Entity as CooldownEntity};
use super::entities::user::{self, ActiveModel, Entity as UserEntity};

/// Capability set for user data access.
///
/// All queries operate on the user aggregate: the account row, its platform
/// links, activity timestamps, and per-action cooldowns. `merge` is the only
/// multi-row operation and must be atomic.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user or update an existing one by ID
    async fn upsert(&self, user: User) -> AppResult<User>;

    /// Update an existing user; NotFound if the row does not exist
    async fn update(&self, user: &User) -> AppResult<()>;

    /// Delete a user by ID
    async fn delete(&self, id: Uuid) -> AppResult<()>;

    /// Find a user by internal ID
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Find a user by display username
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;

    /// Find a user by their external ID on a platform
    async fn find_by_platform_id(
        &self,
        platform: Platform,
        platform_id: &str,
    ) -> AppResult<Option<User>>;

    /// Find a user by username, restricted to users linked on a platform
    async fn find_by_platform_username(
        &self,
        platform: Platform,
        username: &str,
    ) -> AppResult<Option<User>>;

    /// List users ordered by most recent activity
    async fn list_recently_active(&self, limit: u64) -> AppResult<Vec<User>>;

    /// Record user activity at the given instant
    async fn touch_last_seen(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()>;

    /// Atomically persist the merged primary, move the secondary's cooldowns
    /// onto it (keeping the more recent timestamp per action), and delete the
    /// secondary user.
    async fn merge(&self, primary: &User, secondary_id: Uuid) -> AppResult<()>;

    /// Last time the user performed a rate-limited action, if ever
    async fn last_cooldown(&self, user_id: Uuid, action: &str)
        -> AppResult<Option<DateTime<Utc>>>;

    /// Record that the user performed a rate-limited action
    async fn update_cooldown(
        &self,
        user_id: Uuid,
        action: &str,
        at: DateTime<Utc>,
    ) -> AppResult<()>;
}

/// Concrete implementation of UserRepository over Postgres.
pub struct UserStore {
    db: DatabaseConnection,
}

impl UserStore {
    /// Create new repository instance
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_active(user: &User) -> ActiveModel {
    ActiveModel {
        id: Set(user.id),
        username: Set(user.username.clone()),
        twitch_id: Set(user.twitch_id.clone()),
        discord_id: Set(user.discord_id.clone()),
        youtube_id: Set(user.youtube_id.clone()),
        last_seen_at: Set(user.last_seen_at),
        created_at: Set(user.created_at),
        updated_at: Set(user.updated_at),
    }
}

fn platform_column(platform: Platform) -> user::Column {
    match platform {
        Platform::Twitch => user::Column::TwitchId,
        Platform::Discord => user::Column::DiscordId,
        Platform::Youtube => user::Column::YoutubeId,
    }
}

fn map_db_err(err: DbErr) -> AppError {
    match err {
        DbErr::RecordNotFound(_) | DbErr::RecordNotUpdated => AppError::NotFound,
        other => AppError::from(other),
    }
}

fn map_txn_err(err: TransactionError<DbErr>) -> AppError {
    match err {
        TransactionError::Connection(e) => map_db_err(e),
        TransactionError::Transaction(e) => map_db_err(e),
    }
}

/// Move the secondary's cooldowns onto the primary inside a transaction,
/// keeping whichever timestamp is more recent per action.
async fn merge_cooldowns(
    txn: &DatabaseTransaction,
    primary_id: Uuid,
    secondary_id: Uuid,
) -> Result<(), DbErr> {
    let secondary_rows = CooldownEntity::find()
        .filter(cooldown::Column::UserId.eq(secondary_id))
        .all(txn)
        .await?;

    for row in secondary_rows {
        let existing = CooldownEntity::find_by_id((primary_id, row.action.clone()))
            .one(txn)
            .await?;

        let keep = match &existing {
            Some(current) if current.last_used_at >= row.last_used_at => None,
            _ => Some(row.last_used_at),
        };

        if let Some(last_used_at) = keep {
            let active = cooldown::ActiveModel {
                user_id: Set(primary_id),
                action: Set(row.action.clone()),
                last_used_at: Set(last_used_at),
            };
            CooldownEntity::insert(active)
                .on_conflict(
                    OnConflict::columns([cooldown::Column::UserId, cooldown::Column::Action])
                        .update_column(cooldown::Column::LastUsedAt)
                        .to_owned(),
                )
                .exec(txn)
                .await?;
        }
    }

    CooldownEntity::delete_many()
        .filter(cooldown::Column::UserId.eq(secondary_id))
        .exec(txn)
        .await?;

    Ok(())
}

#[async_trait]
impl UserRepository for UserStore {
    async fn upsert(&self, user: User) -> AppResult<User> {
        let exists = UserEntity::find_by_id(user.id)
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .is_some();

        let active = to_active(&user);
        let model = if exists {
            active.update(&self.db).await.map_err(map_db_err)?
        } else {
            active.insert(&self.db).await.map_err(map_db_err)?
        };

        Ok(User::from(model))
    }

    async fn update(&self, user: &User) -> AppResult<()> {
        to_active(user).update(&self.db).await.map_err(map_db_err)?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = UserEntity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let result = UserEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.map(User::from))
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let result = UserEntity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.map(User::from))
    }

    async fn find_by_platform_id(
        &self,
        platform: Platform,
        platform_id: &str,
    ) -> AppResult<Option<User>> {
        let result = UserEntity::find()
            .filter(platform_column(platform).eq(platform_id))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.map(User::from))
    }

    async fn find_by_platform_username(
        &self,
        platform: Platform,
        username: &str,
    ) -> AppResult<Option<User>> {
        let result = UserEntity::find()
            .filter(user::Column::Username.eq(username))
            .filter(platform_column(platform).is_not_null())
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.map(User::from))
    }

    async fn list_recently_active(&self, limit: u64) -> AppResult<Vec<User>> {
        let models = UserEntity::find()
            .order_by_desc(user::Column::LastSeenAt)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(models.into_iter().map(User::from).collect())
    }

    async fn touch_last_seen(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        let user = UserEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .ok_or(AppError::NotFound)?;

        let mut active: ActiveModel = user.into();
        active.last_seen_at = Set(at);
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await.map_err(map_db_err)?;

        Ok(())
    }

    async fn merge(&self, primary: &User, secondary_id: Uuid) -> AppResult<()> {
        let merged = to_active(primary);
        let primary_id = primary.id;

        self.db
            .transaction::<_, (), DbErr>(move |txn| {
                Box::pin(async move {
                    merged.update(txn).await?;

                    merge_cooldowns(txn, primary_id, secondary_id).await?;

                    let deleted = UserEntity::delete_by_id(secondary_id).exec(txn).await?;
                    if deleted.rows_affected == 0 {
                        return Err(DbErr::RecordNotFound("secondary user".to_string()));
                    }

                    Ok(())
                })
            })
            .await
            .map_err(map_txn_err)
    }

    async fn last_cooldown(
        &self,
        user_id: Uuid,
        action: &str,
    ) -> AppResult<Option<DateTime<Utc>>> {
        let row = CooldownEntity::find_by_id((user_id, action.to_string()))
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(row.map(|r| r.last_used_at))
    }

    async fn update_cooldown(
        &self,
        user_id: Uuid,
        action: &str,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let active = cooldown::ActiveModel {
            user_id: Set(user_id),
            action: Set(action.to_string()),
            last_used_at: Set(at),
        };

        CooldownEntity::insert(active)
            .on_conflict(
                OnConflict::columns([cooldown::Column::UserId, cooldown::Column::Action])
                    .update_column(cooldown::Column::LastUsedAt)
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(())
    }
}
