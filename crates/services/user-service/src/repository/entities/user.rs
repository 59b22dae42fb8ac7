//! User database entity for SeaORM.

use sea_orm::entity::prelude::*;

use domain::User;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub username: String,
    /// External Twitch user ID (NULL = not linked)
    #[sea_orm(unique)]
    pub twitch_id: Option<String>,
    /// External Discord user ID (NULL = not linked)
    #[sea_orm(unique)]
    pub discord_id: Option<String>,
    /// External YouTube channel ID (NULL = not linked)
    #[sea_orm(unique)]
    pub youtube_id: Option<String>,
    pub last_seen_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cooldown::Entity")]
    Cooldown,
}

impl Related<super::cooldown::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cooldown.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Convert database model to domain entity
impl From<Model> for User {
    fn from(model: Model) -> Self {
        User {
            id: model.id,
            username: model.username,
            twitch_id: model.twitch_id,
            discord_id: model.discord_id,
            youtube_id: model.youtube_id,
            last_seen_at: model.last_seen_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
