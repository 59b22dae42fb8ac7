//! Migration: Create the cooldowns table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Cooldowns::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Cooldowns::UserId).uuid().not_null())
                    .col(ColumnDef::new(Cooldowns::Action).string().not_null())
                    .col(
                        ColumnDef::new(Cooldowns::LastUsedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(Cooldowns::UserId)
                            .col(Cooldowns::Action),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cooldowns_user_id")
                            .from(Cooldowns::Table, Cooldowns::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Cooldowns::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Cooldowns {
    Table,
    UserId,
    Action,
    LastUsedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
