//! Postgres connection handle and the migration operations the CLI drives.
//!
//! Service wiring opens with [`Database::open_and_migrate`] so a fresh
//! deployment comes up with the users and cooldowns schema in place; the
//! `migrate` subcommands use [`Database::open`] and manage the schema
//! explicitly.

use sea_orm::{
    ConnectionTrait, Database as SeaDatabase, DatabaseConnection, DbErr, EntityTrait, Statement,
};
use sea_orm_migration::{seaql_migrations, MigratorTrait};

use super::migrations::Migrator;

/// Owned handle to the connection pool.
#[derive(Clone)]
pub struct Database {
    conn: DatabaseConnection,
}

impl Database {
    /// Open a connection without touching the schema.
    pub async fn open(database_url: &str) -> Result<Self, DbErr> {
        let conn = SeaDatabase::connect(database_url).await?;
        Ok(Self { conn })
    }

    /// Open a connection and bring the schema up to date.
    pub async fn open_and_migrate(database_url: &str) -> Result<Self, DbErr> {
        let db = Self::open(database_url).await?;
        Migrator::up(&db.conn, None).await?;
        tracing::info!("database schema up to date");
        Ok(db)
    }

    /// Clone of the underlying connection, for handing to stores.
    pub fn handle(&self) -> DatabaseConnection {
        self.conn.clone()
    }

    /// Apply all pending migrations.
    pub async fn migrate_up(&self) -> Result<(), DbErr> {
        Migrator::up(&self.conn, None).await
    }

    /// Roll back the most recent migration.
    pub async fn migrate_down(&self) -> Result<(), DbErr> {
        Migrator::down(&self.conn, Some(1)).await
    }

    /// Drop everything and reapply the full migration set.
    pub async fn migrate_fresh(&self) -> Result<(), DbErr> {
        Migrator::fresh(&self.conn).await
    }

    /// Every defined migration in order, paired with whether it has run.
    pub async fn migration_status(&self) -> Result<Vec<(String, bool)>, DbErr> {
        let applied = seaql_migrations::Entity::find().all(&self.conn).await?;

        Ok(Migrator::migrations()
            .iter()
            .map(|m| {
                let name = m.name().to_string();
                let done = applied.iter().any(|row| row.version == name);
                (name, done)
            })
            .collect())
    }

    /// Round-trip a trivial query to verify the connection is alive.
    pub async fn ping(&self) -> Result<(), DbErr> {
        let backend = self.conn.get_database_backend();
        self.conn
            .execute(Statement::from_string(backend, "SELECT 1"))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use sea_orm_migration::MigratorTrait;

    use super::super::migrations::Migrator;

    #[test]
    fn migrations_register_users_before_cooldowns() {
        let names: Vec<String> = Migrator::migrations()
            .iter()
            .map(|m| m.name().to_string())
            .collect();

        assert_eq!(names.len(), 2);
        assert!(names[0].contains("create_users_table"));
        assert!(names[1].contains("create_cooldowns_table"));
    }
}
