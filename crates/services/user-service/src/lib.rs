//! User Service Library
//!
//! This crate provides user account management for multi-platform chat
//! communities: registration, platform identity lookups, account linking
//! and merging, activity tracking, and action cooldowns. Application code
//! depends on the [`repository::UserRepository`] contract rather than a
//! concrete backend; [`testing`] provides substitutes for it.

pub mod config;
pub mod infra;
pub mod repository;
pub mod service;
pub mod testing;

use std::sync::Arc;

use tracing::info;

use crate::config::UserServiceConfig;
use crate::infra::{CachedUserStore, Database};
use crate::repository::UserStore;
use crate::service::{UserManager, UserService};

/// Migration action type.
#[derive(Debug, Clone, Copy)]
pub enum MigrateAction {
    Up,
    Down,
    Status,
    Fresh,
}

/// Run migrations (for CLI commands).
pub async fn run_migrations(action: MigrateAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = UserServiceConfig::from_env();
    let db = Database::open(&config.database_url).await?;

    match action {
        MigrateAction::Up => {
            db.migrate_up().await?;
            info!("Migrations applied successfully");
        }
        MigrateAction::Down => {
            db.migrate_down().await?;
            info!("Rolled back last migration");
        }
        MigrateAction::Status => {
            let status = db.migration_status().await?;
            for (name, applied) in status {
                let marker = if applied { "[x]" } else { "[ ]" };
                println!("{} {}", marker, name);
            }
        }
        MigrateAction::Fresh => {
            db.migrate_fresh().await?;
            info!("Database reset and migrations applied");
        }
    }

    Ok(())
}

/// Check database connectivity (for CLI commands).
pub async fn check_connectivity() -> Result<(), Box<dyn std::error::Error>> {
    let config = UserServiceConfig::from_env();
    let db = Database::open(&config.database_url).await?;
    db.ping().await?;
    info!("Database connection OK");
    Ok(())
}

/// Wire the service stack: Postgres store behind the read-through cache,
/// consumed by the service layer through the repository contract.
pub async fn init_service(
    config: &UserServiceConfig,
) -> Result<Arc<dyn UserService>, Box<dyn std::error::Error>> {
    let db = Database::open_and_migrate(&config.database_url).await?;

    let store = Arc::new(UserStore::new(db.handle()));
    let cached = Arc::new(CachedUserStore::new(store, &config.cache));

    Ok(Arc::new(UserManager::new(cached)))
}
