//! Infrastructure layer - database access and caching.

mod cache;
mod db;
pub mod migrations;

pub use cache::{CacheStats, CachedUserStore};
pub use db::Database;
pub use migrations::Migrator;
