//! SeaORM entity definitions.

pub mod cooldown;
pub mod user;
