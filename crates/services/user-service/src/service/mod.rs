//! Service layer - business logic over the user store.

mod user_service;

pub use user_service::{UserManager, UserService};
