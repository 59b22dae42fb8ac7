//! Domain-level constants.
//!
//! These constants define business rules and validation requirements.

// =============================================================================
// Platforms
// =============================================================================

/// Twitch platform identifier
pub const PLATFORM_TWITCH: &str = "twitch";

/// Discord platform identifier
pub const PLATFORM_DISCORD: &str = "discord";

/// YouTube platform identifier
pub const PLATFORM_YOUTUBE: &str = "youtube";

/// All valid platform values
pub const VALID_PLATFORMS: &[&str] = &[PLATFORM_TWITCH, PLATFORM_DISCORD, PLATFORM_YOUTUBE];

/// Check if a platform value is valid
pub fn is_valid_platform(platform: &str) -> bool {
    VALID_PLATFORMS.contains(&platform)
}

// =============================================================================
// Validation
// =============================================================================

/// Minimum username length requirement
pub const MIN_USERNAME_LENGTH: usize = 1;

/// Maximum username length requirement
pub const MAX_USERNAME_LENGTH: usize = 64;

// =============================================================================
// Activity
// =============================================================================

/// Maximum number of users returned by recently-active queries
pub const MAX_RECENTLY_ACTIVE: u64 = 100;

/// Cooldown action name for the search command
pub const ACTION_SEARCH: &str = "search";
