//! User domain entity and related types.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{PLATFORM_DISCORD, PLATFORM_TWITCH, PLATFORM_YOUTUBE};
use crate::error::DomainError;

/// Chat platforms a user identity can originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitch,
    Discord,
    Youtube,
}

impl Platform {
    /// All supported platforms, in display order.
    pub const ALL: [Platform; 3] = [Platform::Twitch, Platform::Discord, Platform::Youtube];

    /// Stable string name used in storage and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitch => PLATFORM_TWITCH,
            Platform::Discord => PLATFORM_DISCORD,
            Platform::Youtube => PLATFORM_YOUTUBE,
        }
    }
}

impl FromStr for Platform {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            PLATFORM_TWITCH => Ok(Platform::Twitch),
            PLATFORM_DISCORD => Ok(Platform::Discord),
            PLATFORM_YOUTUBE => Ok(Platform::Youtube),
            other => Err(DomainError::UnknownPlatform(other.to_string())),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User domain entity.
///
/// A user is a single account that may be linked to identities on several
/// chat platforms. Platform IDs are unique per platform across all users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitch_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_id: Option<String>,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user linked to a single platform identity.
    pub fn new(username: String, platform: Platform, platform_id: String) -> Self {
        let now = Utc::now();
        let mut user = Self {
            id: Uuid::new_v4(),
            username,
            twitch_id: None,
            discord_id: None,
            youtube_id: None,
            last_seen_at: now,
            created_at: now,
            updated_at: now,
        };
        user.set_platform_id(platform, platform_id);
        user
    }

    /// Get this user's external ID on a platform, if linked.
    pub fn platform_id(&self, platform: Platform) -> Option<&str> {
        match platform {
            Platform::Twitch => self.twitch_id.as_deref(),
            Platform::Discord => self.discord_id.as_deref(),
            Platform::Youtube => self.youtube_id.as_deref(),
        }
    }

    /// Link this user to a platform identity, replacing any existing link.
    pub fn set_platform_id(&mut self, platform: Platform, platform_id: String) {
        let slot = match platform {
            Platform::Twitch => &mut self.twitch_id,
            Platform::Discord => &mut self.discord_id,
            Platform::Youtube => &mut self.youtube_id,
        };
        *slot = Some(platform_id);
        self.updated_at = Utc::now();
    }

    /// Remove this user's link to a platform.
    pub fn clear_platform_id(&mut self, platform: Platform) {
        let slot = match platform {
            Platform::Twitch => &mut self.twitch_id,
            Platform::Discord => &mut self.discord_id,
            Platform::Youtube => &mut self.youtube_id,
        };
        *slot = None;
        self.updated_at = Utc::now();
    }

    /// Check whether this user is linked on a platform.
    pub fn is_linked(&self, platform: Platform) -> bool {
        self.platform_id(platform).is_some()
    }

    /// All platforms this user is currently linked on.
    pub fn linked_platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.is_linked(*p))
            .collect()
    }

    /// Absorb another user's platform links during an account merge.
    ///
    /// Links are copied only where this user has none; existing links on the
    /// primary always win. The more recent `last_seen_at` is kept.
    pub fn absorb(&mut self, secondary: &User) {
        for platform in Platform::ALL {
            if self.platform_id(platform).is_none() {
                if let Some(id) = secondary.platform_id(platform) {
                    self.set_platform_id(platform, id.to_string());
                }
            }
        }
        if secondary.last_seen_at > self.last_seen_at {
            self.last_seen_at = secondary.last_seen_at;
        }
        self.updated_at = Utc::now();
    }
}

/// Registration data for a new user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    /// Platform the registration originates from
    pub platform: Platform,
    /// External ID on that platform
    pub platform_id: String,
    /// Display username
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_on(platform: Platform, platform_id: &str) -> User {
        User::new("tester".to_string(), platform, platform_id.to_string())
    }

    #[test]
    fn platform_round_trips_through_strings() {
        for platform in Platform::ALL {
            let parsed: Platform = platform.as_str().parse().unwrap();
            assert_eq!(parsed, platform);
        }
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn new_user_is_linked_on_its_origin_platform() {
        let user = user_on(Platform::Twitch, "t-123");
        assert_eq!(user.platform_id(Platform::Twitch), Some("t-123"));
        assert_eq!(user.linked_platforms(), vec![Platform::Twitch]);
        assert!(!user.is_linked(Platform::Discord));
    }

    #[test]
    fn absorb_fills_only_empty_links() {
        let mut primary = user_on(Platform::Twitch, "t-primary");
        let mut secondary = user_on(Platform::Twitch, "t-secondary");
        secondary.set_platform_id(Platform::Discord, "d-secondary".to_string());

        primary.absorb(&secondary);

        // Primary keeps its own twitch link, gains the discord one.
        assert_eq!(primary.platform_id(Platform::Twitch), Some("t-primary"));
        assert_eq!(primary.platform_id(Platform::Discord), Some("d-secondary"));
    }

    #[test]
    fn absorb_keeps_most_recent_activity() {
        let mut primary = user_on(Platform::Twitch, "t-1");
        let mut secondary = user_on(Platform::Discord, "d-1");
        secondary.last_seen_at = primary.last_seen_at + chrono::Duration::minutes(5);

        primary.absorb(&secondary);
        assert_eq!(primary.last_seen_at, secondary.last_seen_at);
    }

    #[test]
    fn clear_platform_id_unlinks() {
        let mut user = user_on(Platform::Youtube, "y-1");
        user.clear_platform_id(Platform::Youtube);
        assert!(user.linked_platforms().is_empty());
    }
}
