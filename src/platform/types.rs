//! Platform Types
//!
//! Core types at the platform boundary. No logic - only data structures
//! shared between the engine and the platform client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type GuildId = u64;
pub type ActorId = u64;
pub type RoleId = u64;
pub type ChannelId = u64;
pub type WebhookId = u64;

/// Generic id of whatever a correlated action touched.
pub type TargetId = u64;

// ============================================================================
// PERMISSIONS
// ============================================================================

/// Permission bit set as the platform encodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Permissions(pub u64);

impl Permissions {
    pub const KICK_MEMBERS: Permissions = Permissions(1 << 1);
    pub const BAN_MEMBERS: Permissions = Permissions(1 << 2);
    pub const ADMINISTRATOR: Permissions = Permissions(1 << 3);
    pub const MANAGE_CHANNELS: Permissions = Permissions(1 << 4);
    pub const MANAGE_GUILD: Permissions = Permissions(1 << 5);
    pub const VIEW_AUDIT_LOG: Permissions = Permissions(1 << 7);
    pub const SEND_MESSAGES: Permissions = Permissions(1 << 11);
    pub const MANAGE_ROLES: Permissions = Permissions(1 << 28);
    pub const MANAGE_WEBHOOKS: Permissions = Permissions(1 << 29);
    pub const MODERATE_MEMBERS: Permissions = Permissions(1 << 40);

    pub fn none() -> Self {
        Permissions(0)
    }

    pub fn all_of(parts: &[Permissions]) -> Self {
        Permissions(parts.iter().fold(0, |acc, p| acc | p.0))
    }

    pub fn contains(&self, other: Permissions) -> bool {
        self.0 & other.0 == other.0
    }

    /// A role carrying any of these bits can be abused to take over a
    /// guild; granting one is treated as a monitored action.
    pub fn is_elevated(&self) -> bool {
        const ELEVATED: &[Permissions] = &[
            Permissions::ADMINISTRATOR,
            Permissions::MANAGE_GUILD,
            Permissions::KICK_MEMBERS,
            Permissions::BAN_MEMBERS,
            Permissions::MANAGE_ROLES,
            Permissions::MANAGE_CHANNELS,
            Permissions::MANAGE_WEBHOOKS,
        ];
        ELEVATED.iter().any(|p| self.contains(*p))
    }
}

// ============================================================================
// GUILD OBJECT STATE
// ============================================================================

/// Pre-mutation representation of a role, sufficient to reconstruct it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleState {
    pub id: RoleId,
    pub name: String,
    pub permissions: Permissions,
    pub color: u32,
    pub hoist: bool,
    pub mentionable: bool,
    pub position: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Text => "text",
            ChannelKind::Voice => "voice",
            ChannelKind::Category => "category",
        }
    }
}

/// Pre-mutation representation of a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
    pub topic: Option<String>,
    pub position: i64,
    pub nsfw: bool,
    pub slowmode_secs: u32,
    pub bitrate: Option<u32>,
    pub user_limit: Option<u32>,
}

/// Pre-mutation representation of the guild profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildProfile {
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<Vec<u8>>,
    pub banner: Option<Vec<u8>>,
    pub splash: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookState {
    pub id: WebhookId,
    pub channel_id: ChannelId,
    pub name: String,
}

// ============================================================================
// MEMBERS
// ============================================================================

/// A guild member as seen by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: ActorId,
    pub is_bot: bool,
    /// Position of the member's highest role; the hierarchy ordering.
    pub top_role_position: i64,
    pub permissions: Permissions,
    pub role_ids: Vec<RoleId>,
    pub created_at: DateTime<Utc>,
    pub has_avatar: bool,
}

impl Member {
    pub fn account_age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }
}
