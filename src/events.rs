//! Event Stream
//!
//! Typed notifications consumed from the platform collaborator, plus the
//! audit-log entry shape the correlator works on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::policy::ActionClass;
use crate::platform::types::{
    ActorId, ChannelId, ChannelState, GuildId, GuildProfile, Member, RoleState, TargetId,
};

// ============================================================================
// AUDIT LOG
// ============================================================================

/// Audit-log action kinds the engine cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditKind {
    RoleCreate,
    RoleUpdate,
    RoleDelete,
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    GuildUpdate,
    WebhookCreate,
    WebhookUpdate,
    WebhookDelete,
    Kick,
    Ban,
    Unban,
    MemberPrune,
    MemberRoleUpdate,
    BotAdd,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::RoleCreate => "role_create",
            AuditKind::RoleUpdate => "role_update",
            AuditKind::RoleDelete => "role_delete",
            AuditKind::ChannelCreate => "channel_create",
            AuditKind::ChannelUpdate => "channel_update",
            AuditKind::ChannelDelete => "channel_delete",
            AuditKind::GuildUpdate => "guild_update",
            AuditKind::WebhookCreate => "webhook_create",
            AuditKind::WebhookUpdate => "webhook_update",
            AuditKind::WebhookDelete => "webhook_delete",
            AuditKind::Kick => "kick",
            AuditKind::Ban => "ban",
            AuditKind::Unban => "unban",
            AuditKind::MemberPrune => "member_prune",
            AuditKind::MemberRoleUpdate => "member_role_update",
            AuditKind::BotAdd => "bot_add",
        }
    }

    /// Monitored action class this audit kind counts towards.
    ///
    /// Create/delete collapse into the matching update class; every
    /// webhook kind shares one class. `Unban` is not monitored.
    pub fn action_class(&self) -> Option<ActionClass> {
        match self {
            AuditKind::RoleCreate | AuditKind::RoleUpdate | AuditKind::RoleDelete => {
                Some(ActionClass::RoleUpdate)
            }
            AuditKind::MemberRoleUpdate => Some(ActionClass::RoleUpdate),
            AuditKind::ChannelCreate | AuditKind::ChannelUpdate | AuditKind::ChannelDelete => {
                Some(ActionClass::ChannelUpdate)
            }
            AuditKind::GuildUpdate => Some(ActionClass::GuildUpdate),
            AuditKind::WebhookCreate | AuditKind::WebhookUpdate | AuditKind::WebhookDelete => {
                Some(ActionClass::Webhook)
            }
            AuditKind::Kick => Some(ActionClass::Kick),
            AuditKind::Ban => Some(ActionClass::Ban),
            AuditKind::MemberPrune => Some(ActionClass::MemberPrune),
            AuditKind::BotAdd => Some(ActionClass::BotAdd),
            AuditKind::Unban => None,
        }
    }

    /// Webhook actions get a wider correlation window.
    pub fn is_webhook(&self) -> bool {
        matches!(
            self,
            AuditKind::WebhookCreate | AuditKind::WebhookUpdate | AuditKind::WebhookDelete
        )
    }
}

/// One raw audit-log entry as returned by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub kind: AuditKind,
    /// Actor as the platform attributes it; `None` when the platform lost it.
    pub actor: Option<ActorId>,
    pub target: Option<TargetId>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// GUILD EVENTS
// ============================================================================

/// One state-change or membership notification from the platform.
///
/// Mutation events carry the pre-change state where the platform provides
/// it; the engine snapshots that state before classifying.
#[derive(Debug, Clone)]
pub enum GuildEvent {
    RoleUpdated {
        guild: GuildId,
        before: RoleState,
        after: RoleState,
    },
    RoleDeleted {
        guild: GuildId,
        role: RoleState,
    },
    ChannelUpdated {
        guild: GuildId,
        before: ChannelState,
        after: ChannelState,
    },
    ChannelDeleted {
        guild: GuildId,
        channel: ChannelState,
    },
    GuildUpdated {
        guild: GuildId,
        before: GuildProfile,
        after: GuildProfile,
    },
    /// Webhooks changed somewhere in `channel`; the audit log says how.
    WebhooksUpdated {
        guild: GuildId,
        channel: ChannelId,
    },
    /// Member-action entries (kick/ban/prune/bot-add) arrive pre-correlated
    /// as audit entries rather than as object diffs.
    AuditEntryCreated {
        guild: GuildId,
        entry: AuditEntry,
    },
    MemberRolesUpdated {
        guild: GuildId,
        actor: ActorId,
        /// Roles added by the change, with their full state.
        added: Vec<RoleState>,
        /// Recipient's top role position after the change.
        top_role_position: i64,
    },
    MemberJoined {
        guild: GuildId,
        member: Member,
    },
    MemberUnbanned {
        guild: GuildId,
        actor: ActorId,
    },
}

impl GuildEvent {
    pub fn guild(&self) -> GuildId {
        match self {
            GuildEvent::RoleUpdated { guild, .. }
            | GuildEvent::RoleDeleted { guild, .. }
            | GuildEvent::ChannelUpdated { guild, .. }
            | GuildEvent::ChannelDeleted { guild, .. }
            | GuildEvent::GuildUpdated { guild, .. }
            | GuildEvent::WebhooksUpdated { guild, .. }
            | GuildEvent::AuditEntryCreated { guild, .. }
            | GuildEvent::MemberRolesUpdated { guild, .. }
            | GuildEvent::MemberJoined { guild, .. }
            | GuildEvent::MemberUnbanned { guild, .. } => *guild,
        }
    }
}
