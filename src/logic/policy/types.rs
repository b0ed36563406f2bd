//! Policy Types
//!
//! Per-guild protection configuration. No logic beyond accessors - the
//! decision code lives in the classifier.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MIN_ACCOUNT_AGE_DAYS;
use crate::platform::types::GuildId;

// ============================================================================
// ACTION CLASSES
// ============================================================================

/// Monitored mutation categories, one armed flag + threshold each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionClass {
    BotAdd,
    RoleUpdate,
    ChannelUpdate,
    GuildUpdate,
    Kick,
    Ban,
    MemberPrune,
    Webhook,
}

impl ActionClass {
    pub const ALL: [ActionClass; 8] = [
        ActionClass::BotAdd,
        ActionClass::RoleUpdate,
        ActionClass::ChannelUpdate,
        ActionClass::GuildUpdate,
        ActionClass::Kick,
        ActionClass::Ban,
        ActionClass::MemberPrune,
        ActionClass::Webhook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionClass::BotAdd => "bot_add",
            ActionClass::RoleUpdate => "role_update",
            ActionClass::ChannelUpdate => "channel_update",
            ActionClass::GuildUpdate => "guild_update",
            ActionClass::Kick => "kick",
            ActionClass::Ban => "ban",
            ActionClass::MemberPrune => "member_prune",
            ActionClass::Webhook => "webhooks",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        ActionClass::ALL.iter().copied().find(|c| c.as_str() == s)
    }
}

impl std::fmt::Display for ActionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// PUNISHMENTS
// ============================================================================

/// Punishment applied to a violating actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PunishmentKind {
    #[default]
    Ban,
    Kick,
    StripRoles,
}

impl PunishmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PunishmentKind::Ban => "ban",
            PunishmentKind::Kick => "kick",
            PunishmentKind::StripRoles => "strip",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ban" => Some(PunishmentKind::Ban),
            "kick" => Some(PunishmentKind::Kick),
            "strip" => Some(PunishmentKind::StripRoles),
            _ => None,
        }
    }
}

/// Punishment applied to a rejected joiner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RaidPunishment {
    #[default]
    Ban,
    Kick,
    /// One-hour mute instead of removal.
    Timeout,
}

impl RaidPunishment {
    pub fn as_str(&self) -> &'static str {
        match self {
            RaidPunishment::Ban => "ban",
            RaidPunishment::Kick => "kick",
            RaidPunishment::Timeout => "timeout",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ban" => Some(RaidPunishment::Ban),
            "kick" => Some(RaidPunishment::Kick),
            "timeout" => Some(RaidPunishment::Timeout),
            _ => None,
        }
    }
}

// ============================================================================
// GUILD POLICY
// ============================================================================

/// Armed flag + tolerated in-window violations for one action class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleSettings {
    pub armed: bool,
    /// Violations tolerated inside the rate window before punishment
    /// fires. 0 means the first occurrence already violates.
    pub threshold: u32,
}

/// Join-screening configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaidSettings {
    pub enabled: bool,
    pub min_account_age_days: u32,
    pub default_avatar_check: bool,
    pub punishment: RaidPunishment,
    /// Engage lockdown automatically when the join rate flags a raid.
    pub auto_lockdown: bool,
}

impl Default for RaidSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            min_account_age_days: DEFAULT_MIN_ACCOUNT_AGE_DAYS,
            default_avatar_check: false,
            punishment: RaidPunishment::Ban,
            auto_lockdown: true,
        }
    }
}

/// Complete per-guild protection policy. Created on enable, mutated by
/// the admin surface, deleted on disable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildPolicy {
    pub guild_id: GuildId,
    pub punishment: PunishmentKind,
    pub modules: HashMap<ActionClass, ModuleSettings>,
    pub raid: RaidSettings,
}

impl GuildPolicy {
    /// Fresh policy with nothing armed.
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            punishment: PunishmentKind::Ban,
            modules: HashMap::new(),
            raid: RaidSettings::default(),
        }
    }

    /// The "enable" preset: every module armed at threshold 0.
    pub fn armed_default(guild_id: GuildId) -> Self {
        let mut policy = Self::new(guild_id);
        for class in ActionClass::ALL {
            policy.modules.insert(
                class,
                ModuleSettings {
                    armed: true,
                    threshold: 0,
                },
            );
        }
        policy
    }

    pub fn module(&self, class: ActionClass) -> ModuleSettings {
        self.modules.get(&class).copied().unwrap_or_default()
    }

    pub fn armed(&self, class: ActionClass) -> bool {
        self.module(class).armed
    }

    pub fn threshold(&self, class: ActionClass) -> u32 {
        self.module(class).threshold
    }

    pub fn set_module(&mut self, class: ActionClass, armed: bool, threshold: Option<u32>) {
        let entry = self.modules.entry(class).or_default();
        entry.armed = armed;
        if let Some(t) = threshold {
            entry.threshold = t;
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
