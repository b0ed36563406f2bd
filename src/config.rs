//! Engine Configuration
//!
//! Deployment-level tunables. Per-guild behavior lives in
//! [`crate::logic::policy::GuildPolicy`]; this struct only carries knobs
//! that apply to every guild the engine watches.

use serde::{Deserialize, Serialize};

use crate::constants::*;

/// What the strip-roles punishment removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StripScope {
    /// Remove every role the engine can manage.
    AllManageable,
    /// Remove only the roles named by the flagged grant, when known.
    GrantedOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Name embedded in punishment/cleanup reason strings.
    pub engine_name: String,

    /// Audit-log lookback for correlation (seconds).
    pub audit_window_secs: i64,

    /// Wider lookback used for webhook actions (seconds).
    pub audit_window_webhook_secs: i64,

    /// Punishments tolerated per (guild, actor) inside the punish window.
    pub punish_limit: usize,

    /// Retry budget for one cleanup task.
    pub cleanup_max_attempts: u32,

    /// Fixed delay between cleanup attempts (seconds).
    pub cleanup_backoff_secs: u64,

    /// Joins per minute beyond which a guild is flagged as raiding.
    pub join_rate_threshold: usize,

    pub strip_scope: StripScope,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_name: "guildguard".to_string(),
            audit_window_secs: AUDIT_WINDOW_SECS,
            audit_window_webhook_secs: AUDIT_WINDOW_WEBHOOK_SECS,
            punish_limit: PUNISH_LIMIT,
            cleanup_max_attempts: CLEANUP_MAX_ATTEMPTS,
            cleanup_backoff_secs: CLEANUP_BACKOFF_SECS,
            join_rate_threshold: JOIN_RATE_THRESHOLD,
            strip_scope: StripScope::AllManageable,
        }
    }
}
