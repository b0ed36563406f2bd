//! Engine-wide windows, limits and defaults.

/// Sliding window for abuse-action rate buckets (seconds).
pub const ACTION_WINDOW_SECS: i64 = 60;

/// Sliding window for the punishment self-limit (seconds).
pub const PUNISH_WINDOW_SECS: i64 = 15;

/// Maximum punishments per (guild, actor) inside [`PUNISH_WINDOW_SECS`].
pub const PUNISH_LIMIT: usize = 3;

/// Sliding window for join-rate buckets (seconds).
pub const JOIN_WINDOW_SECS: i64 = 60;

/// Joins inside [`JOIN_WINDOW_SECS`] beyond which a guild is flagged as raiding.
pub const JOIN_RATE_THRESHOLD: usize = 5;

/// Audit-log lookback when correlating a state change (seconds).
pub const AUDIT_WINDOW_SECS: i64 = 3;

/// Wider lookback for webhook actions, which propagate slower.
pub const AUDIT_WINDOW_WEBHOOK_SECS: i64 = 5;

/// Retry budget for one cleanup task.
pub const CLEANUP_MAX_ATTEMPTS: u32 = 5;

/// Fixed delay between cleanup attempts (seconds).
pub const CLEANUP_BACKOFF_SECS: u64 = 2;

/// Duration of the raid `Timeout` punishment (seconds).
pub const RAID_TIMEOUT_SECS: i64 = 3600;

/// Default minimum account age for joiners (days).
pub const DEFAULT_MIN_ACCOUNT_AGE_DAYS: u32 = 7;

/// Bounded in-memory punishment history.
pub const MAX_PUNISH_HISTORY: usize = 500;
