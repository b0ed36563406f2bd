//! Rate Limiter
//!
//! Generic sliding-window counter. One ordered timestamp list per key;
//! entries older than the key's window are pruned before every read and
//! write, so a returned count never reflects expired events.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;

use crate::constants::{ACTION_WINDOW_SECS, JOIN_WINDOW_SECS, PUNISH_WINDOW_SECS};
use crate::logic::policy::ActionClass;
use crate::platform::types::{ActorId, GuildId};

// ============================================================================
// KEYS
// ============================================================================

/// Typed rate-limiter key. Each scope carries its own window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateScope {
    /// Abuse-action bucket.
    Action {
        guild: GuildId,
        actor: ActorId,
        class: ActionClass,
    },
    /// Punishment self-limit bucket.
    Punishment { guild: GuildId, actor: ActorId },
    /// Join-rate bucket.
    Join { guild: GuildId },
}

impl RateScope {
    pub fn window_secs(&self) -> i64 {
        match self {
            RateScope::Action { .. } => ACTION_WINDOW_SECS,
            RateScope::Punishment { .. } => PUNISH_WINDOW_SECS,
            RateScope::Join { .. } => JOIN_WINDOW_SECS,
        }
    }

    fn guild(&self) -> GuildId {
        match self {
            RateScope::Action { guild, .. }
            | RateScope::Punishment { guild, .. }
            | RateScope::Join { guild } => *guild,
        }
    }
}

// ============================================================================
// BUCKETS
// ============================================================================

/// Ordered event timestamps inside a rolling window.
#[derive(Debug, Clone)]
pub struct ActionBucket {
    window_secs: i64,
    stamps: Vec<i64>,
}

impl ActionBucket {
    pub fn new(window_secs: i64) -> Self {
        Self {
            window_secs,
            stamps: Vec::new(),
        }
    }

    /// Prune, append `now`, return the resulting count.
    pub fn record_at(&mut self, now: i64) -> usize {
        self.prune(now);
        self.stamps.push(now);
        self.stamps.len()
    }

    /// Prune, return the current count without recording.
    pub fn count_at(&mut self, now: i64) -> usize {
        self.prune(now);
        self.stamps.len()
    }

    fn prune(&mut self, now: i64) {
        let cutoff = now - self.window_secs;
        self.stamps.retain(|t| *t > cutoff);
    }
}

// ============================================================================
// LIMITER
// ============================================================================

/// Keyed sliding-window counters behind one lock. Buckets are small and
/// operations are O(window population), so a single map-level mutex is
/// enough; contention is bounded by one guild's event traffic.
pub struct RateLimiter {
    buckets: Mutex<HashMap<RateScope, ActionBucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Record one event under `scope` and return the in-window count.
    pub fn record(&self, scope: RateScope) -> usize {
        self.record_at(scope, Utc::now().timestamp())
    }

    /// Same as [`record`](Self::record) with an explicit timestamp.
    pub fn record_at(&self, scope: RateScope, now: i64) -> usize {
        let mut buckets = self.buckets.lock();
        buckets
            .entry(scope)
            .or_insert_with(|| ActionBucket::new(scope.window_secs()))
            .record_at(now)
    }

    /// Current in-window count without recording.
    pub fn count(&self, scope: RateScope) -> usize {
        let mut buckets = self.buckets.lock();
        match buckets.get_mut(&scope) {
            Some(bucket) => bucket.count_at(Utc::now().timestamp()),
            None => 0,
        }
    }

    /// Drop every bucket belonging to `guild` (protection disabled).
    pub fn clear_guild(&self, guild: GuildId) {
        self.buckets.lock().retain(|scope, _| scope.guild() != guild);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn action_scope() -> RateScope {
        RateScope::Action {
            guild: 1,
            actor: 2,
            class: ActionClass::RoleUpdate,
        }
    }

    #[test]
    fn test_count_grows_inside_window() {
        let limiter = RateLimiter::new();
        assert_eq!(limiter.record_at(action_scope(), 1000), 1);
        assert_eq!(limiter.record_at(action_scope(), 1001), 2);
        assert_eq!(limiter.record_at(action_scope(), 1059), 3);
    }

    #[test]
    fn test_prune_before_read() {
        let limiter = RateLimiter::new();
        limiter.record_at(action_scope(), 1000);
        limiter.record_at(action_scope(), 1010);
        // 61s later the first two are outside the 60s window.
        assert_eq!(limiter.record_at(action_scope(), 1061), 2);
        assert_eq!(limiter.record_at(action_scope(), 1200), 1);
    }

    #[test]
    fn test_scopes_are_independent() {
        let limiter = RateLimiter::new();
        let other = RateScope::Action {
            guild: 1,
            actor: 2,
            class: ActionClass::ChannelUpdate,
        };
        assert_eq!(limiter.record_at(action_scope(), 1000), 1);
        assert_eq!(limiter.record_at(other, 1000), 1);
        assert_eq!(limiter.record_at(action_scope(), 1001), 2);
    }

    #[test]
    fn test_punishment_window_is_short() {
        let limiter = RateLimiter::new();
        let scope = RateScope::Punishment { guild: 1, actor: 2 };
        limiter.record_at(scope, 1000);
        limiter.record_at(scope, 1001);
        limiter.record_at(scope, 1002);
        // 16s later all three are expired.
        assert_eq!(limiter.record_at(scope, 1018), 1);
    }

    #[test]
    fn test_clear_guild() {
        let limiter = RateLimiter::new();
        limiter.record_at(action_scope(), 1000);
        limiter.record_at(RateScope::Join { guild: 1 }, 1000);
        limiter.record_at(RateScope::Join { guild: 9 }, 1000);
        limiter.clear_guild(1);
        assert_eq!(limiter.record_at(action_scope(), 1001), 1);
        assert_eq!(limiter.record_at(RateScope::Join { guild: 9 }, 1001), 2);
    }
}
