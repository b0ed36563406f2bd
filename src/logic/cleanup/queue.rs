//! Cleanup Queue
//!
//! Pending restorations, one set per guild, processed under a per-guild
//! async lock so destructive recovery never races itself. Each task walks
//! `Queued -> Attempting -> {Done, Abandoned}`; terminal tasks leave the
//! queue, so re-processing is a no-op. Recovery is best-effort: after the
//! retry budget the task and its snapshot are dropped.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::platform::types::{GuildId, TargetId};
use crate::platform::PlatformClient;

use super::restore::{strategy_for, RestoreContext};
use super::snapshot::SnapshotStore;

// ============================================================================
// TASKS
// ============================================================================

/// Which restore strategy a task selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CleanupKind {
    RoleRestore,
    ChannelRestore,
    GuildRestore,
    WebhookPurge,
    BanReversal,
    RoleGrantStrip,
}

impl CleanupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupKind::RoleRestore => "role_restore",
            CleanupKind::ChannelRestore => "channel_restore",
            CleanupKind::GuildRestore => "guild_restore",
            CleanupKind::WebhookPurge => "webhook_purge",
            CleanupKind::BanReversal => "ban_reversal",
            CleanupKind::RoleGrantStrip => "role_grant_strip",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CleanupTask {
    pub kind: CleanupKind,
    pub target: TargetId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Attempting,
    Done,
    Abandoned,
}

// ============================================================================
// QUEUE
// ============================================================================

pub struct CleanupQueue {
    pending: Mutex<HashMap<GuildId, HashSet<CleanupTask>>>,
    locks: Mutex<HashMap<GuildId, Arc<tokio::sync::Mutex<()>>>>,
}

impl CleanupQueue {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn enqueue(&self, guild: GuildId, task: CleanupTask) {
        let fresh = self.pending.lock().entry(guild).or_default().insert(task);
        if fresh {
            log::info!(
                "queued cleanup {} for target {} in guild {}",
                task.kind.as_str(),
                task.target,
                guild
            );
        }
    }

    pub fn pending_for(&self, guild: GuildId) -> Vec<CleanupTask> {
        self.pending
            .lock()
            .get(&guild)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn clear_guild(&self, guild: GuildId) {
        self.pending.lock().remove(&guild);
    }

    fn guild_lock(&self, guild: GuildId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.lock().entry(guild).or_default().clone()
    }

    fn finish(&self, guild: GuildId, task: CleanupTask, snapshots: &SnapshotStore) {
        if let Some(set) = self.pending.lock().get_mut(&guild) {
            set.remove(&task);
        }
        snapshots.discard(guild, task.kind, task.target);
    }

    /// Run every pending task for `guild`. One in-flight pass per guild;
    /// a second caller waits, then finds the queue drained.
    pub async fn process(
        &self,
        platform: &dyn PlatformClient,
        snapshots: &SnapshotStore,
        config: &EngineConfig,
        guild: GuildId,
    ) {
        let lock = self.guild_lock(guild);
        let _held = lock.lock().await;

        for task in self.pending_for(guild) {
            let state = self.attempt(platform, snapshots, config, guild, task).await;
            debug_assert!(matches!(state, TaskState::Done | TaskState::Abandoned));
            self.finish(guild, task, snapshots);
        }
    }

    async fn attempt(
        &self,
        platform: &dyn PlatformClient,
        snapshots: &SnapshotStore,
        config: &EngineConfig,
        guild: GuildId,
        task: CleanupTask,
    ) -> TaskState {
        let strategy = strategy_for(task.kind);
        let ctx = RestoreContext {
            platform,
            snapshots,
            engine_name: &config.engine_name,
        };

        for attempt in 1..=config.cleanup_max_attempts {
            match strategy.restore(&ctx, guild, task).await {
                Ok(()) => {
                    log::info!(
                        "cleanup {} for target {} in guild {} done (attempt {})",
                        task.kind.as_str(),
                        task.target,
                        guild,
                        attempt
                    );
                    return TaskState::Done;
                }
                Err(e) if e.is_transient() && attempt < config.cleanup_max_attempts => {
                    log::debug!(
                        "cleanup {} attempt {}/{} failed: {}",
                        task.kind.as_str(),
                        attempt,
                        config.cleanup_max_attempts,
                        e
                    );
                    tokio::time::sleep(Duration::from_secs(config.cleanup_backoff_secs)).await;
                }
                Err(e) => {
                    log::warn!(
                        "cleanup {} for target {} in guild {} abandoned: {}",
                        task.kind.as_str(),
                        task.target,
                        guild,
                        e
                    );
                    return TaskState::Abandoned;
                }
            }
        }
        TaskState::Abandoned
    }
}

impl Default for CleanupQueue {
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

    #[test]
    fn test_enqueue_dedupes() {
        let queue = CleanupQueue::new();
        let task = CleanupTask {
            kind: CleanupKind::BanReversal,
            target: 5,
        };
        queue.enqueue(1, task);
        queue.enqueue(1, task);
        assert_eq!(queue.pending_for(1).len(), 1);
    }

    #[test]
    fn test_guilds_are_isolated() {
        let queue = CleanupQueue::new();
        let task = CleanupTask {
            kind: CleanupKind::BanReversal,
            target: 5,
        };
        queue.enqueue(1, task);
        queue.enqueue(2, task);
        queue.clear_guild(1);
        assert!(queue.pending_for(1).is_empty());
        assert_eq!(queue.pending_for(2).len(), 1);
    }
}
