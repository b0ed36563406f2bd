//! Snapshot Store
//!
//! Pre-mutation state captured at event time, keyed by
//! `(guild, cleanup kind, target)`. Pure in-memory working state; losing
//! it across a restart only costs detection fidelity, never correctness.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::platform::types::{ChannelState, GuildId, GuildProfile, RoleId, RoleState, TargetId};

use super::queue::CleanupKind;

/// Captured pre-mutation state, one variant per restorable object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Snapshot {
    Role(RoleState),
    Channel(ChannelState),
    Guild(GuildProfile),
    /// Elevated roles gained in a flagged grant.
    GrantedRoles(Vec<RoleId>),
}

pub struct SnapshotStore {
    inner: Mutex<HashMap<(GuildId, CleanupKind, TargetId), Snapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Store `snapshot` unless a capture for the same key is already
    /// pending. The first mutation in a burst holds the state worth
    /// restoring; later captures of an already-mangled target would
    /// overwrite it with attacker-authored state.
    pub fn capture(
        &self,
        guild: GuildId,
        kind: CleanupKind,
        target: TargetId,
        snapshot: Snapshot,
    ) {
        self.inner
            .lock()
            .entry((guild, kind, target))
            .or_insert(snapshot);
    }

    pub fn peek(&self, guild: GuildId, kind: CleanupKind, target: TargetId) -> Option<Snapshot> {
        self.inner.lock().get(&(guild, kind, target)).cloned()
    }

    /// Remove and return the snapshot; called on terminal task states.
    pub fn discard(
        &self,
        guild: GuildId,
        kind: CleanupKind,
        target: TargetId,
    ) -> Option<Snapshot> {
        self.inner.lock().remove(&(guild, kind, target))
    }

    pub fn clear_guild(&self, guild: GuildId) {
        self.inner.lock().retain(|(g, _, _), _| *g != guild);
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::types::Permissions;

    fn role_state() -> RoleState {
        RoleState {
            id: 7,
            name: "moderator".to_string(),
            permissions: Permissions::KICK_MEMBERS,
            color: 0x2ecc71,
            hoist: true,
            mentionable: false,
            position: 4,
        }
    }

    #[test]
    fn test_first_capture_wins() {
        let store = SnapshotStore::new();
        store.capture(1, CleanupKind::RoleRestore, 7, Snapshot::Role(role_state()));

        let mut mangled = role_state();
        mangled.name = "mangled".to_string();
        store.capture(1, CleanupKind::RoleRestore, 7, Snapshot::Role(mangled));

        match store.peek(1, CleanupKind::RoleRestore, 7) {
            Some(Snapshot::Role(state)) => assert_eq!(state.name, "moderator"),
            other => panic!("unexpected snapshot: {:?}", other),
        }
    }

    #[test]
    fn test_discard_consumes() {
        let store = SnapshotStore::new();
        store.capture(1, CleanupKind::RoleRestore, 7, Snapshot::Role(role_state()));
        assert!(store.discard(1, CleanupKind::RoleRestore, 7).is_some());
        assert!(store.peek(1, CleanupKind::RoleRestore, 7).is_none());
    }
}
