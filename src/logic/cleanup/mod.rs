//! Cleanup Module - Snapshot & Recovery
//!
//! Captures pre-mutation state and, on a violation verdict, runs a
//! best-effort, retried restoration of the damage under a per-guild lock.

pub mod queue;
pub mod restore;
pub mod snapshot;

pub use queue::{CleanupKind, CleanupQueue, CleanupTask, TaskState};
pub use snapshot::{Snapshot, SnapshotStore};
