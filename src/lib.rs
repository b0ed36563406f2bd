//! GuildGuard Core - Guild Protection Engine
//!
//! Observes administrative state changes and membership events inside a
//! guild, decides whether an actor is behaving maliciously, and reacts
//! with rate-limited, hierarchy-aware punishments plus best-effort
//! rollback of damage already done.
//!
//! The pipeline is one-directional:
//! platform events -> correlator -> classifier -> executor + cleanup,
//! with the raid detector as a parallel ingress for join events. State is
//! single-process and in-memory; restarting only loses some detection
//! fidelity, never correctness.

pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logic;
pub mod platform;

pub use config::{EngineConfig, StripScope};
pub use error::{EngineError, EngineResult, PlatformError};
pub use events::{AuditEntry, AuditKind, GuildEvent};
pub use logic::classify::{PassReason, Verdict};
pub use logic::cleanup::{CleanupKind, CleanupTask, Snapshot};
pub use logic::engine::ProtectionEngine;
pub use logic::policy::{
    ActionClass, ActorListKind, GuildPolicy, MemoryBackend, ModuleSettings, PolicyBackend,
    PolicyStore, PunishmentKind, RaidPunishment, RaidSettings,
};
pub use logic::raid::{JoinDenyReason, JoinOutcome, RaidStatus};
pub use logic::ratelimit::{RateLimiter, RateScope};
pub use logic::response::{AppliedPunishment, PunishOutcome, PunishmentRecord, SkipReason};
pub use platform::types::{
    ActorId, ChannelId, ChannelState, GuildId, GuildProfile, Member, Permissions, RoleId,
    RoleState, WebhookState,
};
pub use platform::PlatformClient;
