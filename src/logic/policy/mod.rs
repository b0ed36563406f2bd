//! Policy Module - Per-Guild Configuration
//!
//! Types plus the read-through store. Decision logic lives in
//! `logic::classify`.

pub mod store;
pub mod types;

pub use store::{ActorListKind, MemoryBackend, PolicyBackend, PolicyStore};
pub use types::{
    ActionClass, GuildPolicy, ModuleSettings, PunishmentKind, RaidPunishment, RaidSettings,
};
