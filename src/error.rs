//! Error handling

use thiserror::Error;

use crate::platform::types::{ActorId, GuildId};

pub type EngineResult<T> = Result<T, EngineError>;

/// Failures surfaced by the platform collaborator.
///
/// `Forbidden` and `NotFound` are expected outcomes for punishment and
/// cleanup calls and are handled locally; only `RateLimited` and
/// `Transport` are worth retrying.
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    #[error("missing permission: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("platform rate limit hit")]
    RateLimited,

    #[error("transport error: {0}")]
    Transport(String),
}

impl PlatformError {
    /// Whether a retry has any chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, PlatformError::RateLimited | PlatformError::Transport(_))
    }
}

/// Engine-level errors. Event handlers never propagate these to the
/// caller; they are logged and the single event is dropped.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("guild {0} has no protection policy")]
    NotEnabled(GuildId),

    #[error("actor {0} is not trusted to manage protection")]
    NotTrusted(ActorId),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("storage error: {0}")]
    Storage(String),
}
