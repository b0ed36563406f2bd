//! Policy Store
//!
//! Read-through cache over a pluggable durable backend. The admin-command
//! collaborator owns the storage; this engine only reads policies and
//! actor lists, and invalidates the cache on every write it performs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::EngineResult;
use crate::platform::types::{ActorId, GuildId};

use super::types::GuildPolicy;

// ============================================================================
// BACKEND
// ============================================================================

/// Per-guild actor sets the store tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorListKind {
    /// Fully immune to detection.
    Whitelist,
    /// May run admin commands; exempt from punishment.
    Trusted,
    /// Banned on sight; unbans are reverted.
    Hardban,
}

impl ActorListKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorListKind::Whitelist => "whitelist",
            ActorListKind::Trusted => "trusted",
            ActorListKind::Hardban => "hardban",
        }
    }
}

/// Durable storage boundary. Implementations live with the
/// admin-command surface; the in-memory one below backs tests and
/// single-process deployments.
#[async_trait]
pub trait PolicyBackend: Send + Sync {
    async fn load_policy(&self, guild: GuildId) -> EngineResult<Option<GuildPolicy>>;
    async fn store_policy(&self, policy: &GuildPolicy) -> EngineResult<()>;
    async fn delete_policy(&self, guild: GuildId) -> EngineResult<()>;

    async fn load_actors(
        &self,
        guild: GuildId,
        kind: ActorListKind,
    ) -> EngineResult<HashSet<ActorId>>;
    async fn store_actors(
        &self,
        guild: GuildId,
        kind: ActorListKind,
        actors: &HashSet<ActorId>,
    ) -> EngineResult<()>;
}

// ============================================================================
// STORE
// ============================================================================

pub struct PolicyStore {
    backend: Arc<dyn PolicyBackend>,
    policies: RwLock<HashMap<GuildId, GuildPolicy>>,
    actors: RwLock<HashMap<(GuildId, ActorListKind), HashSet<ActorId>>>,
}

impl PolicyStore {
    pub fn new(backend: Arc<dyn PolicyBackend>) -> Self {
        Self {
            backend,
            policies: RwLock::new(HashMap::new()),
            actors: RwLock::new(HashMap::new()),
        }
    }

    /// Current policy for `guild`, or `None` when protection is disabled.
    pub async fn policy(&self, guild: GuildId) -> EngineResult<Option<GuildPolicy>> {
        if let Some(policy) = self.policies.read().get(&guild) {
            return Ok(Some(policy.clone()));
        }
        let loaded = self.backend.load_policy(guild).await?;
        if let Some(policy) = &loaded {
            self.policies.write().insert(guild, policy.clone());
        }
        Ok(loaded)
    }

    pub async fn put_policy(&self, policy: GuildPolicy) -> EngineResult<()> {
        self.backend.store_policy(&policy).await?;
        self.policies.write().insert(policy.guild_id, policy);
        Ok(())
    }

    pub async fn delete_policy(&self, guild: GuildId) -> EngineResult<()> {
        self.backend.delete_policy(guild).await?;
        self.policies.write().remove(&guild);
        Ok(())
    }

    /// Drop the cached policy so the next read hits the backend. Called
    /// by the admin surface after out-of-band writes.
    pub fn invalidate(&self, guild: GuildId) {
        self.policies.write().remove(&guild);
        let mut actors = self.actors.write();
        actors.retain(|(g, _), _| *g != guild);
    }

    pub async fn actor_set(
        &self,
        guild: GuildId,
        kind: ActorListKind,
    ) -> EngineResult<HashSet<ActorId>> {
        if let Some(set) = self.actors.read().get(&(guild, kind)) {
            return Ok(set.clone());
        }
        let loaded = self.backend.load_actors(guild, kind).await?;
        self.actors.write().insert((guild, kind), loaded.clone());
        Ok(loaded)
    }

    pub async fn contains_actor(
        &self,
        guild: GuildId,
        kind: ActorListKind,
        actor: ActorId,
    ) -> EngineResult<bool> {
        Ok(self.actor_set(guild, kind).await?.contains(&actor))
    }

    /// Add or remove `actor`; returns true when the actor is now present.
    pub async fn toggle_actor(
        &self,
        guild: GuildId,
        kind: ActorListKind,
        actor: ActorId,
    ) -> EngineResult<bool> {
        let mut set = self.actor_set(guild, kind).await?;
        let present = if set.remove(&actor) {
            false
        } else {
            set.insert(actor);
            true
        };
        self.backend.store_actors(guild, kind, &set).await?;
        self.actors.write().insert((guild, kind), set);
        Ok(present)
    }
}

// ============================================================================
// IN-MEMORY BACKEND
// ============================================================================

/// Backend holding everything in process memory. State does not survive
/// a restart; the engine only loses detection fidelity when that happens.
#[derive(Default)]
pub struct MemoryBackend {
    policies: RwLock<HashMap<GuildId, GuildPolicy>>,
    actors: RwLock<HashMap<(GuildId, ActorListKind), HashSet<ActorId>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyBackend for MemoryBackend {
    async fn load_policy(&self, guild: GuildId) -> EngineResult<Option<GuildPolicy>> {
        Ok(self.policies.read().get(&guild).cloned())
    }

    async fn store_policy(&self, policy: &GuildPolicy) -> EngineResult<()> {
        self.policies.write().insert(policy.guild_id, policy.clone());
        Ok(())
    }

    async fn delete_policy(&self, guild: GuildId) -> EngineResult<()> {
        self.policies.write().remove(&guild);
        Ok(())
    }

    async fn load_actors(
        &self,
        guild: GuildId,
        kind: ActorListKind,
    ) -> EngineResult<HashSet<ActorId>> {
        Ok(self
            .actors
            .read()
            .get(&(guild, kind))
            .cloned()
            .unwrap_or_default())
    }

    async fn store_actors(
        &self,
        guild: GuildId,
        kind: ActorListKind,
        actors: &HashSet<ActorId>,
    ) -> EngineResult<()> {
        self.actors.write().insert((guild, kind), actors.clone());
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PolicyStore {
        PolicyStore::new(Arc::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn test_read_through_and_invalidate() {
        let store = store();
        assert!(store.policy(1).await.unwrap().is_none());

        store
            .put_policy(GuildPolicy::armed_default(1))
            .await
            .unwrap();
        assert!(store.policy(1).await.unwrap().is_some());

        // Invalidation alone must not lose the durable copy.
        store.invalidate(1);
        assert!(store.policy(1).await.unwrap().is_some());

        store.delete_policy(1).await.unwrap();
        assert!(store.policy(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_toggle_actor_round_trip() {
        let store = store();
        assert!(store
            .toggle_actor(1, ActorListKind::Whitelist, 42)
            .await
            .unwrap());
        assert!(store
            .contains_actor(1, ActorListKind::Whitelist, 42)
            .await
            .unwrap());
        // Same actor, other list: independent.
        assert!(!store
            .contains_actor(1, ActorListKind::Trusted, 42)
            .await
            .unwrap());
        assert!(!store
            .toggle_actor(1, ActorListKind::Whitelist, 42)
            .await
            .unwrap());
        assert!(!store
            .contains_actor(1, ActorListKind::Whitelist, 42)
            .await
            .unwrap());
    }
}
