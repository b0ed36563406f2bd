//! Admin Surface
//!
//! Operations the admin-command collaborator calls against the engine.
//! Every mutating call names its invoker and is gated on the invoker
//! being the guild owner or on the trust list.

use crate::error::{EngineError, EngineResult};
use crate::logic::engine::ProtectionEngine;
use crate::logic::policy::{
    ActionClass, ActorListKind, GuildPolicy, PunishmentKind, RaidPunishment,
};
use crate::platform::types::{ActorId, GuildId};

impl ProtectionEngine {
    /// Owner or trusted actors may manage protection.
    pub async fn is_trusted(&self, guild: GuildId, actor: ActorId) -> EngineResult<bool> {
        if self.platform.guild_owner(guild).await? == actor {
            return Ok(true);
        }
        self.store
            .contains_actor(guild, ActorListKind::Trusted, actor)
            .await
    }

    async fn ensure_trusted(&self, guild: GuildId, invoker: ActorId) -> EngineResult<()> {
        if self.is_trusted(guild, invoker).await? {
            Ok(())
        } else {
            Err(EngineError::NotTrusted(invoker))
        }
    }

    async fn policy_or_err(&self, guild: GuildId) -> EngineResult<GuildPolicy> {
        self.store
            .policy(guild)
            .await?
            .ok_or(EngineError::NotEnabled(guild))
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Arm every module at threshold 0.
    pub async fn enable(&self, guild: GuildId, invoker: ActorId) -> EngineResult<()> {
        self.ensure_trusted(guild, invoker).await?;
        self.store
            .put_policy(GuildPolicy::armed_default(guild))
            .await?;
        log::info!("protection enabled for guild {} by {}", guild, invoker);
        Ok(())
    }

    /// Delete the policy and drop all working state for the guild.
    pub async fn disable(&self, guild: GuildId, invoker: ActorId) -> EngineResult<()> {
        self.ensure_trusted(guild, invoker).await?;
        self.store.delete_policy(guild).await?;
        self.limiter.clear_guild(guild);
        self.snapshots.clear_guild(guild);
        self.cleanup.clear_guild(guild);
        log::info!("protection disabled for guild {} by {}", guild, invoker);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Module configuration
    // ------------------------------------------------------------------

    pub async fn set_module(
        &self,
        guild: GuildId,
        invoker: ActorId,
        class: ActionClass,
        armed: bool,
        threshold: Option<u32>,
    ) -> EngineResult<()> {
        self.ensure_trusted(guild, invoker).await?;
        let mut policy = self.policy_or_err(guild).await?;
        policy.set_module(class, armed, threshold);
        self.store.put_policy(policy).await
    }

    pub async fn set_punishment(
        &self,
        guild: GuildId,
        invoker: ActorId,
        kind: PunishmentKind,
    ) -> EngineResult<()> {
        self.ensure_trusted(guild, invoker).await?;
        let mut policy = self.policy_or_err(guild).await?;
        policy.punishment = kind;
        self.store.put_policy(policy).await
    }

    pub async fn threshold(&self, guild: GuildId, class: ActionClass) -> EngineResult<u32> {
        Ok(self
            .store
            .policy(guild)
            .await?
            .map(|p| p.threshold(class))
            .unwrap_or(0))
    }

    /// Available module names, for the command surface's listings.
    pub fn modules() -> &'static [ActionClass] {
        &ActionClass::ALL
    }

    /// Current policy, for the command surface's settings view.
    pub async fn settings(&self, guild: GuildId) -> EngineResult<Option<GuildPolicy>> {
        self.store.policy(guild).await
    }

    // ------------------------------------------------------------------
    // Actor lists
    // ------------------------------------------------------------------

    pub async fn toggle_whitelist(
        &self,
        guild: GuildId,
        invoker: ActorId,
        actor: ActorId,
    ) -> EngineResult<bool> {
        self.ensure_trusted(guild, invoker).await?;
        self.store
            .toggle_actor(guild, ActorListKind::Whitelist, actor)
            .await
    }

    pub async fn toggle_trusted(
        &self,
        guild: GuildId,
        invoker: ActorId,
        actor: ActorId,
    ) -> EngineResult<bool> {
        self.ensure_trusted(guild, invoker).await?;
        self.store
            .toggle_actor(guild, ActorListKind::Trusted, actor)
            .await
    }

    pub async fn toggle_hardban(
        &self,
        guild: GuildId,
        invoker: ActorId,
        actor: ActorId,
    ) -> EngineResult<bool> {
        self.ensure_trusted(guild, invoker).await?;
        self.store
            .toggle_actor(guild, ActorListKind::Hardban, actor)
            .await
    }

    pub async fn list_whitelisted(&self, guild: GuildId) -> EngineResult<Vec<ActorId>> {
        let mut actors: Vec<ActorId> = self
            .store
            .actor_set(guild, ActorListKind::Whitelist)
            .await?
            .into_iter()
            .collect();
        actors.sort_unstable();
        Ok(actors)
    }

    pub async fn list_trusted(&self, guild: GuildId) -> EngineResult<Vec<ActorId>> {
        let mut actors: Vec<ActorId> = self
            .store
            .actor_set(guild, ActorListKind::Trusted)
            .await?
            .into_iter()
            .collect();
        actors.sort_unstable();
        Ok(actors)
    }

    // ------------------------------------------------------------------
    // Raid configuration
    // ------------------------------------------------------------------

    pub async fn set_raid_enabled(
        &self,
        guild: GuildId,
        invoker: ActorId,
        enabled: bool,
    ) -> EngineResult<()> {
        self.ensure_trusted(guild, invoker).await?;
        let mut policy = self.policy_or_err(guild).await?;
        policy.raid.enabled = enabled;
        self.store.put_policy(policy).await
    }

    pub async fn set_min_account_age(
        &self,
        guild: GuildId,
        invoker: ActorId,
        days: u32,
    ) -> EngineResult<()> {
        self.ensure_trusted(guild, invoker).await?;
        let mut policy = self.policy_or_err(guild).await?;
        policy.raid.min_account_age_days = days;
        self.store.put_policy(policy).await
    }

    pub async fn set_default_avatar_check(
        &self,
        guild: GuildId,
        invoker: ActorId,
        enabled: bool,
    ) -> EngineResult<()> {
        self.ensure_trusted(guild, invoker).await?;
        let mut policy = self.policy_or_err(guild).await?;
        policy.raid.default_avatar_check = enabled;
        self.store.put_policy(policy).await
    }

    pub async fn set_raid_punishment(
        &self,
        guild: GuildId,
        invoker: ActorId,
        kind: RaidPunishment,
    ) -> EngineResult<()> {
        self.ensure_trusted(guild, invoker).await?;
        let mut policy = self.policy_or_err(guild).await?;
        policy.raid.punishment = kind;
        self.store.put_policy(policy).await
    }

    // ------------------------------------------------------------------
    // Lockdown
    // ------------------------------------------------------------------

    pub async fn lockdown(&self, guild: GuildId, invoker: ActorId) -> EngineResult<()> {
        self.ensure_trusted(guild, invoker).await?;
        self.raid
            .engage_lockdown(self.platform.as_ref(), &self.config, guild)
            .await
    }

    pub async fn lift_lockdown(&self, guild: GuildId, invoker: ActorId) -> EngineResult<()> {
        self.ensure_trusted(guild, invoker).await?;
        self.raid
            .lift_lockdown(self.platform.as_ref(), &self.config, guild)
            .await
    }
}
