//! Punishment Executor
//!
//! Carries out ban/kick/role-strip against a violating actor. Every call
//! is self rate-limited, hierarchy-checked and capability-gated before
//! anything is sent to the platform; a precondition miss yields
//! `Skipped`, never an error. Nothing here sends user-facing messages.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{EngineConfig, StripScope};
use crate::constants::{MAX_PUNISH_HISTORY, RAID_TIMEOUT_SECS};
use crate::error::PlatformError;
use crate::logic::policy::{ActorListKind, PolicyStore, PunishmentKind, RaidPunishment};
use crate::logic::ratelimit::{RateLimiter, RateScope};
use crate::platform::types::{ActorId, GuildId, Permissions, RoleId};
use crate::platform::PlatformClient;

// ============================================================================
// OUTCOMES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Punishment self-limit exceeded.
    RateLimited,
    /// Actor outranks or matches the engine's rank.
    Hierarchy,
    Owner,
    Trusted,
    /// Engine lacks the capability for the configured kind.
    MissingCapability,
    /// Actor or target vanished before the call landed.
    TargetMissing,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::RateLimited => "rate_limited",
            SkipReason::Hierarchy => "hierarchy",
            SkipReason::Owner => "owner",
            SkipReason::Trusted => "trusted",
            SkipReason::MissingCapability => "missing_capability",
            SkipReason::TargetMissing => "target_missing",
        }
    }
}

/// What was actually done to the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppliedPunishment {
    Ban,
    Kick,
    StripRoles,
    Timeout,
}

impl AppliedPunishment {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppliedPunishment::Ban => "ban",
            AppliedPunishment::Kick => "kick",
            AppliedPunishment::StripRoles => "strip",
            AppliedPunishment::Timeout => "timeout",
        }
    }
}

impl From<PunishmentKind> for AppliedPunishment {
    fn from(kind: PunishmentKind) -> Self {
        match kind {
            PunishmentKind::Ban => AppliedPunishment::Ban,
            PunishmentKind::Kick => AppliedPunishment::Kick,
            PunishmentKind::StripRoles => AppliedPunishment::StripRoles,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PunishOutcome {
    Applied(AppliedPunishment),
    Skipped(SkipReason),
    Failed(String),
}

impl PunishOutcome {
    pub fn applied(&self) -> bool {
        matches!(self, PunishOutcome::Applied(_))
    }
}

/// Outcome of one executor invocation, kept only for logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PunishmentRecord {
    pub id: Uuid,
    pub guild: GuildId,
    pub actor: ActorId,
    pub outcome: PunishOutcome,
    pub reason: String,
    pub at: DateTime<Utc>,
}

// ============================================================================
// HISTORY
// ============================================================================

static PUNISH_HISTORY: Lazy<RwLock<Vec<PunishmentRecord>>> =
    Lazy::new(|| RwLock::new(Vec::new()));

fn record(guild: GuildId, actor: ActorId, reason: &str, outcome: &PunishOutcome) {
    match outcome {
        PunishOutcome::Applied(kind) => {
            log::warn!(
                "punished actor {} in guild {} ({}): {}",
                actor,
                guild,
                kind.as_str(),
                reason
            );
        }
        PunishOutcome::Skipped(why) => {
            log::info!(
                "punishment skipped for actor {} in guild {}: {}",
                actor,
                guild,
                why.as_str()
            );
        }
        PunishOutcome::Failed(e) => {
            log::warn!("punishment failed for actor {} in guild {}: {}", actor, guild, e);
        }
    }

    let mut history = PUNISH_HISTORY.write();
    history.push(PunishmentRecord {
        id: Uuid::new_v4(),
        guild,
        actor,
        outcome: outcome.clone(),
        reason: reason.to_string(),
        at: Utc::now(),
    });
    let len = history.len();
    if len > MAX_PUNISH_HISTORY {
        history.drain(0..len - MAX_PUNISH_HISTORY);
    }
}

/// Most recent punishment records, newest last.
pub fn history(limit: usize) -> Vec<PunishmentRecord> {
    let history = PUNISH_HISTORY.read();
    let start = history.len().saturating_sub(limit);
    history[start..].to_vec()
}

fn from_platform(e: PlatformError) -> PunishOutcome {
    match e {
        PlatformError::Forbidden(_) => PunishOutcome::Skipped(SkipReason::MissingCapability),
        PlatformError::NotFound(_) => PunishOutcome::Skipped(SkipReason::TargetMissing),
        other => PunishOutcome::Failed(other.to_string()),
    }
}

fn required_capability(kind: PunishmentKind) -> Permissions {
    match kind {
        PunishmentKind::Ban => Permissions::BAN_MEMBERS,
        PunishmentKind::Kick => Permissions::KICK_MEMBERS,
        PunishmentKind::StripRoles => Permissions::MANAGE_ROLES,
    }
}

// ============================================================================
// EXECUTOR
// ============================================================================

/// Punish `actor` for a violation in `guild`.
///
/// `flagged_roles` names the roles gained in the flagged action, when the
/// violation was a dangerous grant; with `StripScope::GrantedOnly` only
/// those are removed.
pub async fn punish(
    platform: &dyn PlatformClient,
    store: &PolicyStore,
    limiter: &RateLimiter,
    config: &EngineConfig,
    guild: GuildId,
    actor: ActorId,
    reason: &str,
    flagged_roles: Option<&[RoleId]>,
) -> PunishOutcome {
    let outcome =
        punish_inner(platform, store, limiter, config, guild, actor, reason, flagged_roles).await;
    record(guild, actor, reason, &outcome);
    outcome
}

async fn punish_inner(
    platform: &dyn PlatformClient,
    store: &PolicyStore,
    limiter: &RateLimiter,
    config: &EngineConfig,
    guild: GuildId,
    actor: ActorId,
    reason: &str,
    flagged_roles: Option<&[RoleId]>,
) -> PunishOutcome {
    if limiter.record(RateScope::Punishment { guild, actor }) > config.punish_limit {
        return PunishOutcome::Skipped(SkipReason::RateLimited);
    }

    match store.contains_actor(guild, ActorListKind::Trusted, actor).await {
        Ok(true) => return PunishOutcome::Skipped(SkipReason::Trusted),
        Ok(false) => {}
        Err(e) => return PunishOutcome::Failed(e.to_string()),
    }

    let owner = match platform.guild_owner(guild).await {
        Ok(owner) => owner,
        Err(e) => return from_platform(e),
    };
    if actor == owner {
        return PunishOutcome::Skipped(SkipReason::Owner);
    }

    let engine = match platform.engine_member(guild).await {
        Ok(engine) => engine,
        Err(e) => return from_platform(e),
    };
    let member = match platform.member(guild, actor).await {
        Ok(member) => member,
        Err(e) => return from_platform(e),
    };
    if let Some(m) = &member {
        if m.top_role_position >= engine.top_role_position {
            return PunishOutcome::Skipped(SkipReason::Hierarchy);
        }
    }

    let configured = match store.policy(guild).await {
        Ok(Some(policy)) => policy.punishment,
        Ok(None) => PunishmentKind::Ban,
        Err(e) => return PunishOutcome::Failed(e.to_string()),
    };
    // Bots are never merely kicked or stripped.
    let kind = match &member {
        Some(m) if m.is_bot => PunishmentKind::Ban,
        _ => configured,
    };

    if !engine.permissions.contains(required_capability(kind)) {
        return PunishOutcome::Skipped(SkipReason::MissingCapability);
    }

    let result = match kind {
        PunishmentKind::Ban => platform.ban(guild, actor, reason).await,
        PunishmentKind::Kick => {
            if member.is_none() {
                return PunishOutcome::Skipped(SkipReason::TargetMissing);
            }
            platform.kick(guild, actor, reason).await
        }
        PunishmentKind::StripRoles => {
            if member.is_none() {
                return PunishOutcome::Skipped(SkipReason::TargetMissing);
            }
            let roles = match (config.strip_scope, flagged_roles) {
                (StripScope::GrantedOnly, Some(flagged)) => flagged.to_vec(),
                _ => match platform.strippable_roles(guild, actor).await {
                    Ok(roles) => roles,
                    Err(e) => return from_platform(e),
                },
            };
            if roles.is_empty() {
                Ok(())
            } else {
                platform.remove_roles(guild, actor, &roles, reason).await
            }
        }
    };

    match result {
        Ok(()) => PunishOutcome::Applied(kind.into()),
        Err(e) => from_platform(e),
    }
}

/// Punish a rejected joiner. Joiners carry no rank yet, so only the
/// self-limit and capability gates apply.
pub async fn punish_raid(
    platform: &dyn PlatformClient,
    limiter: &RateLimiter,
    config: &EngineConfig,
    guild: GuildId,
    actor: ActorId,
    kind: RaidPunishment,
    reason: &str,
) -> PunishOutcome {
    let outcome = punish_raid_inner(platform, limiter, config, guild, actor, kind, reason).await;
    record(guild, actor, reason, &outcome);
    outcome
}

async fn punish_raid_inner(
    platform: &dyn PlatformClient,
    limiter: &RateLimiter,
    config: &EngineConfig,
    guild: GuildId,
    actor: ActorId,
    kind: RaidPunishment,
    reason: &str,
) -> PunishOutcome {
    if limiter.record(RateScope::Punishment { guild, actor }) > config.punish_limit {
        return PunishOutcome::Skipped(SkipReason::RateLimited);
    }

    let engine = match platform.engine_member(guild).await {
        Ok(engine) => engine,
        Err(e) => return from_platform(e),
    };
    let (capability, applied) = match kind {
        RaidPunishment::Ban => (Permissions::BAN_MEMBERS, AppliedPunishment::Ban),
        RaidPunishment::Kick => (Permissions::KICK_MEMBERS, AppliedPunishment::Kick),
        RaidPunishment::Timeout => (Permissions::MODERATE_MEMBERS, AppliedPunishment::Timeout),
    };
    if !engine.permissions.contains(capability) {
        return PunishOutcome::Skipped(SkipReason::MissingCapability);
    }

    let result = match kind {
        RaidPunishment::Ban => platform.ban(guild, actor, reason).await,
        RaidPunishment::Kick => platform.kick(guild, actor, reason).await,
        RaidPunishment::Timeout => {
            let until = Utc::now() + Duration::seconds(RAID_TIMEOUT_SECS);
            platform.timeout(guild, actor, until, reason).await
        }
    };

    match result {
        Ok(()) => PunishOutcome::Applied(applied),
        Err(e) => from_platform(e),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::logic::policy::{GuildPolicy, MemoryBackend};
    use crate::platform::mock::{MockPlatform, PlatformCall};
    use crate::platform::types::Member;

    const GUILD: GuildId = 1;
    const OWNER: ActorId = 10;
    const ENGINE_USER: ActorId = 11;

    fn member(id: ActorId, top_role_position: i64, is_bot: bool) -> Member {
        Member {
            id,
            is_bot,
            top_role_position,
            permissions: Permissions::none(),
            role_ids: vec![],
            created_at: Utc::now(),
            has_avatar: true,
        }
    }

    async fn setup(punishment: PunishmentKind) -> (Arc<MockPlatform>, PolicyStore) {
        let platform = Arc::new(MockPlatform::new(ENGINE_USER));
        {
            let mut state = platform.state.lock();
            state.owners.insert(GUILD, OWNER);
            let mut engine = member(ENGINE_USER, 90, true);
            engine.permissions = Permissions::all_of(&[
                Permissions::BAN_MEMBERS,
                Permissions::KICK_MEMBERS,
                Permissions::MANAGE_ROLES,
            ]);
            state.engine_members.insert(GUILD, engine);
        }
        let store = PolicyStore::new(Arc::new(MemoryBackend::new()));
        let mut policy = GuildPolicy::armed_default(GUILD);
        policy.punishment = punishment;
        store.put_policy(policy).await.unwrap();
        (platform, store)
    }

    #[tokio::test]
    async fn test_bot_actor_is_banned_despite_kick_policy() {
        let (platform, store) = setup(PunishmentKind::Kick).await;
        platform
            .state
            .lock()
            .members
            .insert((GUILD, 42), member(42, 5, true));

        let limiter = RateLimiter::new();
        let outcome = punish(
            platform.as_ref(),
            &store,
            &limiter,
            &EngineConfig::default(),
            GUILD,
            42,
            "caught performing webhooks",
            None,
        )
        .await;

        assert_eq!(outcome, PunishOutcome::Applied(AppliedPunishment::Ban));
        assert_eq!(
            platform.count_calls(|c| matches!(c, PlatformCall::Ban { actor: 42, .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_actor_at_engine_rank_is_skipped() {
        let (platform, store) = setup(PunishmentKind::Ban).await;
        platform
            .state
            .lock()
            .members
            .insert((GUILD, 43), member(43, 90, false));

        let limiter = RateLimiter::new();
        let outcome = punish(
            platform.as_ref(),
            &store,
            &limiter,
            &EngineConfig::default(),
            GUILD,
            43,
            "caught performing ban",
            None,
        )
        .await;

        assert_eq!(outcome, PunishOutcome::Skipped(SkipReason::Hierarchy));
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_strip_removes_manageable_roles() {
        let (platform, store) = setup(PunishmentKind::StripRoles).await;
        {
            let mut state = platform.state.lock();
            state.members.insert((GUILD, 44), member(44, 5, false));
            state.strippable.insert((GUILD, 44), vec![70, 71]);
        }

        let limiter = RateLimiter::new();
        let outcome = punish(
            platform.as_ref(),
            &store,
            &limiter,
            &EngineConfig::default(),
            GUILD,
            44,
            "caught performing role_update",
            None,
        )
        .await;

        assert_eq!(outcome, PunishOutcome::Applied(AppliedPunishment::StripRoles));
        assert_eq!(
            platform.count_calls(|c| matches!(
                c,
                PlatformCall::RemoveRoles { actor: 44, roles, .. } if roles == &vec![70, 71]
            )),
            1
        );
    }

    #[tokio::test]
    async fn test_departed_actor_ban_still_lands() {
        // Ban works against a raw id even after the actor leaves.
        let (platform, store) = setup(PunishmentKind::Ban).await;

        let limiter = RateLimiter::new();
        let outcome = punish(
            platform.as_ref(),
            &store,
            &limiter,
            &EngineConfig::default(),
            GUILD,
            45,
            "caught performing channel_update",
            None,
        )
        .await;

        assert_eq!(outcome, PunishOutcome::Applied(AppliedPunishment::Ban));
    }
}
