//! Raid Detector
//!
//! High-frequency consumer of join events. Keeps a join-rate bucket per
//! guild, screens joiners against account-age and avatar heuristics, and
//! flags the guild as raiding when the join rate blows past the fan-in
//! threshold - optionally locking the guild down until lifted.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::logic::correlate::{plain_reason, tag_reason};
use crate::logic::policy::{ActorListKind, PolicyStore};
use crate::logic::ratelimit::{RateLimiter, RateScope};
use crate::logic::response::{punish_raid, PunishOutcome};
use crate::platform::types::{GuildId, Member};
use crate::platform::PlatformClient;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaidStatus {
    Calm,
    Raiding { since_ts: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDenyReason {
    Lockdown,
    Raid,
    AccountAge { days: i64 },
    DefaultAvatar,
}

impl JoinDenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinDenyReason::Lockdown => "lockdown",
            JoinDenyReason::Raid => "raid",
            JoinDenyReason::AccountAge { .. } => "account_age",
            JoinDenyReason::DefaultAvatar => "default_avatar",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    Allowed,
    Denied {
        reason: JoinDenyReason,
        outcome: PunishOutcome,
    },
}

// ============================================================================
// DETECTOR
// ============================================================================

pub struct RaidDetector {
    status: Mutex<HashMap<GuildId, RaidStatus>>,
    lockdown: Mutex<HashSet<GuildId>>,
}

impl RaidDetector {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(HashMap::new()),
            lockdown: Mutex::new(HashSet::new()),
        }
    }

    pub fn status(&self, guild: GuildId) -> RaidStatus {
        self.status
            .lock()
            .get(&guild)
            .copied()
            .unwrap_or(RaidStatus::Calm)
    }

    pub fn is_raiding(&self, guild: GuildId) -> bool {
        matches!(self.status(guild), RaidStatus::Raiding { .. })
    }

    pub fn is_locked(&self, guild: GuildId) -> bool {
        self.lockdown.lock().contains(&guild)
    }

    fn mark_raiding(&self, guild: GuildId, now: DateTime<Utc>) {
        self.status.lock().insert(
            guild,
            RaidStatus::Raiding {
                since_ts: now.timestamp(),
            },
        );
    }

    /// Deny message-send for the default role until explicitly lifted.
    pub async fn engage_lockdown(
        &self,
        platform: &dyn PlatformClient,
        config: &EngineConfig,
        guild: GuildId,
    ) -> EngineResult<()> {
        if !self.lockdown.lock().insert(guild) {
            return Ok(());
        }
        log::warn!("engaging lockdown for guild {}", guild);
        platform
            .set_default_role_send(guild, false, &plain_reason(&config.engine_name, "raid lockdown"))
            .await?;
        Ok(())
    }

    /// Lift the lockdown and return the guild to calm.
    pub async fn lift_lockdown(
        &self,
        platform: &dyn PlatformClient,
        config: &EngineConfig,
        guild: GuildId,
    ) -> EngineResult<()> {
        let was_locked = self.lockdown.lock().remove(&guild);
        self.status.lock().insert(guild, RaidStatus::Calm);
        if was_locked {
            log::info!("lifting lockdown for guild {}", guild);
            platform
                .set_default_role_send(guild, true, &plain_reason(&config.engine_name, "lockdown lifted"))
                .await?;
        }
        Ok(())
    }

    /// Screen one join. Records the join-rate bucket, then checks
    /// lockdown, raid state and the per-joiner heuristics in that order.
    pub async fn handle_join(
        &self,
        platform: &dyn PlatformClient,
        store: &PolicyStore,
        limiter: &RateLimiter,
        config: &EngineConfig,
        guild: GuildId,
        member: &Member,
    ) -> EngineResult<JoinOutcome> {
        let settings = match store.policy(guild).await? {
            Some(policy) => policy.raid,
            None => return Ok(JoinOutcome::Allowed),
        };
        if !settings.enabled {
            return Ok(JoinOutcome::Allowed);
        }
        if store
            .contains_actor(guild, ActorListKind::Whitelist, member.id)
            .await?
        {
            return Ok(JoinOutcome::Allowed);
        }

        let now = Utc::now();
        let join_count = limiter.record(RateScope::Join { guild });

        if self.is_locked(guild) {
            let outcome = self
                .deny(platform, limiter, config, guild, member, "guild is in lockdown", &settings)
                .await;
            return Ok(JoinOutcome::Denied {
                reason: JoinDenyReason::Lockdown,
                outcome,
            });
        }

        if join_count > config.join_rate_threshold && !self.is_raiding(guild) {
            log::warn!(
                "guild {} flagged as raiding: {} joins inside the window",
                guild,
                join_count
            );
            self.mark_raiding(guild, now);
            if settings.auto_lockdown {
                if let Err(e) = self.engage_lockdown(platform, config, guild).await {
                    log::warn!("auto-lockdown failed for guild {}: {}", guild, e);
                }
            }
        }

        if self.is_raiding(guild) {
            let outcome = self
                .deny(platform, limiter, config, guild, member, "mass-join raid in progress", &settings)
                .await;
            return Ok(JoinOutcome::Denied {
                reason: JoinDenyReason::Raid,
                outcome,
            });
        }

        let age_days = member.account_age_days(now);
        if age_days < settings.min_account_age_days as i64 {
            let reason = format!(
                "account age {} days below required {}",
                age_days, settings.min_account_age_days
            );
            let outcome = self
                .deny(platform, limiter, config, guild, member, &reason, &settings)
                .await;
            return Ok(JoinOutcome::Denied {
                reason: JoinDenyReason::AccountAge { days: age_days },
                outcome,
            });
        }

        if settings.default_avatar_check && !member.has_avatar {
            let outcome = self
                .deny(platform, limiter, config, guild, member, "default avatar", &settings)
                .await;
            return Ok(JoinOutcome::Denied {
                reason: JoinDenyReason::DefaultAvatar,
                outcome,
            });
        }

        Ok(JoinOutcome::Allowed)
    }

    async fn deny(
        &self,
        platform: &dyn PlatformClient,
        limiter: &RateLimiter,
        config: &EngineConfig,
        guild: GuildId,
        member: &Member,
        base_reason: &str,
        settings: &crate::logic::policy::RaidSettings,
    ) -> PunishOutcome {
        let reason = tag_reason(&config.engine_name, base_reason, member.id);
        punish_raid(
            platform,
            limiter,
            config,
            guild,
            member.id,
            settings.punishment,
            &reason,
        )
        .await
    }
}

impl Default for RaidDetector {
    fn default() -> Self {
        Self::new()
    }
}
