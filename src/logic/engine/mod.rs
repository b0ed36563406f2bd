//! Protection Engine
//!
//! Wires the pipeline: platform events -> correlator -> classifier ->
//! punishment executor + cleanup queue, with the raid detector as a
//! parallel ingress for joins. Every entry point is fault-isolated: a
//! failing event is logged and dropped, the stream keeps flowing.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::events::{AuditEntry, AuditKind, GuildEvent};
use crate::logic::classify::{classify, ClassifyContext};
use crate::logic::cleanup::{CleanupKind, CleanupQueue, CleanupTask, Snapshot, SnapshotStore};
use crate::logic::correlate::{correlate, correlate_entry, plain_reason, tag_reason, CorrelatedAction};
use crate::logic::policy::{
    ActionClass, ActorListKind, GuildPolicy, PolicyBackend, PolicyStore,
};
use crate::logic::raid::RaidDetector;
use crate::logic::ratelimit::RateLimiter;
use crate::logic::response::punish;
use crate::platform::types::{
    ActorId, ChannelState, GuildId, GuildProfile, Member, RoleId, RoleState,
};
use crate::platform::PlatformClient;


pub struct ProtectionEngine {
    pub(crate) platform: Arc<dyn PlatformClient>,
    pub(crate) store: PolicyStore,
    pub(crate) limiter: RateLimiter,
    pub(crate) snapshots: SnapshotStore,
    pub(crate) cleanup: CleanupQueue,
    pub(crate) raid: RaidDetector,
    pub(crate) config: EngineConfig,
}

impl ProtectionEngine {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        backend: Arc<dyn PolicyBackend>,
        config: EngineConfig,
    ) -> Self {
        Self {
            platform,
            store: PolicyStore::new(backend),
            limiter: RateLimiter::new(),
            snapshots: SnapshotStore::new(),
            cleanup: CleanupQueue::new(),
            raid: RaidDetector::new(),
            config,
        }
    }

    pub fn store(&self) -> &PolicyStore {
        &self.store
    }

    pub fn raid(&self) -> &RaidDetector {
        &self.raid
    }

    /// Top-level ingress. Never fails: one bad event must not halt the
    /// stream, so errors are logged here and swallowed.
    pub async fn handle_event(&self, event: GuildEvent) {
        let guild = event.guild();
        if let Err(e) = self.dispatch(event).await {
            log::error!("event dropped for guild {}: {}", guild, e);
        }
    }

    async fn dispatch(&self, event: GuildEvent) -> EngineResult<()> {
        match event {
            GuildEvent::RoleUpdated { guild, before, after } => {
                self.on_role_updated(guild, before, after).await
            }
            GuildEvent::RoleDeleted { guild, role } => self.on_role_deleted(guild, role).await,
            GuildEvent::ChannelUpdated { guild, before, after } => {
                self.on_channel_updated(guild, before, after).await
            }
            GuildEvent::ChannelDeleted { guild, channel } => {
                self.on_channel_deleted(guild, channel).await
            }
            GuildEvent::GuildUpdated { guild, before, .. } => {
                self.on_guild_updated(guild, before).await
            }
            GuildEvent::WebhooksUpdated { guild, channel } => {
                self.on_webhooks_updated(guild, channel).await
            }
            GuildEvent::AuditEntryCreated { guild, entry } => {
                self.on_audit_entry(guild, entry).await
            }
            GuildEvent::MemberRolesUpdated {
                guild,
                actor,
                added,
                top_role_position,
            } => {
                self.on_member_roles_updated(guild, actor, added, top_role_position)
                    .await
            }
            GuildEvent::MemberJoined { guild, member } => {
                self.on_member_joined(guild, member).await
            }
            GuildEvent::MemberUnbanned { guild, actor } => {
                self.on_member_unbanned(guild, actor).await
            }
        }
    }

    /// Policy lookup gated on the module being armed; `None` short-cuts
    /// the handler before any snapshot or audit traffic.
    async fn armed_policy(
        &self,
        guild: GuildId,
        class: ActionClass,
    ) -> EngineResult<Option<GuildPolicy>> {
        match self.store.policy(guild).await? {
            Some(policy) if policy.armed(class) => Ok(Some(policy)),
            _ => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Mutation handlers
    // ------------------------------------------------------------------

    async fn on_role_updated(
        &self,
        guild: GuildId,
        before: RoleState,
        after: RoleState,
    ) -> EngineResult<()> {
        let Some(policy) = self.armed_policy(guild, ActionClass::RoleUpdate).await? else {
            return Ok(());
        };
        // Edits to roles without elevated authority are never punishable.
        if !after.permissions.is_elevated() {
            return Ok(());
        }
        let target = after.id;
        self.snapshots
            .capture(guild, CleanupKind::RoleRestore, target, Snapshot::Role(before));
        self.run_pipeline(
            &policy,
            guild,
            &[AuditKind::RoleUpdate],
            Some(CleanupTask {
                kind: CleanupKind::RoleRestore,
                target,
            }),
            None,
        )
        .await
    }

    async fn on_role_deleted(&self, guild: GuildId, role: RoleState) -> EngineResult<()> {
        let Some(policy) = self.armed_policy(guild, ActionClass::RoleUpdate).await? else {
            return Ok(());
        };
        let target = role.id;
        self.snapshots
            .capture(guild, CleanupKind::RoleRestore, target, Snapshot::Role(role));
        self.run_pipeline(
            &policy,
            guild,
            &[AuditKind::RoleDelete],
            Some(CleanupTask {
                kind: CleanupKind::RoleRestore,
                target,
            }),
            None,
        )
        .await
    }

    async fn on_channel_updated(
        &self,
        guild: GuildId,
        before: ChannelState,
        after: ChannelState,
    ) -> EngineResult<()> {
        let Some(policy) = self.armed_policy(guild, ActionClass::ChannelUpdate).await? else {
            return Ok(());
        };
        let target = after.id;
        self.snapshots.capture(
            guild,
            CleanupKind::ChannelRestore,
            target,
            Snapshot::Channel(before),
        );
        self.run_pipeline(
            &policy,
            guild,
            &[AuditKind::ChannelUpdate],
            Some(CleanupTask {
                kind: CleanupKind::ChannelRestore,
                target,
            }),
            None,
        )
        .await
    }

    async fn on_channel_deleted(
        &self,
        guild: GuildId,
        channel: ChannelState,
    ) -> EngineResult<()> {
        let Some(policy) = self.armed_policy(guild, ActionClass::ChannelUpdate).await? else {
            return Ok(());
        };
        let target = channel.id;
        self.snapshots.capture(
            guild,
            CleanupKind::ChannelRestore,
            target,
            Snapshot::Channel(channel),
        );
        self.run_pipeline(
            &policy,
            guild,
            &[AuditKind::ChannelDelete],
            Some(CleanupTask {
                kind: CleanupKind::ChannelRestore,
                target,
            }),
            None,
        )
        .await
    }

    async fn on_guild_updated(&self, guild: GuildId, before: GuildProfile) -> EngineResult<()> {
        let Some(policy) = self.armed_policy(guild, ActionClass::GuildUpdate).await? else {
            return Ok(());
        };
        self.snapshots
            .capture(guild, CleanupKind::GuildRestore, guild, Snapshot::Guild(before));
        self.run_pipeline(
            &policy,
            guild,
            &[AuditKind::GuildUpdate],
            Some(CleanupTask {
                kind: CleanupKind::GuildRestore,
                target: guild,
            }),
            None,
        )
        .await
    }

    async fn on_webhooks_updated(&self, guild: GuildId, channel: u64) -> EngineResult<()> {
        let Some(policy) = self.armed_policy(guild, ActionClass::Webhook).await? else {
            return Ok(());
        };
        self.run_pipeline(
            &policy,
            guild,
            &[AuditKind::WebhookCreate, AuditKind::WebhookUpdate],
            Some(CleanupTask {
                kind: CleanupKind::WebhookPurge,
                target: channel,
            }),
            None,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Member-action handlers
    // ------------------------------------------------------------------

    async fn on_audit_entry(&self, guild: GuildId, entry: AuditEntry) -> EngineResult<()> {
        if !matches!(
            entry.kind,
            AuditKind::Kick | AuditKind::Ban | AuditKind::MemberPrune
        ) {
            return Ok(());
        }
        let Some(class) = entry.kind.action_class() else {
            return Ok(());
        };
        let Some(policy) = self.armed_policy(guild, class).await? else {
            return Ok(());
        };
        let Some(action) = correlate_entry(self.platform.engine_user(), &entry) else {
            return Ok(());
        };
        // Bans are the only member action with something to undo.
        let cleanup = match (entry.kind, entry.target) {
            (AuditKind::Ban, Some(target)) => Some(CleanupTask {
                kind: CleanupKind::BanReversal,
                target,
            }),
            _ => None,
        };
        self.handle_correlated(&policy, guild, &action, cleanup, None)
            .await
    }

    async fn on_member_roles_updated(
        &self,
        guild: GuildId,
        actor: ActorId,
        added: Vec<RoleState>,
        top_role_position: i64,
    ) -> EngineResult<()> {
        let Some(policy) = self.armed_policy(guild, ActionClass::RoleUpdate).await? else {
            return Ok(());
        };
        let dangerous: Vec<RoleId> = added
            .iter()
            .filter(|r| r.permissions.is_elevated())
            .map(|r| r.id)
            .collect();
        if dangerous.is_empty() {
            return Ok(());
        }
        // The engine cannot strip roles from someone it no longer outranks.
        let engine = self.platform.engine_member(guild).await?;
        if engine.top_role_position <= top_role_position {
            return Ok(());
        }
        self.snapshots.capture(
            guild,
            CleanupKind::RoleGrantStrip,
            actor,
            Snapshot::GrantedRoles(dangerous.clone()),
        );
        self.run_pipeline(
            &policy,
            guild,
            &[AuditKind::MemberRoleUpdate],
            Some(CleanupTask {
                kind: CleanupKind::RoleGrantStrip,
                target: actor,
            }),
            Some((actor, dangerous.as_slice())),
        )
        .await
    }

    async fn on_member_joined(&self, guild: GuildId, member: Member) -> EngineResult<()> {
        if self
            .store
            .contains_actor(guild, ActorListKind::Hardban, member.id)
            .await?
        {
            log::info!("hard-banned actor {} rejoined guild {}", member.id, guild);
            self.platform
                .ban(
                    guild,
                    member.id,
                    &plain_reason(&self.config.engine_name, "actor is hard-banned"),
                )
                .await?;
            return Ok(());
        }

        if member.is_bot {
            if let Some(policy) = self.armed_policy(guild, ActionClass::BotAdd).await? {
                self.run_pipeline(&policy, guild, &[AuditKind::BotAdd], None, None)
                    .await?;
            }
        }

        let outcome = self
            .raid
            .handle_join(
                self.platform.as_ref(),
                &self.store,
                &self.limiter,
                &self.config,
                guild,
                &member,
            )
            .await?;
        log::debug!("join screening for actor {} in guild {}: {:?}", member.id, guild, outcome);
        Ok(())
    }

    async fn on_member_unbanned(&self, guild: GuildId, actor: ActorId) -> EngineResult<()> {
        if self
            .store
            .contains_actor(guild, ActorListKind::Hardban, actor)
            .await?
        {
            log::info!("re-banning hard-banned actor {} in guild {}", actor, guild);
            self.platform
                .ban(
                    guild,
                    actor,
                    &plain_reason(&self.config.engine_name, "actor is hard-banned"),
                )
                .await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------

    async fn run_pipeline(
        &self,
        policy: &GuildPolicy,
        guild: GuildId,
        kinds: &[AuditKind],
        cleanup: Option<CleanupTask>,
        flagged: Option<(ActorId, &[RoleId])>,
    ) -> EngineResult<()> {
        let Some(action) =
            correlate(self.platform.as_ref(), &self.config, guild, kinds).await
        else {
            return Ok(());
        };
        self.handle_correlated(policy, guild, &action, cleanup, flagged)
            .await
    }

    async fn handle_correlated(
        &self,
        policy: &GuildPolicy,
        guild: GuildId,
        action: &CorrelatedAction,
        cleanup: Option<CleanupTask>,
        flagged: Option<(ActorId, &[RoleId])>,
    ) -> EngineResult<()> {
        let whitelist = self.store.actor_set(guild, ActorListKind::Whitelist).await?;
        let owner = self.platform.guild_owner(guild).await?;
        let engine_member = self.platform.engine_member(guild).await?;
        let actor_member = match action.actor {
            Some(actor) => self.platform.member(guild, actor).await?,
            None => None,
        };

        let ctx = ClassifyContext {
            policy,
            whitelist: &whitelist,
            owner,
            engine_user: self.platform.engine_user(),
            engine_top_role: engine_member.top_role_position,
            actor_top_role: actor_member.map(|m| m.top_role_position),
        };
        let verdict = classify(guild, action, &ctx, &self.limiter);

        if !verdict.is_violation() {
            log::debug!(
                "pass for {} in guild {}: {:?}",
                action.class,
                guild,
                verdict
            );
            return Ok(());
        }

        if let Some(task) = cleanup {
            self.cleanup.enqueue(guild, task);
        }

        if let Some(actor) = action.actor {
            // Granted roles only bound the strip when the violator granted
            // them to themself; a third-party granter never held them.
            let flagged_roles = match flagged {
                Some((recipient, roles)) if recipient == actor => Some(roles),
                _ => None,
            };
            let reason = tag_reason(
                &self.config.engine_name,
                &format!("caught performing {}", action.class),
                actor,
            );
            punish(
                self.platform.as_ref(),
                &self.store,
                &self.limiter,
                &self.config,
                guild,
                actor,
                &reason,
                flagged_roles,
            )
            .await;
        }

        self.cleanup
            .process(self.platform.as_ref(), &self.snapshots, &self.config, guild)
            .await;
        Ok(())
    }
}
