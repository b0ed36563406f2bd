//! Restore Strategies
//!
//! One strategy per cleanup kind, selected by a lookup on the task's
//! kind. Expected outcomes - missing permission, vanished target, missing
//! snapshot - resolve to `Ok` so the queue treats the task as settled;
//! only transient platform failures bubble up for retry.

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::logic::correlate::plain_reason;
use crate::platform::types::GuildId;
use crate::platform::PlatformClient;

use super::queue::{CleanupKind, CleanupTask};
use super::snapshot::{Snapshot, SnapshotStore};

pub struct RestoreContext<'a> {
    pub platform: &'a dyn PlatformClient,
    pub snapshots: &'a SnapshotStore,
    pub engine_name: &'a str,
}

impl RestoreContext<'_> {
    fn reason(&self, base: &str) -> String {
        plain_reason(self.engine_name, base)
    }
}

/// Squash the expected failure modes; keep the retryable ones.
fn settle(result: Result<(), PlatformError>) -> Result<(), PlatformError> {
    match result {
        Err(e) if !e.is_transient() => {
            log::debug!("cleanup step settled without effect: {}", e);
            Ok(())
        }
        other => other,
    }
}

#[async_trait]
pub trait RestoreStrategy: Send + Sync {
    async fn restore(
        &self,
        ctx: &RestoreContext<'_>,
        guild: GuildId,
        task: CleanupTask,
    ) -> Result<(), PlatformError>;
}

pub fn strategy_for(kind: CleanupKind) -> &'static dyn RestoreStrategy {
    match kind {
        CleanupKind::RoleRestore => &RoleRestorer,
        CleanupKind::ChannelRestore => &ChannelRestorer,
        CleanupKind::GuildRestore => &GuildRestorer,
        CleanupKind::WebhookPurge => &WebhookPurger,
        CleanupKind::BanReversal => &BanReverser,
        CleanupKind::RoleGrantStrip => &RoleGrantStripper,
    }
}

// ============================================================================
// STRATEGIES
// ============================================================================

/// Re-apply a role's prior state; recreate it when it was deleted.
struct RoleRestorer;

#[async_trait]
impl RestoreStrategy for RoleRestorer {
    async fn restore(
        &self,
        ctx: &RestoreContext<'_>,
        guild: GuildId,
        task: CleanupTask,
    ) -> Result<(), PlatformError> {
        let state = match ctx.snapshots.peek(guild, task.kind, task.target) {
            Some(Snapshot::Role(state)) => state,
            _ => return Ok(()),
        };
        let existing = match ctx.platform.role(guild, task.target).await {
            Ok(existing) => existing,
            Err(e) => return settle(Err(e)),
        };
        match existing {
            Some(_) => settle(
                ctx.platform
                    .edit_role(guild, task.target, &state, &ctx.reason("restoring role settings"))
                    .await,
            ),
            None => settle(
                ctx.platform
                    .create_role(guild, &state, &ctx.reason("restoring deleted role"))
                    .await
                    .map(|_| ()),
            ),
        }
    }
}

/// Re-apply a channel's prior state; recreate it when it was deleted.
struct ChannelRestorer;

#[async_trait]
impl RestoreStrategy for ChannelRestorer {
    async fn restore(
        &self,
        ctx: &RestoreContext<'_>,
        guild: GuildId,
        task: CleanupTask,
    ) -> Result<(), PlatformError> {
        let state = match ctx.snapshots.peek(guild, task.kind, task.target) {
            Some(Snapshot::Channel(state)) => state,
            _ => return Ok(()),
        };
        let existing = match ctx.platform.channel(guild, task.target).await {
            Ok(existing) => existing,
            Err(e) => return settle(Err(e)),
        };
        match existing {
            Some(_) => settle(
                ctx.platform
                    .edit_channel(
                        guild,
                        task.target,
                        &state,
                        &ctx.reason("restoring channel settings"),
                    )
                    .await,
            ),
            None => settle(
                ctx.platform
                    .create_channel(guild, &state, &ctx.reason("restoring deleted channel"))
                    .await
                    .map(|_| ()),
            ),
        }
    }
}

/// Re-apply the guild profile captured before the change.
struct GuildRestorer;

#[async_trait]
impl RestoreStrategy for GuildRestorer {
    async fn restore(
        &self,
        ctx: &RestoreContext<'_>,
        guild: GuildId,
        task: CleanupTask,
    ) -> Result<(), PlatformError> {
        let profile = match ctx.snapshots.peek(guild, task.kind, task.target) {
            Some(Snapshot::Guild(profile)) => profile,
            _ => return Ok(()),
        };
        settle(
            ctx.platform
                .edit_guild(guild, &profile, &ctx.reason("restoring guild settings"))
                .await,
        )
    }
}

/// Delete every webhook in the affected channel. Failures on one webhook
/// never stop the sweep.
struct WebhookPurger;

#[async_trait]
impl RestoreStrategy for WebhookPurger {
    async fn restore(
        &self,
        ctx: &RestoreContext<'_>,
        guild: GuildId,
        task: CleanupTask,
    ) -> Result<(), PlatformError> {
        let hooks = match ctx.platform.webhooks_in(guild, task.target).await {
            Ok(hooks) => hooks,
            Err(e) => return settle(Err(e)),
        };
        for hook in hooks {
            let result = ctx
                .platform
                .delete_webhook(guild, hook.id, &ctx.reason("removing unauthorized webhook"))
                .await;
            if let Err(e) = result {
                log::debug!("webhook {} not deleted: {}", hook.id, e);
            }
        }
        Ok(())
    }
}

/// Reverse an unauthorized ban.
struct BanReverser;

#[async_trait]
impl RestoreStrategy for BanReverser {
    async fn restore(
        &self,
        ctx: &RestoreContext<'_>,
        guild: GuildId,
        task: CleanupTask,
    ) -> Result<(), PlatformError> {
        settle(
            ctx.platform
                .unban(guild, task.target, &ctx.reason("reversing unauthorized ban"))
                .await,
        )
    }
}

/// Strip dangerously-granted roles from their recipient.
struct RoleGrantStripper;

#[async_trait]
impl RestoreStrategy for RoleGrantStripper {
    async fn restore(
        &self,
        ctx: &RestoreContext<'_>,
        guild: GuildId,
        task: CleanupTask,
    ) -> Result<(), PlatformError> {
        let roles = match ctx.snapshots.peek(guild, task.kind, task.target) {
            Some(Snapshot::GrantedRoles(roles)) => roles,
            _ => return Ok(()),
        };
        if roles.is_empty() {
            return Ok(());
        }
        settle(
            ctx.platform
                .remove_roles(
                    guild,
                    task.target,
                    &roles,
                    &ctx.reason("removing unauthorized roles"),
                )
                .await,
        )
    }
}
