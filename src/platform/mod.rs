//! Platform Boundary
//!
//! The engine talks to the hosting chat platform exclusively through
//! [`PlatformClient`]. Every mutation can fail with a permission-denied or
//! not-found outcome; the engine treats both as expected results, not
//! errors (see [`crate::error::PlatformError`]).

pub mod types;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PlatformError;
use crate::events::{AuditEntry, AuditKind};
use types::{
    ActorId, ChannelId, ChannelState, GuildId, GuildProfile, Member, RoleId, RoleState,
    WebhookId, WebhookState,
};

type PlatformResult<T> = Result<T, PlatformError>;

#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Account id the engine itself acts as.
    fn engine_user(&self) -> ActorId;

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    async fn guild_owner(&self, guild: GuildId) -> PlatformResult<ActorId>;

    /// The engine's own membership in `guild` (capabilities, hierarchy).
    async fn engine_member(&self, guild: GuildId) -> PlatformResult<Member>;

    /// `None` when the actor is no longer a member.
    async fn member(&self, guild: GuildId, actor: ActorId) -> PlatformResult<Option<Member>>;

    /// Audit entries of the given kinds created at or after `since`,
    /// newest first.
    async fn recent_audit(
        &self,
        guild: GuildId,
        kinds: &[AuditKind],
        since: DateTime<Utc>,
    ) -> PlatformResult<Vec<AuditEntry>>;

    async fn role(&self, guild: GuildId, role: RoleId) -> PlatformResult<Option<RoleState>>;

    async fn channel(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> PlatformResult<Option<ChannelState>>;

    /// Roles on `actor` that the engine is permitted to remove.
    async fn strippable_roles(
        &self,
        guild: GuildId,
        actor: ActorId,
    ) -> PlatformResult<Vec<RoleId>>;

    async fn webhooks_in(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> PlatformResult<Vec<WebhookState>>;

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    async fn ban(&self, guild: GuildId, actor: ActorId, reason: &str) -> PlatformResult<()>;

    async fn unban(&self, guild: GuildId, actor: ActorId, reason: &str) -> PlatformResult<()>;

    async fn kick(&self, guild: GuildId, actor: ActorId, reason: &str) -> PlatformResult<()>;

    async fn timeout(
        &self,
        guild: GuildId,
        actor: ActorId,
        until: DateTime<Utc>,
        reason: &str,
    ) -> PlatformResult<()>;

    async fn remove_roles(
        &self,
        guild: GuildId,
        actor: ActorId,
        roles: &[RoleId],
        reason: &str,
    ) -> PlatformResult<()>;

    async fn create_role(
        &self,
        guild: GuildId,
        state: &RoleState,
        reason: &str,
    ) -> PlatformResult<RoleId>;

    async fn edit_role(
        &self,
        guild: GuildId,
        role: RoleId,
        state: &RoleState,
        reason: &str,
    ) -> PlatformResult<()>;

    async fn create_channel(
        &self,
        guild: GuildId,
        state: &ChannelState,
        reason: &str,
    ) -> PlatformResult<ChannelId>;

    async fn edit_channel(
        &self,
        guild: GuildId,
        channel: ChannelId,
        state: &ChannelState,
        reason: &str,
    ) -> PlatformResult<()>;

    async fn edit_guild(
        &self,
        guild: GuildId,
        profile: &GuildProfile,
        reason: &str,
    ) -> PlatformResult<()>;

    async fn delete_webhook(
        &self,
        guild: GuildId,
        webhook: WebhookId,
        reason: &str,
    ) -> PlatformResult<()>;

    /// Allow or deny message-send for the guild's default role (lockdown).
    async fn set_default_role_send(
        &self,
        guild: GuildId,
        allow: bool,
        reason: &str,
    ) -> PlatformResult<()>;
}
