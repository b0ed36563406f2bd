//! Scripted platform for tests. Serves canned guild state and records
//! every mutation call for assertion.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::PlatformError;
use crate::events::{AuditEntry, AuditKind};

use super::types::{
    ActorId, ChannelId, ChannelState, GuildId, GuildProfile, Member, RoleId, RoleState,
    WebhookId, WebhookState,
};
use super::PlatformClient;

#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    Ban { guild: GuildId, actor: ActorId, reason: String },
    Unban { guild: GuildId, actor: ActorId },
    Kick { guild: GuildId, actor: ActorId, reason: String },
    Timeout { guild: GuildId, actor: ActorId },
    RemoveRoles { guild: GuildId, actor: ActorId, roles: Vec<RoleId> },
    CreateRole { guild: GuildId, state: RoleState },
    EditRole { guild: GuildId, role: RoleId, state: RoleState },
    CreateChannel { guild: GuildId, state: ChannelState },
    EditChannel { guild: GuildId, channel: ChannelId, state: ChannelState },
    EditGuild { guild: GuildId, profile: GuildProfile },
    DeleteWebhook { guild: GuildId, webhook: WebhookId },
    SetDefaultRoleSend { guild: GuildId, allow: bool },
}

#[derive(Default)]
pub struct MockState {
    pub owners: HashMap<GuildId, ActorId>,
    pub engine_members: HashMap<GuildId, Member>,
    pub members: HashMap<(GuildId, ActorId), Member>,
    pub audit: Vec<(GuildId, AuditEntry)>,
    pub roles: HashMap<(GuildId, RoleId), RoleState>,
    pub channels: HashMap<(GuildId, ChannelId), ChannelState>,
    pub webhooks: HashMap<(GuildId, ChannelId), Vec<WebhookState>>,
    pub strippable: HashMap<(GuildId, ActorId), Vec<RoleId>>,
    /// Simulate a flaky unban endpoint.
    pub fail_unban: bool,
}

pub struct MockPlatform {
    engine_user: ActorId,
    pub state: Mutex<MockState>,
    calls: Mutex<Vec<PlatformCall>>,
}

impl MockPlatform {
    pub fn new(engine_user: ActorId) -> Self {
        Self {
            engine_user,
            state: Mutex::new(MockState::default()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().clone()
    }

    pub fn count_calls(&self, pred: impl Fn(&PlatformCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn push_audit(&self, guild: GuildId, entry: AuditEntry) {
        self.state.lock().audit.push((guild, entry));
    }

    fn record(&self, call: PlatformCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    fn engine_user(&self) -> ActorId {
        self.engine_user
    }

    async fn guild_owner(&self, guild: GuildId) -> Result<ActorId, PlatformError> {
        self.state
            .lock()
            .owners
            .get(&guild)
            .copied()
            .ok_or_else(|| PlatformError::NotFound(format!("guild {}", guild)))
    }

    async fn engine_member(&self, guild: GuildId) -> Result<Member, PlatformError> {
        self.state
            .lock()
            .engine_members
            .get(&guild)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("engine member in guild {}", guild)))
    }

    async fn member(
        &self,
        guild: GuildId,
        actor: ActorId,
    ) -> Result<Option<Member>, PlatformError> {
        Ok(self.state.lock().members.get(&(guild, actor)).cloned())
    }

    async fn recent_audit(
        &self,
        guild: GuildId,
        kinds: &[AuditKind],
        since: DateTime<Utc>,
    ) -> Result<Vec<AuditEntry>, PlatformError> {
        let mut entries: Vec<AuditEntry> = self
            .state
            .lock()
            .audit
            .iter()
            .filter(|(g, e)| *g == guild && kinds.contains(&e.kind) && e.created_at >= since)
            .map(|(_, e)| e.clone())
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn role(
        &self,
        guild: GuildId,
        role: RoleId,
    ) -> Result<Option<RoleState>, PlatformError> {
        Ok(self.state.lock().roles.get(&(guild, role)).cloned())
    }

    async fn channel(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> Result<Option<ChannelState>, PlatformError> {
        Ok(self.state.lock().channels.get(&(guild, channel)).cloned())
    }

    async fn strippable_roles(
        &self,
        guild: GuildId,
        actor: ActorId,
    ) -> Result<Vec<RoleId>, PlatformError> {
        Ok(self
            .state
            .lock()
            .strippable
            .get(&(guild, actor))
            .cloned()
            .unwrap_or_default())
    }

    async fn webhooks_in(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> Result<Vec<WebhookState>, PlatformError> {
        Ok(self
            .state
            .lock()
            .webhooks
            .get(&(guild, channel))
            .cloned()
            .unwrap_or_default())
    }

    async fn ban(
        &self,
        guild: GuildId,
        actor: ActorId,
        reason: &str,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::Ban {
            guild,
            actor,
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn unban(
        &self,
        guild: GuildId,
        actor: ActorId,
        _reason: &str,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::Unban { guild, actor });
        if self.state.lock().fail_unban {
            return Err(PlatformError::Transport("unban endpoint down".to_string()));
        }
        Ok(())
    }

    async fn kick(
        &self,
        guild: GuildId,
        actor: ActorId,
        reason: &str,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::Kick {
            guild,
            actor,
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn timeout(
        &self,
        guild: GuildId,
        actor: ActorId,
        _until: DateTime<Utc>,
        _reason: &str,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::Timeout { guild, actor });
        Ok(())
    }

    async fn remove_roles(
        &self,
        guild: GuildId,
        actor: ActorId,
        roles: &[RoleId],
        _reason: &str,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::RemoveRoles {
            guild,
            actor,
            roles: roles.to_vec(),
        });
        Ok(())
    }

    async fn create_role(
        &self,
        guild: GuildId,
        state: &RoleState,
        _reason: &str,
    ) -> Result<RoleId, PlatformError> {
        self.record(PlatformCall::CreateRole {
            guild,
            state: state.clone(),
        });
        Ok(state.id)
    }

    async fn edit_role(
        &self,
        guild: GuildId,
        role: RoleId,
        state: &RoleState,
        _reason: &str,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::EditRole {
            guild,
            role,
            state: state.clone(),
        });
        Ok(())
    }

    async fn create_channel(
        &self,
        guild: GuildId,
        state: &ChannelState,
        _reason: &str,
    ) -> Result<ChannelId, PlatformError> {
        self.record(PlatformCall::CreateChannel {
            guild,
            state: state.clone(),
        });
        Ok(state.id)
    }

    async fn edit_channel(
        &self,
        guild: GuildId,
        channel: ChannelId,
        state: &ChannelState,
        _reason: &str,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::EditChannel {
            guild,
            channel,
            state: state.clone(),
        });
        Ok(())
    }

    async fn edit_guild(
        &self,
        guild: GuildId,
        profile: &GuildProfile,
        _reason: &str,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::EditGuild {
            guild,
            profile: profile.clone(),
        });
        Ok(())
    }

    async fn delete_webhook(
        &self,
        guild: GuildId,
        webhook: WebhookId,
        _reason: &str,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::DeleteWebhook { guild, webhook });
        Ok(())
    }

    async fn set_default_role_send(
        &self,
        guild: GuildId,
        allow: bool,
        _reason: &str,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::SetDefaultRoleSend { guild, allow });
        Ok(())
    }
}
