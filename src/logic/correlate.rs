//! Event Correlator
//!
//! Resolves the actor responsible for a raw state change by reading the
//! most recent matching audit entry inside a short window. Actions the
//! engine performed on a human's behalf carry that human's id at the end
//! of the reason string; the correlator re-attributes such entries. A
//! malformed tag makes the entry unresolved - it is dropped rather than
//! wrongly attributed.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::EngineConfig;
use crate::events::{AuditEntry, AuditKind};
use crate::logic::policy::ActionClass;
use crate::platform::types::{ActorId, GuildId, TargetId};
use crate::platform::PlatformClient;

/// Trailing actor-id tag on engine-issued reasons.
static REASON_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\|\s*(\d+)\s*$").unwrap());

// ============================================================================
// TYPES
// ============================================================================

/// Resolved (action, actor, target, timestamp) tuple.
#[derive(Debug, Clone)]
pub struct CorrelatedAction {
    pub class: ActionClass,
    pub kind: AuditKind,
    /// `None` when the platform lost the actor; such actions are
    /// correlated for completeness but can never violate.
    pub actor: Option<ActorId>,
    pub target: Option<TargetId>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// REASON TAGS
// ============================================================================

/// Reason string for an engine-issued mutation, ending in the
/// machine-parseable id of the actor it was performed against.
pub fn tag_reason(engine_name: &str, base: &str, actor: ActorId) -> String {
    format!("[ {} ] {} | {}", engine_name, base, actor)
}

/// Reason string for engine-issued mutations with no actor to carry
/// (cleanup restorations).
pub fn plain_reason(engine_name: &str, base: &str) -> String {
    format!("[ {} ] {}", engine_name, base)
}

pub fn actor_from_reason(reason: &str) -> Option<ActorId> {
    let caps = REASON_TAG.captures(reason)?;
    caps.get(1)?.as_str().parse().ok()
}

// ============================================================================
// CORRELATION
// ============================================================================

/// Map one raw audit entry onto a correlated action, applying the
/// self-attribution path. Returns `None` for unmonitored kinds and for
/// engine entries whose tag fails to parse.
pub fn correlate_entry(engine_user: ActorId, entry: &AuditEntry) -> Option<CorrelatedAction> {
    let class = entry.kind.action_class()?;

    let actor = match entry.actor {
        Some(actor) if actor == engine_user => match &entry.reason {
            Some(reason) if reason.contains('|') => match actor_from_reason(reason) {
                Some(re_attributed) => Some(re_attributed),
                // Tagged but unparseable: unresolved, never a guess.
                None => {
                    log::debug!(
                        "dropping {} entry with unparseable reason tag: {:?}",
                        entry.kind.as_str(),
                        reason
                    );
                    return None;
                }
            },
            // The engine's own untagged action; immune downstream.
            _ => Some(actor),
        },
        other => other,
    };

    Some(CorrelatedAction {
        class,
        kind: entry.kind,
        actor,
        target: entry.target,
        created_at: entry.created_at,
    })
}

/// Fetch and correlate the most recent audit entry of the wanted kinds.
/// Webhook kinds tolerate more propagation delay than the rest.
pub async fn correlate(
    platform: &dyn PlatformClient,
    config: &EngineConfig,
    guild: GuildId,
    kinds: &[AuditKind],
) -> Option<CorrelatedAction> {
    let window = if kinds.iter().any(AuditKind::is_webhook) {
        config.audit_window_webhook_secs
    } else {
        config.audit_window_secs
    };
    let since = Utc::now() - Duration::seconds(window);

    let entries = match platform.recent_audit(guild, kinds, since).await {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("audit query failed for guild {}: {}", guild, e);
            return None;
        }
    };

    let entry = entries.first()?;
    correlate_entry(platform.engine_user(), entry)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ENGINE: ActorId = 999;

    fn entry(kind: AuditKind, actor: Option<ActorId>, reason: Option<&str>) -> AuditEntry {
        AuditEntry {
            kind,
            actor,
            target: Some(5),
            reason: reason.map(|s| s.to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_reason_tag_round_trip() {
        let reason = tag_reason("guildguard", "caught performing role_update", 1234);
        assert_eq!(actor_from_reason(&reason), Some(1234));
    }

    #[test]
    fn test_plain_actor_is_kept() {
        let action =
            correlate_entry(ENGINE, &entry(AuditKind::RoleDelete, Some(7), None)).unwrap();
        assert_eq!(action.actor, Some(7));
        assert_eq!(action.class, ActionClass::RoleUpdate);
    }

    #[test]
    fn test_engine_entry_is_re_attributed() {
        let reason = tag_reason("guildguard", "caught performing ban", 42);
        let action =
            correlate_entry(ENGINE, &entry(AuditKind::Ban, Some(ENGINE), Some(&reason)))
                .unwrap();
        assert_eq!(action.actor, Some(42));
    }

    #[test]
    fn test_malformed_tag_is_unresolved() {
        let action = correlate_entry(
            ENGINE,
            &entry(AuditKind::Ban, Some(ENGINE), Some("something | not-an-id")),
        );
        assert!(action.is_none());
    }

    #[test]
    fn test_engine_entry_without_tag_stays_engine() {
        let action =
            correlate_entry(ENGINE, &entry(AuditKind::Kick, Some(ENGINE), Some("routine")))
                .unwrap();
        assert_eq!(action.actor, Some(ENGINE));
    }

    #[test]
    fn test_missing_actor_still_correlates() {
        let action = correlate_entry(ENGINE, &entry(AuditKind::GuildUpdate, None, None)).unwrap();
        assert_eq!(action.actor, None);
    }

    #[test]
    fn test_unban_is_not_monitored() {
        assert!(correlate_entry(ENGINE, &entry(AuditKind::Unban, Some(7), None)).is_none());
    }
}
