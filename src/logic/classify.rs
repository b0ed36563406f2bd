//! Abuse Classifier
//!
//! Turns a correlated action into a PASS/VIOLATION verdict. The decision
//! short-circuits at the first matching rule, in this order: module
//! disarmed, whitelist, owner/self/hierarchy immunity, then the rate
//! bucket against the configured threshold.

use std::collections::HashSet;

use crate::logic::correlate::CorrelatedAction;
use crate::logic::policy::GuildPolicy;
use crate::logic::ratelimit::{RateLimiter, RateScope};
use crate::platform::types::{ActorId, GuildId};

// ============================================================================
// VERDICTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass(PassReason),
    Violation,
}

impl Verdict {
    pub fn is_violation(&self) -> bool {
        matches!(self, Verdict::Violation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    Disarmed,
    NoActor,
    Whitelisted,
    Owner,
    EngineSelf,
    Hierarchy,
    UnderThreshold,
}

impl PassReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassReason::Disarmed => "module disarmed",
            PassReason::NoActor => "no resolved actor",
            PassReason::Whitelisted => "actor whitelisted",
            PassReason::Owner => "actor is guild owner",
            PassReason::EngineSelf => "engine's own action",
            PassReason::Hierarchy => "actor outranks engine",
            PassReason::UnderThreshold => "under threshold",
        }
    }
}

// ============================================================================
// CONTEXT
// ============================================================================

/// Everything the verdict depends on, assembled by the engine so the
/// decision itself stays synchronous and testable.
pub struct ClassifyContext<'a> {
    pub policy: &'a GuildPolicy,
    pub whitelist: &'a HashSet<ActorId>,
    pub owner: ActorId,
    pub engine_user: ActorId,
    /// Position of the engine's highest role in the guild.
    pub engine_top_role: i64,
    /// Position of the actor's highest role; `None` when the actor is no
    /// longer a member.
    pub actor_top_role: Option<i64>,
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

pub fn classify(
    guild: GuildId,
    action: &CorrelatedAction,
    ctx: &ClassifyContext<'_>,
    limiter: &RateLimiter,
) -> Verdict {
    if !ctx.policy.armed(action.class) {
        return Verdict::Pass(PassReason::Disarmed);
    }

    let actor = match action.actor {
        Some(actor) => actor,
        None => return Verdict::Pass(PassReason::NoActor),
    };

    if ctx.whitelist.contains(&actor) {
        return Verdict::Pass(PassReason::Whitelisted);
    }
    if actor == ctx.owner {
        return Verdict::Pass(PassReason::Owner);
    }
    if actor == ctx.engine_user {
        return Verdict::Pass(PassReason::EngineSelf);
    }
    // An actor at or above the engine's rank cannot safely be acted on.
    if let Some(top) = ctx.actor_top_role {
        if top >= ctx.engine_top_role {
            return Verdict::Pass(PassReason::Hierarchy);
        }
    }

    let count = limiter.record(RateScope::Action {
        guild,
        actor,
        class: action.class,
    });
    let threshold = ctx.policy.threshold(action.class) as usize;

    if count > threshold {
        log::warn!(
            "violation: actor {} hit {} x{} in window (threshold {}) in guild {}",
            actor,
            action.class,
            count,
            threshold,
            guild
        );
        Verdict::Violation
    } else {
        Verdict::Pass(PassReason::UnderThreshold)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AuditKind;
    use crate::logic::policy::ActionClass;
    use chrono::Utc;

    const GUILD: GuildId = 1;
    const OWNER: ActorId = 10;
    const ENGINE: ActorId = 11;
    const ACTOR: ActorId = 12;

    fn action(class: ActionClass, actor: Option<ActorId>) -> CorrelatedAction {
        CorrelatedAction {
            class,
            kind: AuditKind::RoleUpdate,
            actor,
            target: Some(5),
            created_at: Utc::now(),
        }
    }

    fn ctx<'a>(
        policy: &'a GuildPolicy,
        whitelist: &'a HashSet<ActorId>,
        actor_top_role: Option<i64>,
    ) -> ClassifyContext<'a> {
        ClassifyContext {
            policy,
            whitelist,
            owner: OWNER,
            engine_user: ENGINE,
            engine_top_role: 50,
            actor_top_role,
        }
    }

    #[test]
    fn test_disarmed_module_passes() {
        let policy = GuildPolicy::new(GUILD);
        let whitelist = HashSet::new();
        let limiter = RateLimiter::new();
        let verdict = classify(
            GUILD,
            &action(ActionClass::RoleUpdate, Some(ACTOR)),
            &ctx(&policy, &whitelist, Some(1)),
            &limiter,
        );
        assert_eq!(verdict, Verdict::Pass(PassReason::Disarmed));
    }

    #[test]
    fn test_threshold_zero_first_occurrence_violates() {
        let policy = GuildPolicy::armed_default(GUILD);
        let whitelist = HashSet::new();
        let limiter = RateLimiter::new();
        let verdict = classify(
            GUILD,
            &action(ActionClass::RoleUpdate, Some(ACTOR)),
            &ctx(&policy, &whitelist, Some(1)),
            &limiter,
        );
        assert_eq!(verdict, Verdict::Violation);
    }

    #[test]
    fn test_threshold_tolerates_up_to_n() {
        let mut policy = GuildPolicy::armed_default(GUILD);
        policy.set_module(ActionClass::ChannelUpdate, true, Some(2));
        let whitelist = HashSet::new();
        let limiter = RateLimiter::new();
        let context = ctx(&policy, &whitelist, Some(1));
        let act = action(ActionClass::ChannelUpdate, Some(ACTOR));

        assert_eq!(
            classify(GUILD, &act, &context, &limiter),
            Verdict::Pass(PassReason::UnderThreshold)
        );
        assert_eq!(
            classify(GUILD, &act, &context, &limiter),
            Verdict::Pass(PassReason::UnderThreshold)
        );
        assert_eq!(classify(GUILD, &act, &context, &limiter), Verdict::Violation);
    }

    #[test]
    fn test_whitelist_is_immune_at_any_rate() {
        let policy = GuildPolicy::armed_default(GUILD);
        let whitelist: HashSet<ActorId> = [ACTOR].into_iter().collect();
        let limiter = RateLimiter::new();
        let context = ctx(&policy, &whitelist, Some(1));
        let act = action(ActionClass::ChannelUpdate, Some(ACTOR));
        for _ in 0..10 {
            assert_eq!(
                classify(GUILD, &act, &context, &limiter),
                Verdict::Pass(PassReason::Whitelisted)
            );
        }
        // Immunity short-circuits before the rate bucket records.
        assert_eq!(
            limiter.count(RateScope::Action {
                guild: GUILD,
                actor: ACTOR,
                class: ActionClass::ChannelUpdate,
            }),
            0
        );
    }

    #[test]
    fn test_owner_engine_and_hierarchy_are_immune() {
        let policy = GuildPolicy::armed_default(GUILD);
        let whitelist = HashSet::new();
        let limiter = RateLimiter::new();

        let verdict = classify(
            GUILD,
            &action(ActionClass::RoleUpdate, Some(OWNER)),
            &ctx(&policy, &whitelist, Some(1)),
            &limiter,
        );
        assert_eq!(verdict, Verdict::Pass(PassReason::Owner));

        let verdict = classify(
            GUILD,
            &action(ActionClass::RoleUpdate, Some(ENGINE)),
            &ctx(&policy, &whitelist, Some(1)),
            &limiter,
        );
        assert_eq!(verdict, Verdict::Pass(PassReason::EngineSelf));

        // Equal rank is already out of reach.
        let verdict = classify(
            GUILD,
            &action(ActionClass::RoleUpdate, Some(ACTOR)),
            &ctx(&policy, &whitelist, Some(50)),
            &limiter,
        );
        assert_eq!(verdict, Verdict::Pass(PassReason::Hierarchy));
    }

    #[test]
    fn test_departed_actor_is_still_classified() {
        let policy = GuildPolicy::armed_default(GUILD);
        let whitelist = HashSet::new();
        let limiter = RateLimiter::new();
        let verdict = classify(
            GUILD,
            &action(ActionClass::Ban, Some(ACTOR)),
            &ctx(&policy, &whitelist, None),
            &limiter,
        );
        assert_eq!(verdict, Verdict::Violation);
    }
}
