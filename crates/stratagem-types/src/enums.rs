//! Enumeration types shared by the validator, the executor and observers.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Tolerance used for `==` comparisons between fact values and thresholds.
pub const FACT_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// The closed set of actions a plan step may request.
///
/// Only actions registered in the `ActionRegistry` are admitted; an action
/// name that does not map to a variant here is rejected at validation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ActionKind {
    /// Walk to a map position.
    MoveTo,
    /// Fall back away from the nearest enemy.
    Retreat,
    /// Engage a target entity.
    Attack,
    /// Stay in place and hold ground.
    HoldPosition,
    /// Follow another entity.
    Follow,
    /// Patrol towards a map position and back.
    Patrol,
    /// Trigger a named ability, optionally at a target.
    UseAbility,
    /// Move into the nearest cover.
    TakeCover,
    /// Move back to the nearest friendly group.
    Regroup,
    /// Speech only; carries no physical effect.
    Speak,
}

impl ActionKind {
    /// Every action variant, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::MoveTo,
        Self::Retreat,
        Self::Attack,
        Self::HoldPosition,
        Self::Follow,
        Self::Patrol,
        Self::UseAbility,
        Self::TakeCover,
        Self::Regroup,
        Self::Speak,
    ];

    /// The canonical snake-case name used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MoveTo => "move_to",
            Self::Retreat => "retreat",
            Self::Attack => "attack",
            Self::HoldPosition => "hold_position",
            Self::Follow => "follow",
            Self::Patrol => "patrol",
            Self::UseAbility => "use_ability",
            Self::TakeCover => "take_cover",
            Self::Regroup => "regroup",
            Self::Speak => "speak",
        }
    }

    /// Resolve an action name as produced by an external planner.
    ///
    /// Matching is case-insensitive and tolerates `-`, spaces or a missing
    /// separator (`moveTo`, `move-to` and `move to` all resolve to
    /// [`ActionKind::MoveTo`]).
    pub fn from_name(name: &str) -> Option<Self> {
        let squashed = squash(name);
        if squashed.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|kind| squash(kind.as_str()) == squashed)
    }
}

impl core::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase a name and drop separators so spelling variants compare equal.
fn squash(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// ---------------------------------------------------------------------------
// Trigger vocabulary
// ---------------------------------------------------------------------------

/// A named fact a trigger expression can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fact {
    /// Own health as a percentage (0--100).
    HealthPct,
    /// Distance to the nearest enemy, in map units.
    EnemyDist,
    /// Distance to the nearest ally, in map units.
    AllyDist,
    /// Number of enemies in sensing range.
    EnemyCount,
    /// Number of allies in sensing range.
    AllyCount,
    /// Seconds elapsed since the current step started.
    Time,
    /// Own energy level.
    Energy,
    /// Own ammunition level.
    Ammo,
}

impl Fact {
    /// Every fact variant, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::HealthPct,
        Self::EnemyDist,
        Self::AllyDist,
        Self::EnemyCount,
        Self::AllyCount,
        Self::Time,
        Self::Energy,
        Self::Ammo,
    ];

    /// The name used in trigger expressions.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HealthPct => "health_pct",
            Self::EnemyDist => "enemy_dist",
            Self::AllyDist => "ally_dist",
            Self::EnemyCount => "enemy_count",
            Self::AllyCount => "ally_count",
            Self::Time => "time",
            Self::Energy => "energy",
            Self::Ammo => "ammo",
        }
    }

    /// Resolve a fact name exactly as written in a trigger (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|fact| fact.as_str() == lowered)
    }
}

impl core::fmt::Display for Fact {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A comparison operator in a trigger leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `==`
    Eq,
}

impl Comparator {
    /// The operator as written in a trigger string.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Eq => "==",
        }
    }

    /// Apply the comparison `lhs <op> rhs`.
    ///
    /// Any comparison involving NaN is false. Equality uses
    /// [`FACT_EPSILON`] as tolerance.
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Lt => lhs < rhs,
            Self::Gt => lhs > rhs,
            Self::Le => lhs <= rhs,
            Self::Ge => lhs >= rhs,
            Self::Eq => (lhs - rhs).abs() <= FACT_EPSILON,
        }
    }
}

impl core::fmt::Display for Comparator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.symbol())
    }
}

// ---------------------------------------------------------------------------
// Execution lifecycle
// ---------------------------------------------------------------------------

/// Outcome of the most recent step an entity processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum StepOutcome {
    /// The step's action was dispatched and the step has not ended yet.
    Running,
    /// The step ended normally.
    Completed,
    /// The step's action failed; the plan moved on.
    Failed,
    /// The step was not dispatched (cooldown); the plan moved on.
    Skipped,
}

/// Phase of an entity's plan state machine.
///
/// `PlanCompleted` and `PlanInterrupted` are terminal for a plan instance.
/// They stay observable until the entity's next tick, when the state returns
/// to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ExecutionPhase {
    /// No active plan.
    Idle,
    /// The current step has not been dispatched yet.
    StepPending,
    /// The current step's action is in flight.
    StepRunning,
    /// Every step of the plan has ended.
    PlanCompleted,
    /// The plan was discarded before its last step ended.
    PlanInterrupted,
}

impl ExecutionPhase {
    /// Whether this phase ends a plan instance.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::PlanCompleted | Self::PlanInterrupted)
    }
}

/// Why an active plan was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum InterruptCause {
    /// A newer plan was admitted for the same entity.
    Superseded,
    /// An out-of-band command (emergency override, forced retreat).
    Command,
    /// The entity died or was removed from the simulation.
    EntityDestroyed,
}

/// Why a step was skipped without dispatching its action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum SkipReason {
    /// The action is still cooling down for this entity.
    Cooldown {
        /// First tick at which the action may be dispatched again.
        ready_at_tick: u64,
    },
}

/// Why a step failed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum FailReason {
    /// The dispatch collaborator refused the invocation.
    DispatchRejected {
        /// Collaborator-provided description.
        message: String,
    },
    /// The collaborator reported that a blocking action did not succeed.
    ActionFailed,
    /// An open-ended step exceeded the configured safety timeout.
    TimedOut {
        /// Ticks the step had been running.
        after_ticks: u64,
    },
}

/// Which completion condition ended a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum CompletionCause {
    /// The step's trigger evaluated true.
    TriggerSatisfied,
    /// The step's duration elapsed.
    DurationElapsed,
    /// The dispatch collaborator reported success for a blocking action.
    ActionFinished,
    /// The step had no completion condition and ended the tick it started.
    Instantaneous,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_roundtrip() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::from_name(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn action_name_spelling_variants() {
        assert_eq!(ActionKind::from_name("MoveTo"), Some(ActionKind::MoveTo));
        assert_eq!(ActionKind::from_name("move-to"), Some(ActionKind::MoveTo));
        assert_eq!(ActionKind::from_name(" hold position "), Some(ActionKind::HoldPosition));
        assert_eq!(ActionKind::from_name("teleport"), None);
        assert_eq!(ActionKind::from_name(""), None);
    }

    #[test]
    fn action_serde_uses_snake_case() {
        let json = serde_json::to_string(&ActionKind::UseAbility).ok();
        assert_eq!(json.as_deref(), Some("\"use_ability\""));
    }

    #[test]
    fn fact_names_are_exact() {
        assert_eq!(Fact::from_name("enemy_dist"), Some(Fact::EnemyDist));
        assert_eq!(Fact::from_name("HEALTH_PCT"), Some(Fact::HealthPct));
        assert_eq!(Fact::from_name("enemydist"), None);
    }

    #[test]
    fn comparators() {
        assert!(Comparator::Lt.apply(1.0, 2.0));
        assert!(!Comparator::Lt.apply(2.0, 2.0));
        assert!(Comparator::Le.apply(2.0, 2.0));
        assert!(Comparator::Gt.apply(3.0, 2.0));
        assert!(Comparator::Ge.apply(2.0, 2.0));
        assert!(Comparator::Eq.apply(0.1 + 0.2, 0.3));
        assert!(!Comparator::Eq.apply(1.0, 1.5));
    }

    #[test]
    fn nan_never_compares_true() {
        for op in [Comparator::Lt, Comparator::Gt, Comparator::Le, Comparator::Ge, Comparator::Eq] {
            assert!(!op.apply(f64::NAN, 1.0));
        }
    }
}
