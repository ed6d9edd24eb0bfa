//! Validated plans.
//!
//! A [`Plan`] can only be built by the validator, so holding one proves
//! every step passed the safety envelope: known action, schema-checked
//! parameters, parsed trigger, bounded durations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use stratagem_types::{ActionKind, BoolExpr, ParamValue};

/// One admitted step.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    /// The registered action to dispatch.
    pub action: ActionKind,
    /// Typed parameters.
    pub params: BTreeMap<String, ParamValue>,
    /// Duration in milliseconds, if the step is time-bounded.
    pub duration_ms: Option<u64>,
    /// Parsed completion trigger.
    pub trigger: Option<BoolExpr>,
    /// Status line, already truncated to the word limit.
    pub speech: Option<String>,
    /// Priority forwarded with the invocation.
    pub priority: i32,
    /// Cooldown applied once the step ends (step value or action default).
    pub cooldown_ms: u64,
}

impl PlanStep {
    /// Whether the step has neither a duration nor a trigger.
    pub const fn is_instantaneous(&self) -> bool {
        self.duration_ms.is_none() && self.trigger.is_none()
    }
}

/// An admitted, immutable plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    source: String,
    created_at: DateTime<Utc>,
    steps: Vec<PlanStep>,
}

impl Plan {
    pub(crate) const fn new(source: String, created_at: DateTime<Utc>, steps: Vec<PlanStep>) -> Self {
        Self {
            source,
            created_at,
            steps,
        }
    }

    /// Who or what produced the plan.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// When the producer created the plan.
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Step at `index`, if in range.
    pub fn step(&self, index: usize) -> Option<&PlanStep> {
        self.steps.get(index)
    }

    /// Number of steps (never zero for a validated plan).
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the plan has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of all step durations in milliseconds.
    pub fn total_duration_ms(&self) -> u64 {
        self.steps
            .iter()
            .filter_map(|s| s.duration_ms)
            .fold(0_u64, u64::saturating_add)
    }
}
