//! Candidate plan input, as produced by an external planner.
//!
//! A [`RawPlan`] is untrusted: every field is checked by the validator in
//! `stratagem-core` before anything is scheduled. Parsing is strict: an
//! unrecognized key anywhere in a plan is an error rather than silently
//! dropped. The builder methods here exist for scripted producers and tests.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A candidate plan awaiting validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawPlan {
    /// Who or what produced the plan (e.g. `"interpreter"`, `"script"`).
    #[serde(default = "default_source")]
    pub source: String,
    /// When the producer created the plan.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Steps in execution order.
    #[serde(default)]
    pub steps: Vec<RawStep>,
}

impl RawPlan {
    /// Start an empty plan from the given source.
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_owned(),
            created_at: Utc::now(),
            steps: Vec::new(),
        }
    }

    /// Append a step.
    #[must_use]
    pub fn step(mut self, step: RawStep) -> Self {
        self.steps.push(step);
        self
    }
}

/// One candidate step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawStep {
    /// Action name, resolved against the action registry.
    pub action: String,
    /// Untyped parameters, checked against the action's schema.
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
    /// How long the step lasts, in milliseconds.
    #[serde(default, alias = "duration")]
    pub duration_ms: Option<u64>,
    /// Condition that ends the step early.
    #[serde(default)]
    pub trigger: Option<RawTrigger>,
    /// Status line shown when the step ends.
    #[serde(default)]
    pub speech: Option<String>,
    /// Relative urgency forwarded to the dispatch collaborator.
    #[serde(default)]
    pub priority: i64,
    /// Cooldown applied to the action once the step ends, in milliseconds.
    #[serde(default, alias = "cooldown")]
    pub cooldown_ms: Option<u64>,
}

impl RawStep {
    /// Start a step for the named action.
    pub fn new(action: &str) -> Self {
        Self {
            action: action.to_owned(),
            params: BTreeMap::new(),
            duration_ms: None,
            trigger: None,
            speech: None,
            priority: 0,
            cooldown_ms: None,
        }
    }

    /// Set a parameter.
    #[must_use]
    pub fn param(mut self, name: &str, value: serde_json::Value) -> Self {
        self.params.insert(name.to_owned(), value);
        self
    }

    /// Set the duration.
    #[must_use]
    pub const fn duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    /// Set a text trigger.
    #[must_use]
    pub fn trigger(mut self, expr: &str) -> Self {
        self.trigger = Some(RawTrigger::Text(expr.to_owned()));
        self
    }

    /// Set a structured trigger.
    #[must_use]
    pub fn trigger_tree(mut self, tree: RawTrigger) -> Self {
        self.trigger = Some(tree);
        self
    }

    /// Set the speech line.
    #[must_use]
    pub fn speech(mut self, text: &str) -> Self {
        self.speech = Some(text.to_owned());
        self
    }

    /// Set the priority.
    #[must_use]
    pub const fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Set the cooldown.
    #[must_use]
    pub const fn cooldown_ms(mut self, ms: u64) -> Self {
        self.cooldown_ms = Some(ms);
        self
    }
}

/// A trigger as written by the planner.
///
/// Either a text expression (`"enemy_dist < 10"`, optionally joined by a
/// single kind of connector) or an explicit `{"and": [...]}` /
/// `{"or": [...]}` tree. A tree node carries exactly one connector key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, from = "TriggerRepr")]
pub enum RawTrigger {
    /// Text expression.
    Text(String),
    /// Conjunction of sub-triggers.
    All {
        /// Children that must all hold.
        and: Vec<RawTrigger>,
    },
    /// Disjunction of sub-triggers.
    Any {
        /// Children of which one must hold.
        or: Vec<RawTrigger>,
    },
}

/// Wire form of [`RawTrigger`], rejecting tree nodes with extra keys.
#[derive(Deserialize)]
#[serde(untagged)]
enum TriggerRepr {
    Text(String),
    All(AllOf),
    Any(AnyOf),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AllOf {
    and: Vec<RawTrigger>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AnyOf {
    or: Vec<RawTrigger>,
}

impl From<TriggerRepr> for RawTrigger {
    fn from(repr: TriggerRepr) -> Self {
        match repr {
            TriggerRepr::Text(text) => Self::Text(text),
            TriggerRepr::All(AllOf { and }) => Self::All { and },
            TriggerRepr::Any(AnyOf { or }) => Self::Any { or },
        }
    }
}

fn default_source() -> String {
    "unknown".to_owned()
}
