//! Values the executor emits: action invocations, status lines and
//! lifecycle events.
//!
//! These are the only outputs of the engine. Observers (UI, speech,
//! telemetry) consume them without knowing how the executor works.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ActionKind, CompletionCause, FailReason, InterruptCause, SkipReason};
use crate::ids::{EntityId, PlanId};
use crate::params::ParamValue;

/// A request to the dispatch collaborator to start an action.
///
/// The executor hands the value over by move and keeps no copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ActionInvocation {
    /// The acting entity.
    pub entity_id: EntityId,
    /// The plan the step belongs to.
    pub plan_id: PlanId,
    /// Index of the step within the plan.
    pub step_index: usize,
    /// The action to start.
    pub action: ActionKind,
    /// Schema-checked parameters.
    pub params: BTreeMap<String, ParamValue>,
    /// Step priority, for arbitration inside the collaborator.
    pub priority: i32,
    /// Tick at which the invocation was issued.
    pub issued_at_tick: u64,
}

/// A short line for speech bubbles or the unit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StatusMessage {
    /// The speaking entity.
    pub entity_id: EntityId,
    /// The plan that produced the line.
    pub plan_id: PlanId,
    /// The text, already limited to the configured word count.
    pub text: String,
    /// Tick at which the line was emitted.
    pub tick: u64,
}

/// A lifecycle event emitted by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ExecutorEvent {
    /// A plan became the entity's active plan.
    PlanAdmitted {
        /// The entity.
        entity_id: EntityId,
        /// The admitted plan.
        plan_id: PlanId,
        /// Number of steps in the plan.
        step_count: usize,
        /// Tick of admission.
        tick: u64,
    },
    /// A plan was discarded before it finished.
    PlanInterrupted {
        /// The entity.
        entity_id: EntityId,
        /// The discarded plan.
        plan_id: PlanId,
        /// Why it was discarded.
        cause: InterruptCause,
        /// Index of the step that was current when the plan was discarded.
        step_index: usize,
        /// Tick of interruption.
        tick: u64,
    },
    /// Every step of a plan ended.
    PlanCompleted {
        /// The entity.
        entity_id: EntityId,
        /// The finished plan.
        plan_id: PlanId,
        /// Tick of completion.
        tick: u64,
    },
    /// A step's action was dispatched.
    StepStarted {
        /// The entity.
        entity_id: EntityId,
        /// The plan.
        plan_id: PlanId,
        /// Index of the step.
        step_index: usize,
        /// The dispatched action.
        action: ActionKind,
        /// Tick of dispatch.
        tick: u64,
    },
    /// A step ended normally.
    StepCompleted {
        /// The entity.
        entity_id: EntityId,
        /// The plan.
        plan_id: PlanId,
        /// Index of the step.
        step_index: usize,
        /// The step's action.
        action: ActionKind,
        /// Which condition ended the step.
        cause: CompletionCause,
        /// Tick of completion.
        tick: u64,
    },
    /// A step was not dispatched.
    StepSkipped {
        /// The entity.
        entity_id: EntityId,
        /// The plan.
        plan_id: PlanId,
        /// Index of the step.
        step_index: usize,
        /// The step's action.
        action: ActionKind,
        /// Why it was skipped.
        reason: SkipReason,
        /// Tick of the skip.
        tick: u64,
    },
    /// A step's action failed.
    StepFailed {
        /// The entity.
        entity_id: EntityId,
        /// The plan.
        plan_id: PlanId,
        /// Index of the step.
        step_index: usize,
        /// The step's action.
        action: ActionKind,
        /// Why it failed.
        reason: FailReason,
        /// Tick of the failure.
        tick: u64,
    },
    /// A step's speech line.
    StatusMessage(StatusMessage),
    /// An invariant violation forced the entity back to idle.
    StateCorrupted {
        /// The entity.
        entity_id: EntityId,
        /// The plan that was dropped, if one was active.
        plan_id: Option<PlanId>,
        /// Description of the violated invariant.
        detail: String,
        /// Tick of detection.
        tick: u64,
    },
}

impl ExecutorEvent {
    /// The entity the event concerns.
    pub const fn entity_id(&self) -> EntityId {
        match self {
            Self::PlanAdmitted { entity_id, .. }
            | Self::PlanInterrupted { entity_id, .. }
            | Self::PlanCompleted { entity_id, .. }
            | Self::StepStarted { entity_id, .. }
            | Self::StepCompleted { entity_id, .. }
            | Self::StepSkipped { entity_id, .. }
            | Self::StepFailed { entity_id, .. }
            | Self::StateCorrupted { entity_id, .. }
            | Self::StatusMessage(StatusMessage { entity_id, .. }) => *entity_id,
        }
    }

    /// The tick the event was emitted at.
    pub const fn tick(&self) -> u64 {
        match self {
            Self::PlanAdmitted { tick, .. }
            | Self::PlanInterrupted { tick, .. }
            | Self::PlanCompleted { tick, .. }
            | Self::StepStarted { tick, .. }
            | Self::StepCompleted { tick, .. }
            | Self::StepSkipped { tick, .. }
            | Self::StepFailed { tick, .. }
            | Self::StateCorrupted { tick, .. }
            | Self::StatusMessage(StatusMessage { tick, .. }) => *tick,
        }
    }

    /// Stable event name for logs and metrics labels.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PlanAdmitted { .. } => "plan_admitted",
            Self::PlanInterrupted { .. } => "plan_interrupted",
            Self::PlanCompleted { .. } => "plan_completed",
            Self::StepStarted { .. } => "step_started",
            Self::StepCompleted { .. } => "step_completed",
            Self::StepSkipped { .. } => "step_skipped",
            Self::StepFailed { .. } => "step_failed",
            Self::StatusMessage(_) => "status_message",
            Self::StateCorrupted { .. } => "state_corrupted",
        }
    }
}
