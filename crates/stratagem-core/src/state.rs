//! Per-entity execution state.
//!
//! One [`ExecutionState`] exists per entity that has an active plan, a
//! plan that ended this tick, or an unexpired cooldown. The executor owns
//! every state exclusively; outside code gets read-only access.

use std::collections::BTreeMap;
use std::sync::Arc;

use stratagem_types::{ActionKind, EntityId, ExecutionPhase, InterruptCause, PlanId, StepOutcome};

use crate::dispatch::InvocationHandle;
use crate::plan::{Plan, PlanStep};

/// An invariant of an [`ExecutionState`] does not hold.
///
/// Fatal for the entity's plan only: the executor drops the plan, forces
/// the entity to idle and reports the detail as an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("execution state corrupted: {detail}")]
pub struct StateCorruption {
    /// Which invariant failed.
    pub detail: String,
}

impl StateCorruption {
    pub(crate) fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Execution record of one entity.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    entity_id: EntityId,
    plan_id: Option<PlanId>,
    active_plan: Option<Arc<Plan>>,
    phase: ExecutionPhase,
    step_index: usize,
    step_started_at: u64,
    /// Tick at which each action becomes available again.
    cooldowns: BTreeMap<ActionKind, u64>,
    interrupted: Option<InterruptCause>,
    last_outcome: Option<StepOutcome>,
    in_flight: Option<InvocationHandle>,
    trigger_fault_logged: bool,
}

impl ExecutionState {
    pub(crate) const fn new(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            plan_id: None,
            active_plan: None,
            phase: ExecutionPhase::Idle,
            step_index: 0,
            step_started_at: 0,
            cooldowns: BTreeMap::new(),
            interrupted: None,
            last_outcome: None,
            in_flight: None,
            trigger_fault_logged: false,
        }
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    /// The entity.
    pub const fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    /// Id of the active plan, or of the plan that ended this tick.
    pub const fn plan_id(&self) -> Option<PlanId> {
        self.plan_id
    }

    /// The plan being executed.
    pub fn active_plan(&self) -> Option<&Plan> {
        self.active_plan.as_deref()
    }

    /// Current lifecycle phase.
    pub const fn phase(&self) -> ExecutionPhase {
        self.phase
    }

    /// Index of the current step.
    pub const fn step_index(&self) -> usize {
        self.step_index
    }

    /// Tick at which the current step was dispatched.
    pub const fn step_started_at(&self) -> u64 {
        self.step_started_at
    }

    /// Tick at which each action on cooldown becomes available.
    pub const fn cooldowns(&self) -> &BTreeMap<ActionKind, u64> {
        &self.cooldowns
    }

    /// Whether an interrupt is waiting to be consumed.
    pub const fn is_interrupted(&self) -> bool {
        self.interrupted.is_some()
    }

    /// Outcome of the most recently finished step.
    pub const fn last_outcome(&self) -> Option<StepOutcome> {
        self.last_outcome
    }

    /// Outcome of the current step, `Running` while it is dispatched.
    pub const fn current_outcome(&self) -> Option<StepOutcome> {
        match self.phase {
            ExecutionPhase::StepRunning => Some(StepOutcome::Running),
            _ => self.last_outcome,
        }
    }

    /// If `action` is cooling down at `tick`, the tick it becomes ready.
    pub fn cooldown_until(&self, action: ActionKind, tick: u64) -> Option<u64> {
        self.cooldowns
            .get(&action)
            .copied()
            .filter(|ready_at| *ready_at > tick)
    }

    // -----------------------------------------------------------------------
    // Executor-only mutation
    // -----------------------------------------------------------------------

    pub(crate) fn plan_arc(&self) -> Option<Arc<Plan>> {
        self.active_plan.clone()
    }

    pub(crate) const fn in_flight(&self) -> Option<&InvocationHandle> {
        self.in_flight.as_ref()
    }

    pub(crate) const fn trigger_fault_logged(&self) -> bool {
        self.trigger_fault_logged
    }

    pub(crate) const fn mark_trigger_fault_logged(&mut self) {
        self.trigger_fault_logged = true;
    }

    pub(crate) const fn request_interrupt(&mut self, cause: InterruptCause) {
        self.interrupted = Some(cause);
    }

    pub(crate) const fn take_interrupt(&mut self) -> Option<InterruptCause> {
        self.interrupted.take()
    }

    /// Install a plan, replacing whatever was there.
    pub(crate) fn admit(&mut self, plan_id: PlanId, plan: Plan) {
        self.plan_id = Some(plan_id);
        self.active_plan = Some(Arc::new(plan));
        self.phase = ExecutionPhase::StepPending;
        self.step_index = 0;
        self.step_started_at = 0;
        self.last_outcome = None;
        self.in_flight = None;
        self.trigger_fault_logged = false;
    }

    pub(crate) fn begin_step(&mut self, tick: u64, handle: InvocationHandle) {
        self.phase = ExecutionPhase::StepRunning;
        self.step_started_at = tick;
        self.in_flight = Some(handle);
        self.trigger_fault_logged = false;
    }

    /// Record the current step's outcome and move to the next step.
    pub(crate) fn advance(&mut self, outcome: StepOutcome) {
        self.last_outcome = Some(outcome);
        self.step_index = self.step_index.saturating_add(1);
        self.phase = ExecutionPhase::StepPending;
        self.in_flight = None;
        self.trigger_fault_logged = false;
    }

    /// End the plan in a terminal phase. The plan id stays visible until
    /// the state is reset.
    pub(crate) fn finish(&mut self, phase: ExecutionPhase) {
        self.active_plan = None;
        self.phase = phase;
        self.in_flight = None;
    }

    /// Return to idle, keeping cooldowns.
    pub(crate) fn reset_idle(&mut self) {
        self.plan_id = None;
        self.active_plan = None;
        self.phase = ExecutionPhase::Idle;
        self.step_index = 0;
        self.step_started_at = 0;
        self.in_flight = None;
        self.trigger_fault_logged = false;
    }

    pub(crate) fn set_cooldown(&mut self, action: ActionKind, ready_at: u64) {
        let entry = self.cooldowns.entry(action).or_insert(ready_at);
        *entry = (*entry).max(ready_at);
    }

    pub(crate) fn prune_cooldowns(&mut self, tick: u64) {
        self.cooldowns.retain(|_, ready_at| *ready_at > tick);
    }

    /// Whether the executor must keep this state after `tick`.
    pub(crate) fn should_retain(&self, tick: u64) -> bool {
        self.phase != ExecutionPhase::Idle
            || self.interrupted.is_some()
            || self.cooldowns.values().any(|ready_at| *ready_at > tick)
    }

    /// The current step of the active plan.
    pub(crate) fn current_step<'p>(&self, plan: &'p Plan) -> Result<&'p PlanStep, StateCorruption> {
        plan.step(self.step_index).ok_or_else(|| {
            StateCorruption::new(format!(
                "step index {} out of range for plan of {} steps",
                self.step_index,
                plan.len()
            ))
        })
    }

    /// Check the structural invariants of a state with an active plan.
    pub(crate) fn check_invariants(&self) -> Result<(), StateCorruption> {
        match (self.phase, &self.active_plan) {
            (ExecutionPhase::StepPending | ExecutionPhase::StepRunning, None) => {
                return Err(StateCorruption::new(format!(
                    "phase {:?} without an active plan",
                    self.phase
                )));
            }
            (ExecutionPhase::Idle | ExecutionPhase::PlanCompleted | ExecutionPhase::PlanInterrupted, Some(_)) => {
                return Err(StateCorruption::new(format!(
                    "active plan retained in phase {:?}",
                    self.phase
                )));
            }
            _ => {}
        }

        let Some(plan) = &self.active_plan else {
            return Ok(());
        };
        if self.plan_id.is_none() {
            return Err(StateCorruption::new("active plan without a plan id"));
        }
        if self.step_index > plan.len() {
            return Err(StateCorruption::new(format!(
                "step index {} past end of plan of {} steps",
                self.step_index,
                plan.len()
            )));
        }
        if self.phase == ExecutionPhase::StepRunning {
            if self.step_index >= plan.len() {
                return Err(StateCorruption::new("running step past end of plan"));
            }
            if self.in_flight.is_none() {
                return Err(StateCorruption::new("running step without an invocation"));
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) const fn corrupt_step_index(&mut self, index: usize) {
        self.step_index = index;
    }
}
