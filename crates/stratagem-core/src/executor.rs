//! The plan executor: one step-sequencing state machine per entity,
//! advanced once per simulation tick.
//!
//! # Tick Order
//!
//! 1. Drain queued submissions, interrupts and removals.
//! 2. Take one [`WorldSnapshot`] from the fact provider.
//! 3. Process every known entity in ascending id order:
//!    destruction, pending interrupt, plan admission, then the step machine.
//! 4. Advance the clock.
//!
//! # Step Machine
//!
//! ```text
//! Idle -> StepPending -> StepRunning -> (completed | failed | skipped)
//!              ^                                   |
//!              +-----------------------------------+
//!         -> PlanCompleted | PlanInterrupted -> Idle (next tick)
//! ```
//!
//! Each entity starts at most one action per tick. Skipped and failed
//! steps advance immediately; a completed step lets the next step start in
//! the same tick unless a start already happened.
//!
//! Nothing in a tick blocks. Plans arrive through an [`ExecutorHandle`]
//! that validates synchronously and queues the result for the next tick,
//! so producers on other tasks never touch execution state.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use stratagem_types::{
    ActionInvocation, BoolExpr, CompletionCause, EntityId, ExecutionPhase, ExecutorEvent, FailReason,
    InterruptCause, PlanId, RawPlan, SkipReason, StatusMessage, StepOutcome, WorldSnapshot,
};
use tracing::{debug, info, warn};

use crate::clock::{ClockError, SimClock};
use crate::config::EngineConfig;
use crate::dispatch::{ActionDispatcher, InvocationHandle, InvocationStatus};
use crate::plan::{Plan, PlanStep};
use crate::provider::WorldFactProvider;
use crate::state::{ExecutionState, StateCorruption};
use crate::stats::ExecutorStats;
use crate::trigger::{self, EvalContext, TriggerEvaluationError};
use crate::validation::{PlanValidator, ValidationError};

/// Errors that abort a whole tick.
///
/// Per-entity failures never surface here; they become events.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

/// Everything one tick produced.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// The tick that was processed.
    pub tick: u64,
    /// Events in emission order (ascending entity id, then causal order).
    pub events: Vec<ExecutorEvent>,
    /// Entities with an active plan after the tick.
    pub active_plans: usize,
    /// Actions dispatched during the tick.
    pub invocations: usize,
}

// ---------------------------------------------------------------------------
// Command intake
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Command {
    Submit {
        entity_id: EntityId,
        plan_id: PlanId,
        plan: Plan,
    },
    Interrupt {
        entity_id: EntityId,
        cause: InterruptCause,
    },
    Remove {
        entity_id: EntityId,
    },
}

#[derive(Debug, Default)]
struct Inbox {
    commands: Vec<Command>,
    submitted: u64,
    rejected: u64,
}

/// What arrived for one entity since the previous tick.
#[derive(Debug, Default)]
struct Intake {
    pending: Option<(PlanId, Plan)>,
    interrupt: Option<InterruptCause>,
    removed: bool,
}

/// Cloneable front door for plan producers and command handlers.
///
/// Safe to share across threads and tasks. Every method returns
/// immediately; effects apply at the start of the next tick.
#[derive(Debug, Clone)]
pub struct ExecutorHandle {
    validator: Arc<PlanValidator>,
    inbox: Arc<Mutex<Inbox>>,
    next_plan_id: Arc<AtomicU64>,
}

impl ExecutorHandle {
    fn with_inbox<R>(&self, f: impl FnOnce(&mut Inbox) -> R) -> R {
        let mut inbox = self.inbox.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut inbox)
    }

    /// Validate a candidate plan and queue it for `entity_id`.
    ///
    /// A newer submission for the same entity before the next tick
    /// replaces the queued one.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] if the plan is rejected; nothing is
    /// queued in that case.
    pub fn submit_plan(&self, entity_id: EntityId, candidate: &RawPlan) -> Result<PlanId, ValidationError> {
        match self.validator.validate(candidate) {
            Ok(plan) => {
                let plan_id = PlanId::new(self.next_plan_id.fetch_add(1, Ordering::Relaxed));
                debug!(%entity_id, %plan_id, steps = plan.len(), "Plan queued");
                self.with_inbox(|inbox| {
                    inbox.submitted = inbox.submitted.saturating_add(1);
                    inbox.commands.push(Command::Submit {
                        entity_id,
                        plan_id,
                        plan,
                    });
                });
                Ok(plan_id)
            }
            Err(err) => {
                info!(%entity_id, source = %candidate.source, %err, "Plan rejected");
                self.with_inbox(|inbox| {
                    inbox.submitted = inbox.submitted.saturating_add(1);
                    inbox.rejected = inbox.rejected.saturating_add(1);
                });
                Err(err)
            }
        }
    }

    /// Interrupt the entity's active plan at its next tick.
    ///
    /// Also discards a plan queued for the entity before this call.
    pub fn interrupt(&self, entity_id: EntityId, cause: InterruptCause) {
        self.with_inbox(|inbox| inbox.commands.push(Command::Interrupt { entity_id, cause }));
    }

    /// Forget the entity at its next tick, interrupting any active plan
    /// with [`InterruptCause::EntityDestroyed`].
    pub fn remove_entity(&self, entity_id: EntityId) {
        self.with_inbox(|inbox| inbox.commands.push(Command::Remove { entity_id }));
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Owns every entity's [`ExecutionState`] and advances them each tick.
#[derive(Debug)]
pub struct PlanExecutor {
    validator: Arc<PlanValidator>,
    clock: SimClock,
    states: BTreeMap<EntityId, ExecutionState>,
    stats: ExecutorStats,
    handle: ExecutorHandle,
}

impl PlanExecutor {
    /// Create an executor with no entities.
    pub fn new(validator: PlanValidator, clock: SimClock) -> Self {
        let validator = Arc::new(validator);
        let handle = ExecutorHandle {
            validator: Arc::clone(&validator),
            inbox: Arc::new(Mutex::new(Inbox::default())),
            next_plan_id: Arc::new(AtomicU64::new(1)),
        };
        Self {
            validator,
            clock,
            states: BTreeMap::new(),
            stats: ExecutorStats::default(),
            handle,
        }
    }

    /// Create an executor from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTickRate`] if the tick rate is invalid.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ClockError> {
        let clock = SimClock::new(&config.simulation)?;
        Ok(Self::new(PlanValidator::from_config(config), clock))
    }

    /// A handle for submitting plans and commands.
    pub fn handle(&self) -> ExecutorHandle {
        self.handle.clone()
    }

    /// Shorthand for [`ExecutorHandle::submit_plan`].
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] if the plan is rejected.
    pub fn submit_plan(&self, entity_id: EntityId, candidate: &RawPlan) -> Result<PlanId, ValidationError> {
        self.handle.submit_plan(entity_id, candidate)
    }

    /// Flag the entity's active plan for interruption at its next tick.
    ///
    /// Returns `false` if the entity has no active plan.
    pub fn interrupt(&mut self, entity_id: EntityId, cause: InterruptCause) -> bool {
        match self.states.get_mut(&entity_id) {
            Some(state) if state.active_plan().is_some() => {
                state.request_interrupt(cause);
                true
            }
            _ => false,
        }
    }

    /// The simulation clock.
    pub const fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// The validator.
    pub fn validator(&self) -> &PlanValidator {
        &self.validator
    }

    /// An entity's execution state, if it has one.
    pub fn state(&self, entity_id: EntityId) -> Option<&ExecutionState> {
        self.states.get(&entity_id)
    }

    /// All execution states in ascending entity order.
    pub fn states(&self) -> impl Iterator<Item = &ExecutionState> {
        self.states.values()
    }

    /// Entities with an active plan.
    pub fn active_plan_count(&self) -> usize {
        self.states
            .values()
            .filter(|s| s.active_plan().is_some())
            .count()
    }

    /// Running totals, including submissions made through handles.
    pub fn stats(&self) -> ExecutorStats {
        let mut stats = self.stats.clone();
        self.handle.with_inbox(|inbox| {
            stats.plans_submitted = inbox.submitted;
            stats.plans_rejected = inbox.rejected;
        });
        stats
    }

    fn drain_inbox(&self) -> BTreeMap<EntityId, Intake> {
        let commands = self.handle.with_inbox(|inbox| std::mem::take(&mut inbox.commands));
        let mut intake: BTreeMap<EntityId, Intake> = BTreeMap::new();

        for command in commands {
            match command {
                Command::Submit {
                    entity_id,
                    plan_id,
                    plan,
                } => {
                    let entry = intake.entry(entity_id).or_default();
                    if let Some((replaced, _)) = entry.pending.replace((plan_id, plan)) {
                        debug!(%entity_id, %replaced, %plan_id, "Queued plan replaced before admission");
                    }
                }
                Command::Interrupt { entity_id, cause } => {
                    let entry = intake.entry(entity_id).or_default();
                    if let Some((dropped, _)) = entry.pending.take() {
                        debug!(%entity_id, plan_id = %dropped, "Queued plan dropped by interrupt");
                    }
                    entry.interrupt = Some(cause);
                }
                Command::Remove { entity_id } => {
                    let entry = intake.entry(entity_id).or_default();
                    entry.pending = None;
                    entry.removed = true;
                }
            }
        }
        intake
    }

    /// Run one tick.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Clock`] if the tick counter cannot advance.
    /// Entity-level failures are reported as events, never as errors.
    pub fn tick(
        &mut self,
        provider: &mut dyn WorldFactProvider,
        dispatcher: &mut dyn ActionDispatcher,
    ) -> Result<TickReport, TickError> {
        let tick = self.clock.tick();
        let mut intake = self.drain_inbox();
        let snapshot = provider.snapshot(tick);

        let entities: BTreeSet<EntityId> = self
            .states
            .keys()
            .chain(intake.keys())
            .copied()
            .collect();

        let mut pass = TickPass {
            tick,
            clock: &self.clock,
            validator: &self.validator,
            snapshot: &snapshot,
            dispatcher,
            events: Vec::new(),
            invocations: 0,
            cancellations: 0,
            trigger_faults: 0,
        };

        for entity_id in entities {
            let state = self
                .states
                .remove(&entity_id)
                .unwrap_or_else(|| ExecutionState::new(entity_id));
            let entity_intake = intake.remove(&entity_id).unwrap_or_default();
            if let Some(state) = pass.process_entity(state, entity_intake) {
                self.states.insert(entity_id, state);
            }
        }

        let TickPass {
            events,
            invocations,
            cancellations,
            trigger_faults,
            ..
        } = pass;

        for event in &events {
            self.stats.record(event);
        }
        self.stats.ticks = self.stats.ticks.saturating_add(1);
        self.stats.invocations_cancelled = self.stats.invocations_cancelled.saturating_add(cancellations);
        self.stats.trigger_faults = self.stats.trigger_faults.saturating_add(trigger_faults);

        let active_plans = self.active_plan_count();
        if !events.is_empty() {
            debug!(tick, events = events.len(), active_plans, invocations, "Tick processed");
        }

        self.clock.advance()?;

        Ok(TickReport {
            tick,
            events,
            active_plans,
            invocations,
        })
    }

    #[cfg(test)]
    fn state_mut(&mut self, entity_id: EntityId) -> Option<&mut ExecutionState> {
        self.states.get_mut(&entity_id)
    }
}

// ---------------------------------------------------------------------------
// Per-tick processing
// ---------------------------------------------------------------------------

/// Borrowed context and accumulated output of one tick.
struct TickPass<'a, 'd> {
    tick: u64,
    clock: &'a SimClock,
    validator: &'a PlanValidator,
    snapshot: &'a WorldSnapshot,
    dispatcher: &'a mut (dyn ActionDispatcher + 'd),
    events: Vec<ExecutorEvent>,
    invocations: usize,
    cancellations: u64,
    trigger_faults: u64,
}

/// How a running step resolved this tick.
enum StepResolution {
    Completed(CompletionCause),
    Failed(FailReason),
}

impl TickPass<'_, '_> {
    /// Process one entity. Returns the state if it should be kept.
    fn process_entity(&mut self, mut state: ExecutionState, intake: Intake) -> Option<ExecutionState> {
        let entity_id = state.entity_id();
        let alive = self.snapshot.view(entity_id).is_none_or(|view| view.alive);

        if intake.removed || !alive {
            if state.active_plan().is_some() {
                self.abandon(&mut state, InterruptCause::EntityDestroyed);
            }
            if let Some((plan_id, _)) = intake.pending {
                debug!(%entity_id, %plan_id, "Queued plan discarded, entity destroyed");
            }
            return None;
        }

        if state.phase().is_terminal() {
            state.reset_idle();
        }
        state.prune_cooldowns(self.tick);
        if let Some(cause) = intake.interrupt {
            state.request_interrupt(cause);
        }

        if let Err(corruption) = self.advance_entity(&mut state, intake.pending) {
            warn!(
                %entity_id,
                plan_id = ?state.plan_id(),
                tick = self.tick,
                detail = %corruption.detail,
                "Execution state corrupted, forcing idle"
            );
            self.events.push(ExecutorEvent::StateCorrupted {
                entity_id,
                plan_id: state.plan_id(),
                detail: corruption.detail,
                tick: self.tick,
            });
            state.reset_idle();
        }

        state.should_retain(self.tick).then_some(state)
    }

    fn advance_entity(
        &mut self,
        state: &mut ExecutionState,
        pending: Option<(PlanId, Plan)>,
    ) -> Result<(), StateCorruption> {
        let entity_id = state.entity_id();

        if let Some(cause) = state.take_interrupt() {
            if state.active_plan().is_some() {
                self.abandon(state, cause);
            } else {
                debug!(%entity_id, ?cause, "Interrupt for entity without a plan ignored");
            }
        }

        if let Some((plan_id, plan)) = pending {
            if state.active_plan().is_some() {
                self.abandon(state, InterruptCause::Superseded);
            }
            info!(
                %entity_id,
                %plan_id,
                steps = plan.len(),
                source = plan.source(),
                created_at = %plan.created_at(),
                tick = self.tick,
                "Plan admitted"
            );
            self.events.push(ExecutorEvent::PlanAdmitted {
                entity_id,
                plan_id,
                step_count: plan.len(),
                tick: self.tick,
            });
            state.admit(plan_id, plan);
        }

        state.check_invariants()?;
        if state.active_plan().is_none() {
            return Ok(());
        }
        self.run_steps(state)
    }

    /// Drive the step machine until it waits or the plan ends.
    fn run_steps(&mut self, state: &mut ExecutionState) -> Result<(), StateCorruption> {
        let plan = state
            .plan_arc()
            .ok_or_else(|| StateCorruption::new("step machine run without a plan"))?;
        let plan_id = state
            .plan_id()
            .ok_or_else(|| StateCorruption::new("active plan without a plan id"))?;
        let entity_id = state.entity_id();

        let mut started_this_tick = false;
        // Every step can pass through pending and running once per tick.
        let bound = plan.len().saturating_mul(2).saturating_add(2);

        for _ in 0..bound {
            match state.phase() {
                ExecutionPhase::StepPending => {
                    if state.step_index() == plan.len() {
                        info!(%entity_id, %plan_id, tick = self.tick, "Plan completed");
                        self.events.push(ExecutorEvent::PlanCompleted {
                            entity_id,
                            plan_id,
                            tick: self.tick,
                        });
                        state.finish(ExecutionPhase::PlanCompleted);
                        return Ok(());
                    }
                    if started_this_tick {
                        return Ok(());
                    }
                    let step = state.current_step(&plan)?;
                    if !self.start_step(state, plan_id, step) {
                        continue;
                    }
                    started_this_tick = true;
                }
                ExecutionPhase::StepRunning => {
                    let step = state.current_step(&plan)?;
                    match self.resolve_running(state, step)? {
                        None => return Ok(()),
                        Some(StepResolution::Completed(cause)) => {
                            if matches!(
                                cause,
                                CompletionCause::DurationElapsed | CompletionCause::TriggerSatisfied
                            ) {
                                self.cancel_in_flight(state, step);
                            }
                            self.complete_step(state, plan_id, step, cause);
                        }
                        Some(StepResolution::Failed(reason)) => {
                            if matches!(reason, FailReason::TimedOut { .. }) {
                                self.cancel_in_flight(state, step);
                            }
                            self.fail_step(state, plan_id, step, reason);
                        }
                    }
                }
                ExecutionPhase::Idle | ExecutionPhase::PlanCompleted | ExecutionPhase::PlanInterrupted => {
                    return Ok(());
                }
            }
        }

        Err(StateCorruption::new(format!(
            "step machine did not settle within {bound} transitions"
        )))
    }

    /// Skip or dispatch the pending step. Returns `true` if a dispatch was
    /// attempted (successful or not).
    fn start_step(&mut self, state: &mut ExecutionState, plan_id: PlanId, step: &PlanStep) -> bool {
        let entity_id = state.entity_id();
        let step_index = state.step_index();

        if let Some(ready_at_tick) = state.cooldown_until(step.action, self.tick) {
            debug!(%entity_id, %plan_id, step_index, action = %step.action, ready_at_tick, "Step skipped on cooldown");
            self.events.push(ExecutorEvent::StepSkipped {
                entity_id,
                plan_id,
                step_index,
                action: step.action,
                reason: SkipReason::Cooldown { ready_at_tick },
                tick: self.tick,
            });
            state.advance(StepOutcome::Skipped);
            return false;
        }

        let invocation = ActionInvocation {
            entity_id,
            plan_id,
            step_index,
            action: step.action,
            params: step.params.clone(),
            priority: step.priority,
            issued_at_tick: self.tick,
        };

        match self.dispatcher.dispatch(invocation) {
            Ok(handle) => {
                debug!(%entity_id, %plan_id, step_index, action = %step.action, tick = self.tick, "Step started");
                self.invocations = self.invocations.saturating_add(1);
                self.events.push(ExecutorEvent::StepStarted {
                    entity_id,
                    plan_id,
                    step_index,
                    action: step.action,
                    tick: self.tick,
                });
                state.begin_step(self.tick, handle);
            }
            Err(err) => {
                self.fail_step(
                    state,
                    plan_id,
                    step,
                    FailReason::DispatchRejected {
                        message: err.to_string(),
                    },
                );
            }
        }
        true
    }

    /// Check whether the running step ends this tick.
    fn resolve_running(
        &mut self,
        state: &mut ExecutionState,
        step: &PlanStep,
    ) -> Result<Option<StepResolution>, StateCorruption> {
        let validator = self.validator;
        let spec = validator
            .registry()
            .get(step.action)
            .ok_or_else(|| StateCorruption::new(format!("action {} is not registered", step.action)))?;
        let elapsed = self.clock.elapsed_since(state.step_started_at());

        if spec.blocking {
            let status = state
                .in_flight()
                .map(InvocationHandle::status)
                .ok_or_else(|| StateCorruption::new("running step without an invocation"))?;
            match status {
                InvocationStatus::Succeeded => {
                    return Ok(Some(StepResolution::Completed(CompletionCause::ActionFinished)));
                }
                InvocationStatus::Failed => return Ok(Some(StepResolution::Failed(FailReason::ActionFailed))),
                InvocationStatus::Pending => {}
            }
        }

        if let Some(duration_ms) = step.duration_ms
            && elapsed >= self.clock.ms_to_ticks(duration_ms)
        {
            return Ok(Some(StepResolution::Completed(CompletionCause::DurationElapsed)));
        }

        if let Some(expr) = &step.trigger
            && self.trigger_fired(state, expr, elapsed)
        {
            return Ok(Some(StepResolution::Completed(CompletionCause::TriggerSatisfied)));
        }

        if !spec.blocking && step.is_instantaneous() {
            return Ok(Some(StepResolution::Completed(CompletionCause::Instantaneous)));
        }

        if step.duration_ms.is_none()
            && let Some(timeout_ms) = validator.limits().open_step_timeout_ms
            && elapsed >= self.clock.ms_to_ticks(timeout_ms)
        {
            return Ok(Some(StepResolution::Failed(FailReason::TimedOut {
                after_ticks: elapsed,
            })));
        }

        Ok(None)
    }

    fn trigger_fired(&mut self, state: &mut ExecutionState, expr: &BoolExpr, elapsed: u64) -> bool {
        let ctx = EvalContext {
            snapshot: self.snapshot,
            entity_id: state.entity_id(),
            step_elapsed_secs: self.clock.ticks_to_secs(elapsed),
        };
        match trigger::try_evaluate(expr, &ctx) {
            Ok(fired) => fired,
            Err(err) => {
                if !state.trigger_fault_logged() {
                    state.mark_trigger_fault_logged();
                    self.trigger_faults = self.trigger_faults.saturating_add(1);
                    let entity_id = state.entity_id();
                    let step_index = state.step_index();
                    match err {
                        TriggerEvaluationError::UnknownFact { .. } => {
                            warn!(%entity_id, step_index, trigger = %expr, %err, "Trigger failed closed");
                        }
                        TriggerEvaluationError::FactUnavailable { .. } => {
                            debug!(%entity_id, step_index, trigger = %expr, %err, "Trigger failed closed");
                        }
                    }
                }
                false
            }
        }
    }

    fn complete_step(&mut self, state: &mut ExecutionState, plan_id: PlanId, step: &PlanStep, cause: CompletionCause) {
        let entity_id = state.entity_id();
        let step_index = state.step_index();
        debug!(%entity_id, %plan_id, step_index, action = %step.action, ?cause, tick = self.tick, "Step completed");

        self.events.push(ExecutorEvent::StepCompleted {
            entity_id,
            plan_id,
            step_index,
            action: step.action,
            cause,
            tick: self.tick,
        });
        if let Some(text) = &step.speech {
            self.events.push(ExecutorEvent::StatusMessage(StatusMessage {
                entity_id,
                plan_id,
                text: text.clone(),
                tick: self.tick,
            }));
        }
        if step.cooldown_ms > 0 {
            let ready_at = self.tick.saturating_add(self.clock.ms_to_ticks(step.cooldown_ms));
            state.set_cooldown(step.action, ready_at);
        }
        state.advance(StepOutcome::Completed);
    }

    fn fail_step(&mut self, state: &mut ExecutionState, plan_id: PlanId, step: &PlanStep, reason: FailReason) {
        let entity_id = state.entity_id();
        let step_index = state.step_index();
        warn!(%entity_id, %plan_id, step_index, action = %step.action, ?reason, tick = self.tick, "Step failed");

        self.events.push(ExecutorEvent::StepFailed {
            entity_id,
            plan_id,
            step_index,
            action: step.action,
            reason,
            tick: self.tick,
        });
        state.advance(StepOutcome::Failed);
    }

    /// Ask the dispatcher to stop the running step's action when it is still
    /// pending and its action may be cut short.
    fn cancel_in_flight(&mut self, state: &ExecutionState, step: &PlanStep) {
        let interruptible = self
            .validator
            .registry()
            .get(step.action)
            .is_some_and(|spec| spec.interruptible);
        if interruptible
            && let Some(handle) = state.in_flight()
            && handle.is_pending()
        {
            debug!(
                entity_id = %state.entity_id(),
                step_index = state.step_index(),
                action = %step.action,
                tick = self.tick,
                "Cancelling pending action"
            );
            self.dispatcher.cancel(state.entity_id(), step.action, handle);
            self.cancellations = self.cancellations.saturating_add(1);
        }
    }

    /// Discard the active plan, cancelling an interruptible action in flight.
    fn abandon(&mut self, state: &mut ExecutionState, cause: InterruptCause) {
        let entity_id = state.entity_id();
        let step_index = state.step_index();

        if state.phase() == ExecutionPhase::StepRunning
            && let Some(plan) = state.plan_arc()
            && let Some(step) = plan.step(step_index)
        {
            self.cancel_in_flight(state, step);
        }

        if let Some(plan_id) = state.plan_id() {
            info!(%entity_id, %plan_id, ?cause, step_index, tick = self.tick, "Plan interrupted");
            self.events.push(ExecutorEvent::PlanInterrupted {
                entity_id,
                plan_id,
                cause,
                step_index,
                tick: self.tick,
            });
        }
        state.finish(ExecutionPhase::PlanInterrupted);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use stratagem_types::{ActionKind, RawStep, WorldStateView};

    use super::*;
    use crate::config::LimitsConfig;
    use crate::dispatch::RecordingDispatcher;
    use crate::provider::StaticFactProvider;

    const UNIT: EntityId = EntityId::new(1);

    fn executor() -> PlanExecutor {
        PlanExecutor::from_config(&EngineConfig::default()).unwrap()
    }

    fn world() -> StaticFactProvider {
        let mut provider = StaticFactProvider::new();
        provider.set_view(
            UNIT,
            WorldStateView {
                enemy_dist: Some(50.0),
                ..WorldStateView::default()
            },
        );
        provider
    }

    fn names(report: &TickReport) -> Vec<&'static str> {
        report.events.iter().map(ExecutorEvent::name).collect()
    }

    #[test]
    fn instantaneous_steps_run_one_per_tick() {
        let mut exec = executor();
        let mut provider = world();
        let mut dispatcher = RecordingDispatcher::new();
        let plan = RawPlan::new("test")
            .step(RawStep::new("speak").speech("Contact"))
            .step(RawStep::new("hold_position"));
        exec.submit_plan(UNIT, &plan).unwrap();

        let r0 = exec.tick(&mut provider, &mut dispatcher).unwrap();
        assert_eq!(
            names(&r0),
            vec!["plan_admitted", "step_started", "step_completed", "status_message"]
        );
        assert_eq!(r0.invocations, 1);

        let r1 = exec.tick(&mut provider, &mut dispatcher).unwrap();
        assert_eq!(names(&r1), vec!["step_started", "step_completed", "plan_completed"]);
        assert_eq!(r1.active_plans, 0);
        assert_eq!(
            exec.state(UNIT).map(ExecutionState::phase),
            Some(ExecutionPhase::PlanCompleted)
        );

        // Terminal phase is visible for one tick, then the state goes away.
        let r2 = exec.tick(&mut provider, &mut dispatcher).unwrap();
        assert!(r2.events.is_empty());
        assert!(exec.state(UNIT).is_none());
    }

    #[test]
    fn blocking_action_waits_for_collaborator() {
        let mut exec = executor();
        let mut provider = world();
        let mut dispatcher = RecordingDispatcher::new();
        let plan = RawPlan::new("test").step(RawStep::new("move_to").param("target", json!([5, 5])));
        exec.submit_plan(UNIT, &plan).unwrap();

        for _ in 0..5 {
            let report = exec.tick(&mut provider, &mut dispatcher).unwrap();
            assert!(!names(&report).contains(&"step_completed"));
        }
        dispatcher.complete_all();

        let report = exec.tick(&mut provider, &mut dispatcher).unwrap();
        assert!(report.events.iter().any(|e| matches!(
            e,
            ExecutorEvent::StepCompleted {
                cause: CompletionCause::ActionFinished,
                ..
            }
        )));
        assert!(names(&report).contains(&"plan_completed"));
    }

    #[test]
    fn blocking_failure_fails_step_and_plan_continues() {
        let mut exec = executor();
        let mut provider = world();
        let mut dispatcher = RecordingDispatcher::new();
        let plan = RawPlan::new("test")
            .step(RawStep::new("take_cover").duration_ms(1_000))
            .step(RawStep::new("hold_position"));
        exec.submit_plan(UNIT, &plan).unwrap();

        exec.tick(&mut provider, &mut dispatcher).unwrap();
        dispatcher.last_handle().unwrap().completed(false);

        let report = exec.tick(&mut provider, &mut dispatcher).unwrap();
        assert!(matches!(
            report.events.first(),
            Some(ExecutorEvent::StepFailed {
                reason: FailReason::ActionFailed,
                ..
            })
        ));
        assert_eq!(dispatcher.actions(), vec![ActionKind::TakeCover, ActionKind::HoldPosition]);
    }

    #[test]
    fn dispatch_rejection_counts_as_the_tick_start() {
        let mut exec = executor();
        let mut provider = world();
        let mut dispatcher = RecordingDispatcher::new();
        dispatcher.reject_action(ActionKind::Attack, "target gone");
        let plan = RawPlan::new("test")
            .step(RawStep::new("attack").param("target", json!(9)))
            .step(RawStep::new("speak"));
        exec.submit_plan(UNIT, &plan).unwrap();

        let r0 = exec.tick(&mut provider, &mut dispatcher).unwrap();
        assert_eq!(names(&r0), vec!["plan_admitted", "step_failed"]);
        let r1 = exec.tick(&mut provider, &mut dispatcher).unwrap();
        assert_eq!(names(&r1), vec!["step_started", "step_completed", "plan_completed"]);
        // A failed step does not start a cooldown.
        assert!(exec.state(UNIT).unwrap().cooldowns().is_empty());
    }

    #[test]
    fn interrupt_cancels_interruptible_action() {
        let mut exec = executor();
        let mut provider = world();
        let mut dispatcher = RecordingDispatcher::new();
        let plan = RawPlan::new("test").step(RawStep::new("move_to").param("target", json!([5, 5])));
        let plan_id = exec.submit_plan(UNIT, &plan).unwrap();
        exec.tick(&mut provider, &mut dispatcher).unwrap();

        assert!(exec.interrupt(UNIT, InterruptCause::Command));
        assert!(exec.state(UNIT).unwrap().is_interrupted());

        let report = exec.tick(&mut provider, &mut dispatcher).unwrap();
        assert_eq!(
            report.events,
            vec![ExecutorEvent::PlanInterrupted {
                entity_id: UNIT,
                plan_id,
                cause: InterruptCause::Command,
                step_index: 0,
                tick: 1,
            }]
        );
        assert_eq!(dispatcher.cancelled, vec![(UNIT, ActionKind::MoveTo)]);
        assert_eq!(exec.stats().invocations_cancelled, 1);
        assert!(!exec.interrupt(UNIT, InterruptCause::Command));
    }

    #[test]
    fn duration_end_cancels_pending_move() {
        let mut exec = executor();
        let mut provider = world();
        let mut dispatcher = RecordingDispatcher::new();
        let plan = RawPlan::new("test")
            .step(
                RawStep::new("move_to")
                    .param("target", json!([5, 5]))
                    .duration_ms(100),
            )
            .step(RawStep::new("hold_position"));
        exec.submit_plan(UNIT, &plan).unwrap();

        for _ in 0..6 {
            exec.tick(&mut provider, &mut dispatcher).unwrap();
        }

        assert_eq!(dispatcher.actions(), vec![ActionKind::MoveTo, ActionKind::HoldPosition]);
        assert!(dispatcher.handles[0].is_pending());
        assert_eq!(dispatcher.cancelled, vec![(UNIT, ActionKind::MoveTo)]);
        assert_eq!(exec.stats().invocations_cancelled, 1);
    }

    #[test]
    fn trigger_end_cancels_pending_move() {
        let mut exec = executor();
        let mut provider = world();
        let mut dispatcher = RecordingDispatcher::new();
        let plan = RawPlan::new("test").step(
            RawStep::new("move_to")
                .param("target", json!([5, 5]))
                .trigger("enemy_dist < 100"),
        );
        exec.submit_plan(UNIT, &plan).unwrap();
        exec.tick(&mut provider, &mut dispatcher).unwrap();
        exec.tick(&mut provider, &mut dispatcher).unwrap();

        assert_eq!(dispatcher.cancelled, vec![(UNIT, ActionKind::MoveTo)]);
        assert_eq!(exec.stats().invocations_cancelled, 1);
    }

    #[test]
    fn handle_interrupt_drops_queued_plan() {
        let mut exec = executor();
        let mut provider = world();
        let mut dispatcher = RecordingDispatcher::new();
        let handle = exec.handle();
        handle
            .submit_plan(UNIT, &RawPlan::new("test").step(RawStep::new("speak")))
            .unwrap();
        handle.interrupt(UNIT, InterruptCause::Command);

        let report = exec.tick(&mut provider, &mut dispatcher).unwrap();
        assert!(report.events.is_empty());
        assert!(dispatcher.invocations.is_empty());
    }

    #[test]
    fn dead_entity_loses_its_plan() {
        let mut exec = executor();
        let mut provider = world();
        let mut dispatcher = RecordingDispatcher::new();
        let plan = RawPlan::new("test").step(RawStep::new("hold_position").duration_ms(2_000));
        exec.submit_plan(UNIT, &plan).unwrap();
        exec.tick(&mut provider, &mut dispatcher).unwrap();

        provider.view_mut(UNIT).unwrap().alive = false;
        let report = exec.tick(&mut provider, &mut dispatcher).unwrap();
        assert!(matches!(
            report.events.as_slice(),
            [ExecutorEvent::PlanInterrupted {
                cause: InterruptCause::EntityDestroyed,
                ..
            }]
        ));
        assert!(exec.state(UNIT).is_none());
    }

    #[test]
    fn removed_entity_loses_its_plan() {
        let mut exec = executor();
        let mut provider = world();
        let mut dispatcher = RecordingDispatcher::new();
        let plan = RawPlan::new("test").step(RawStep::new("hold_position").duration_ms(2_000));
        exec.submit_plan(UNIT, &plan).unwrap();
        exec.tick(&mut provider, &mut dispatcher).unwrap();

        exec.handle().remove_entity(UNIT);
        let report = exec.tick(&mut provider, &mut dispatcher).unwrap();
        assert_eq!(names(&report), vec!["plan_interrupted"]);
        assert!(exec.state(UNIT).is_none());
    }

    #[test]
    fn open_step_timeout_fails_stuck_steps() {
        let config = EngineConfig {
            limits: LimitsConfig {
                open_step_timeout_ms: Some(100),
                ..LimitsConfig::default()
            },
            ..EngineConfig::default()
        };
        let mut exec = PlanExecutor::from_config(&config).unwrap();
        let mut provider = world();
        let mut dispatcher = RecordingDispatcher::new();
        let plan = RawPlan::new("test").step(RawStep::new("hold_position").trigger("health_pct < 20"));
        exec.submit_plan(UNIT, &plan).unwrap();

        // 100 ms at 30 Hz is 3 ticks.
        for _ in 0..3 {
            let report = exec.tick(&mut provider, &mut dispatcher).unwrap();
            assert!(!names(&report).contains(&"step_failed"));
        }
        let report = exec.tick(&mut provider, &mut dispatcher).unwrap();
        assert!(matches!(
            report.events.first(),
            Some(ExecutorEvent::StepFailed {
                reason: FailReason::TimedOut { after_ticks: 3 },
                ..
            })
        ));
        assert!(names(&report).contains(&"plan_completed"));
    }

    #[test]
    fn trigger_fault_counted_once_per_step() {
        let mut exec = executor();
        let mut provider = StaticFactProvider::new();
        provider.set_view(UNIT, WorldStateView::default());
        let mut dispatcher = RecordingDispatcher::new();
        // No enemy sensed: enemy_dist is unavailable.
        let plan = RawPlan::new("test").step(RawStep::new("hold_position").trigger("enemy_dist < 10"));
        exec.submit_plan(UNIT, &plan).unwrap();

        for _ in 0..10 {
            exec.tick(&mut provider, &mut dispatcher).unwrap();
        }
        assert_eq!(exec.stats().trigger_faults, 1);
        assert_eq!(
            exec.state(UNIT).map(ExecutionState::phase),
            Some(ExecutionPhase::StepRunning)
        );
    }

    #[test]
    fn corrupted_state_forces_idle_without_stopping_others() {
        let other = EntityId::new(2);
        let mut exec = executor();
        let mut provider = world();
        provider.set_view(other, WorldStateView::default());
        let mut dispatcher = RecordingDispatcher::new();
        let plan = RawPlan::new("test").step(RawStep::new("hold_position").duration_ms(1_000));
        exec.submit_plan(UNIT, &plan).unwrap();
        exec.submit_plan(other, &plan).unwrap();
        exec.tick(&mut provider, &mut dispatcher).unwrap();

        exec.state_mut(UNIT).unwrap().corrupt_step_index(7);
        let report = exec.tick(&mut provider, &mut dispatcher).unwrap();

        assert!(matches!(
            report.events.as_slice(),
            [ExecutorEvent::StateCorrupted { entity_id, plan_id: Some(_), .. }] if *entity_id == UNIT
        ));
        assert_eq!(
            exec.state(other).map(ExecutionState::phase),
            Some(ExecutionPhase::StepRunning)
        );
        assert!(exec.state(UNIT).is_none());
        assert_eq!(exec.stats().state_corruptions, 1);
    }

    #[test]
    fn stats_track_submissions_and_rejections() {
        let exec = executor();
        let good = RawPlan::new("test").step(RawStep::new("speak"));
        let bad = RawPlan::new("test").step(RawStep::new("warp"));
        assert_eq!(exec.submit_plan(UNIT, &good).unwrap(), PlanId::new(1));
        assert!(exec.submit_plan(UNIT, &bad).is_err());
        assert_eq!(exec.submit_plan(UNIT, &good).unwrap(), PlanId::new(2));

        let stats = exec.stats();
        assert_eq!(stats.plans_submitted, 3);
        assert_eq!(stats.plans_rejected, 1);
    }
}
