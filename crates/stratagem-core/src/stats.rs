//! Executor counters.

use serde::Serialize;
use stratagem_types::ExecutorEvent;

/// Running totals since the executor was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    /// Ticks processed.
    pub ticks: u64,
    /// Plans passed to `submit_plan`, valid or not.
    pub plans_submitted: u64,
    /// Plans rejected by validation.
    pub plans_rejected: u64,
    /// Plans that became active.
    pub plans_admitted: u64,
    /// Plans whose every step ended.
    pub plans_completed: u64,
    /// Plans discarded before finishing.
    pub plans_interrupted: u64,
    /// Actions dispatched.
    pub steps_started: u64,
    /// Steps that ended normally.
    pub steps_completed: u64,
    /// Steps skipped on cooldown.
    pub steps_skipped: u64,
    /// Steps whose dispatch or action failed.
    pub steps_failed: u64,
    /// Steps whose trigger could not be evaluated (counted once per step).
    pub trigger_faults: u64,
    /// Entities forced to idle by an invariant violation.
    pub state_corruptions: u64,
    /// Cancellation requests sent for abandoned actions.
    pub invocations_cancelled: u64,
}

impl ExecutorStats {
    /// Count one emitted event.
    pub const fn record(&mut self, event: &ExecutorEvent) {
        let counter = match event {
            ExecutorEvent::PlanAdmitted { .. } => &mut self.plans_admitted,
            ExecutorEvent::PlanCompleted { .. } => &mut self.plans_completed,
            ExecutorEvent::PlanInterrupted { .. } => &mut self.plans_interrupted,
            ExecutorEvent::StepStarted { .. } => &mut self.steps_started,
            ExecutorEvent::StepCompleted { .. } => &mut self.steps_completed,
            ExecutorEvent::StepSkipped { .. } => &mut self.steps_skipped,
            ExecutorEvent::StepFailed { .. } => &mut self.steps_failed,
            ExecutorEvent::StateCorrupted { .. } => &mut self.state_corruptions,
            ExecutorEvent::StatusMessage(_) => return,
        };
        *counter = counter.saturating_add(1);
    }

    /// Plans admitted but not yet completed or interrupted.
    pub const fn plans_in_flight(&self) -> u64 {
        self.plans_admitted
            .saturating_sub(self.plans_completed)
            .saturating_sub(self.plans_interrupted)
    }
}

#[cfg(test)]
mod tests {
    use stratagem_types::{ActionKind, EntityId, PlanId, StatusMessage};

    use super::*;

    #[test]
    fn records_by_event_kind() {
        let mut stats = ExecutorStats::default();
        let entity_id = EntityId::new(1);
        let plan_id = PlanId::new(1);
        stats.record(&ExecutorEvent::PlanAdmitted {
            entity_id,
            plan_id,
            step_count: 1,
            tick: 0,
        });
        stats.record(&ExecutorEvent::StepStarted {
            entity_id,
            plan_id,
            step_index: 0,
            action: ActionKind::Speak,
            tick: 0,
        });
        stats.record(&ExecutorEvent::StatusMessage(StatusMessage {
            entity_id,
            plan_id,
            text: "Hi".to_owned(),
            tick: 0,
        }));

        assert_eq!(stats.plans_admitted, 1);
        assert_eq!(stats.steps_started, 1);
        assert_eq!(stats.plans_in_flight(), 1);
        assert_eq!(stats.steps_completed, 0);
    }
}
