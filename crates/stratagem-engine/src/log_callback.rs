//! Tick callback that writes every executor event to the log.

use stratagem_core::{PlanExecutor, TickCallback, TickReport};
use stratagem_types::ExecutorEvent;
use tracing::{debug, info, warn};

/// Logs executor events and a periodic activity summary.
pub struct LogCallback {
    /// Ticks between summaries (0 disables them).
    summary_every: u64,
    events_seen: u64,
}

impl LogCallback {
    /// Create a callback that summarizes every `summary_every` ticks.
    pub const fn new(summary_every: u64) -> Self {
        Self {
            summary_every,
            events_seen: 0,
        }
    }

    /// Events logged so far.
    pub const fn events_seen(&self) -> u64 {
        self.events_seen
    }
}

impl TickCallback for LogCallback {
    fn on_tick(&mut self, report: &TickReport, executor: &PlanExecutor) {
        for event in &report.events {
            log_event(event);
        }
        let count = u64::try_from(report.events.len()).unwrap_or(u64::MAX);
        self.events_seen = self.events_seen.saturating_add(count);

        if self.summary_every > 0 && report.tick.checked_rem(self.summary_every) == Some(0) {
            let stats = executor.stats();
            info!(
                tick = report.tick,
                active_plans = report.active_plans,
                plans_completed = stats.plans_completed,
                steps_started = stats.steps_started,
                steps_failed = stats.steps_failed,
                "Executor status"
            );
        }
    }
}

fn log_event(event: &ExecutorEvent) {
    let entity_id = event.entity_id();
    let tick = event.tick();
    match event {
        ExecutorEvent::StatusMessage(message) => {
            info!(%entity_id, tick, text = %message.text, "Unit says");
        }
        ExecutorEvent::StepFailed { action, reason, .. } => {
            warn!(%entity_id, tick, %action, ?reason, "Step failed");
        }
        ExecutorEvent::StateCorrupted { detail, .. } => {
            warn!(%entity_id, tick, %detail, "State corrupted");
        }
        ExecutorEvent::StepStarted { action, step_index, .. } => {
            debug!(%entity_id, tick, %action, step_index, event = event.name());
        }
        ExecutorEvent::StepCompleted {
            action,
            step_index,
            cause,
            ..
        } => {
            debug!(%entity_id, tick, %action, step_index, ?cause, event = event.name());
        }
        ExecutorEvent::StepSkipped {
            action,
            step_index,
            reason,
            ..
        } => {
            debug!(%entity_id, tick, %action, step_index, ?reason, event = event.name());
        }
        ExecutorEvent::PlanAdmitted { .. }
        | ExecutorEvent::PlanCompleted { .. }
        | ExecutorEvent::PlanInterrupted { .. } => {
            debug!(%entity_id, tick, event = event.name());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stratagem_core::{EngineConfig, RecordingDispatcher, StaticFactProvider};
    use stratagem_types::{EntityId, RawPlan, RawStep};

    use super::*;

    #[test]
    fn counts_logged_events() {
        let mut executor = PlanExecutor::from_config(&EngineConfig::default()).unwrap();
        let mut provider = StaticFactProvider::new();
        let mut dispatcher = RecordingDispatcher::new();
        executor
            .submit_plan(
                EntityId::new(1),
                &RawPlan::new("test").step(RawStep::new("speak").speech("Ready")),
            )
            .unwrap();

        let mut callback = LogCallback::new(1);
        let report = executor.tick(&mut provider, &mut dispatcher).unwrap();
        callback.on_tick(&report, &executor);

        // Admitted, started, completed, status line, plan completed.
        assert_eq!(callback.events_seen(), 5);
    }
}
