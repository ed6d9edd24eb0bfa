//! The async tick loop.
//!
//! [`run_executor`] wraps [`PlanExecutor::tick`] with the control plane:
//! pause/resume, stop requests, the tick bound and real-time pacing. The
//! tick itself stays synchronous; the loop only awaits between ticks.

use std::sync::Arc;

use tracing::{info, warn};

use crate::control::{RunControl, RunEndReason};
use crate::dispatch::ActionDispatcher;
use crate::executor::{PlanExecutor, TickError, TickReport};
use crate::provider::WorldFactProvider;
use crate::stats::ExecutorStats;

/// Errors that end a run abnormally.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Why the run ended.
    pub end_reason: RunEndReason,
    /// Ticks processed by this run.
    pub total_ticks: u64,
    /// Executor totals at the end of the run.
    pub stats: ExecutorStats,
}

/// Receives every tick's report.
pub trait TickCallback: Send {
    /// Called after each tick.
    fn on_tick(&mut self, report: &TickReport, executor: &PlanExecutor);
}

/// A callback that does nothing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _report: &TickReport, _executor: &PlanExecutor) {}
}

/// Run ticks until the tick bound is reached or a stop is requested.
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick fails.
pub async fn run_executor(
    executor: &mut PlanExecutor,
    provider: &mut dyn WorldFactProvider,
    dispatcher: &mut dyn ActionDispatcher,
    control: &Arc<RunControl>,
    callback: &mut dyn TickCallback,
) -> Result<RunResult, RunnerError> {
    let mut total_ticks: u64 = 0;

    info!(
        max_ticks = control.max_ticks(),
        tick_rate_hz = executor.clock().tick_rate_hz(),
        tick_interval_ms = control.tick_interval_ms(),
        "Executor loop starting"
    );

    let end_reason = loop {
        if control.is_paused() {
            info!("Executor paused, waiting for resume");
            control.wait_if_paused().await;
            info!("Executor resumed");
        }

        if control.is_stop_requested() {
            info!("Stop requested");
            break RunEndReason::OperatorStop;
        }

        let report = executor.tick(provider, dispatcher)?;
        total_ticks = total_ticks.saturating_add(1);
        callback.on_tick(&report, executor);

        if control.tick_limit_reached(total_ticks) {
            info!(tick = report.tick, max_ticks = control.max_ticks(), "Tick limit reached");
            break RunEndReason::MaxTicksReached;
        }

        let interval_ms = control.tick_interval_ms();
        if interval_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(interval_ms)).await;
        } else {
            // Let other tasks (plan producers, signal handlers) run.
            tokio::task::yield_now().await;
        }
    };

    control.set_end_reason(end_reason).await;
    Ok(RunResult {
        end_reason,
        total_ticks,
        stats: executor.stats(),
    })
}

/// Log the end of a run.
pub fn log_run_end(result: &RunResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        plans_admitted = result.stats.plans_admitted,
        plans_completed = result.stats.plans_completed,
        plans_interrupted = result.stats.plans_interrupted,
        plans_in_flight = result.stats.plans_in_flight(),
        steps_started = result.stats.steps_started,
        steps_failed = result.stats.steps_failed,
        "Executor loop ended"
    );
    if result.total_ticks == 0 {
        warn!("Executor loop ended with no ticks processed");
    }
    if result.stats.state_corruptions > 0 {
        warn!(count = result.stats.state_corruptions, "Entities were forced idle by state corruption");
    }
}
