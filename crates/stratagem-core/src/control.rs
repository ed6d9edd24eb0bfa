//! Run control shared between the tick loop and the host.
//!
//! The host (a signal handler, an admin endpoint, a test) can pause,
//! resume or stop the loop without owning it. Flags are atomics so
//! the tick loop reads them without locking.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};

use crate::config::SimulationConfig;

/// Why the run loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunEndReason {
    /// The configured `max_ticks` were processed.
    MaxTicksReached,
    /// The host requested a stop.
    OperatorStop,
}

/// Shared control state of one run.
#[derive(Debug)]
pub struct RunControl {
    /// Whether the loop is paused.
    paused: AtomicBool,

    /// Wakes the loop on resume.
    resume_notify: Notify,

    /// Whether a stop has been requested.
    stop_requested: AtomicBool,

    /// Real-time sleep between ticks (0 = run flat out).
    tick_interval_ms: u64,

    /// Wall-clock start of the run.
    started_at: DateTime<Utc>,

    /// Ticks to process before stopping (0 = unlimited).
    max_ticks: u64,

    /// Reason the run ended, once it has.
    end_reason: Mutex<Option<RunEndReason>>,
}

impl RunControl {
    /// Create control state.
    pub fn new(tick_interval_ms: u64, max_ticks: u64) -> Self {
        Self {
            paused: AtomicBool::new(false),
            resume_notify: Notify::new(),
            stop_requested: AtomicBool::new(false),
            tick_interval_ms,
            started_at: Utc::now(),
            max_ticks,
            end_reason: Mutex::new(None),
        }
    }

    /// Create control state from the simulation configuration.
    ///
    /// `tick_interval_ms` is the clock's tick length when running in real
    /// time and 0 otherwise.
    pub fn from_config(config: &SimulationConfig, tick_interval_ms: u64) -> Self {
        let interval = if config.realtime { tick_interval_ms } else { 0 };
        Self::new(interval, config.max_ticks)
    }

    /// Whether the loop is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause before the next tick.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume and wake the loop.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.resume_notify.notify_one();
    }

    /// Wait until the loop is no longer paused.
    pub async fn wait_if_paused(&self) {
        while self.paused.load(Ordering::Acquire) {
            self.resume_notify.notified().await;
        }
    }

    /// Request a stop before the next tick.
    ///
    /// Also releases a paused loop so it can observe the request.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        if self.is_paused() {
            self.resume();
        }
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Record why the run ended.
    pub async fn set_end_reason(&self, reason: RunEndReason) {
        *self.end_reason.lock().await = Some(reason);
    }

    /// Why the run ended, if it has.
    pub async fn end_reason(&self) -> Option<RunEndReason> {
        *self.end_reason.lock().await
    }

    /// Sleep between ticks.
    pub const fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
    }

    /// Whether `ticks_done` reaches the tick bound.
    pub const fn tick_limit_reached(&self, ticks_done: u64) -> bool {
        self.max_ticks > 0 && ticks_done >= self.max_ticks
    }

    /// Configured tick bound (0 = unlimited).
    pub const fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    /// Wall-clock seconds since the run started.
    pub fn elapsed_seconds(&self) -> u64 {
        let elapsed = Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds();
        u64::try_from(elapsed.max(0)).unwrap_or(u64::MAX)
    }
}
