//! Simulation clock and millisecond/tick conversion.
//!
//! Plans express time in milliseconds; the executor measures it in ticks.
//! All conversions go through [`SimClock`] so that pausing or slowing the
//! simulation never desynchronizes plan timing from gameplay.
//!
//! # Design Principles
//!
//! - The tick counter is the single source of truth. Wall-clock time is
//!   never consulted.
//! - Millisecond spans round *up* to whole ticks, so a step never ends
//!   before its requested duration.
//! - All arithmetic is checked or saturating.

use crate::config::SimulationConfig;

/// Highest supported tick rate (one tick per millisecond).
pub const MAX_TICK_RATE_HZ: u32 = 1_000;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,

    /// Invalid tick rate.
    #[error("invalid tick rate {tick_rate_hz} Hz: must be between 1 and {MAX_TICK_RATE_HZ}")]
    InvalidTickRate {
        /// The rejected rate.
        tick_rate_hz: u32,
    },
}

/// Fixed-timestep simulation clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimClock {
    /// The tick currently being (or about to be) processed.
    tick: u64,

    /// Ticks per simulated second.
    tick_rate_hz: u32,
}

impl SimClock {
    /// Create a clock at tick 0 from the simulation configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTickRate`] if the rate is 0 or above
    /// [`MAX_TICK_RATE_HZ`].
    pub fn new(config: &SimulationConfig) -> Result<Self, ClockError> {
        Self::from_parts(0, config.tick_rate_hz)
    }

    /// Create a clock from explicit parameters (useful for testing and
    /// replay restoration).
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidTickRate`] if the rate is out of range.
    pub const fn from_parts(tick: u64, tick_rate_hz: u32) -> Result<Self, ClockError> {
        if tick_rate_hz == 0 || tick_rate_hz > MAX_TICK_RATE_HZ {
            return Err(ClockError::InvalidTickRate { tick_rate_hz });
        }
        Ok(Self { tick, tick_rate_hz })
    }

    /// Advance the clock by one tick. Returns the new tick number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        Ok(self.tick)
    }

    /// Return the current tick number.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Return the configured tick rate.
    pub const fn tick_rate_hz(&self) -> u32 {
        self.tick_rate_hz
    }

    /// Real-time length of one tick in whole milliseconds (rounded down).
    pub fn tick_interval_ms(&self) -> u64 {
        1_000_u64
            .checked_div(u64::from(self.tick_rate_hz))
            .unwrap_or(1_000)
    }

    /// Number of ticks that covers `ms` milliseconds, rounded up.
    ///
    /// Saturates at `u64::MAX` for absurd inputs.
    pub fn ms_to_ticks(&self, ms: u64) -> u64 {
        let scaled = u128::from(ms).saturating_mul(u128::from(self.tick_rate_hz));
        let ticks = scaled.saturating_add(999) / 1_000;
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }

    /// Length of `ticks` ticks in seconds.
    #[allow(clippy::cast_precision_loss)]
    pub fn ticks_to_secs(&self, ticks: u64) -> f64 {
        ticks as f64 / f64::from(self.tick_rate_hz)
    }

    /// Ticks elapsed since `start` (zero if `start` is in the future).
    pub const fn elapsed_since(&self, start: u64) -> u64 {
        self.tick.saturating_sub(start)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_tick_zero() {
        let clock = SimClock::new(&SimulationConfig::default()).unwrap();
        assert_eq!(clock.tick(), 0);
        assert_eq!(clock.tick_rate_hz(), 30);
    }

    #[test]
    fn rejects_invalid_rates() {
        assert!(SimClock::from_parts(0, 0).is_err());
        assert!(SimClock::from_parts(0, 1_001).is_err());
        assert!(SimClock::from_parts(0, 1_000).is_ok());
    }

    #[test]
    fn advance_and_overflow() {
        let mut clock = SimClock::from_parts(5, 30).unwrap();
        assert_eq!(clock.advance().unwrap(), 6);

        let mut clock = SimClock::from_parts(u64::MAX, 30).unwrap();
        assert!(matches!(clock.advance(), Err(ClockError::TickOverflow)));
    }

    #[test]
    fn ms_round_up_to_whole_ticks() {
        let clock = SimClock::from_parts(0, 30).unwrap();
        assert_eq!(clock.ms_to_ticks(0), 0);
        assert_eq!(clock.ms_to_ticks(1), 1);
        assert_eq!(clock.ms_to_ticks(500), 15);
        assert_eq!(clock.ms_to_ticks(1_000), 30);
        assert_eq!(clock.ms_to_ticks(1_001), 31);
        assert_eq!(clock.ms_to_ticks(u64::MAX), u64::MAX);
    }

    #[test]
    fn seconds_and_intervals() {
        let clock = SimClock::from_parts(90, 30).unwrap();
        assert_eq!(clock.tick_interval_ms(), 33);
        assert!((clock.ticks_to_secs(45) - 1.5).abs() < 1e-12);
        assert_eq!(clock.elapsed_since(60), 30);
        assert_eq!(clock.elapsed_since(120), 0);
    }
}
