//! Time sources for the per-tick pipeline.
//!
//! Every timer in the crate (beat cooldown, silence timeout, transitions,
//! auto-advance) reads time from a [`Clock`], so tests can drive the whole
//! performance with synthetic timestamps instead of waiting.

use std::cell::Cell;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait Clock {
    /// Time elapsed since this clock's epoch.
    fn now(&self) -> Duration;
}

/// Wall clock measured from the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
    }
}

/// Manually advanced clock for tests and offline rendering.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new(start: Duration) -> Self {
        Self { now: Cell::new(start) }
    }

    pub fn set(&self, now: Duration) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(Duration::from_millis(500));
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now(), Duration::from_millis(750));

        clock.set(Duration::from_secs(2));
        assert_eq!(clock.now(), Duration::from_secs(2));
    }

    #[test]
    fn test_system_clock_is_past_epoch() {
        assert!(SystemClock.now() > Duration::from_secs(1_600_000_000));
    }
}
