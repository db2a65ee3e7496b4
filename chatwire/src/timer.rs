//! Tick-driven repeating timer.

use std::time::Duration;

/// Repeating timer advanced by host ticks.
///
/// Owners keep it in an `Option`: `Some` is the single active registration,
/// `None` means no timer is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatingTimer {
    interval: Duration,
    elapsed: Duration,
}

impl RepeatingTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            elapsed: Duration::ZERO,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Advance by `delta`, returns true when the interval was reached.
    ///
    /// Fires at most once per call; the remainder past the interval is
    /// dropped so a long stall does not produce a burst.
    pub fn advance(&mut self, delta: Duration) -> bool {
        self.elapsed = self.elapsed.saturating_add(delta);
        if self.elapsed >= self.interval {
            self.elapsed = Duration::ZERO;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }
}
