//! Monotonic clock abstraction used for ephemeral entry ages.
//!
//! Entry ages must never go backwards, so the default source is built on
//! [`Instant`] rather than wall-clock time. Tests swap in a clock whose time
//! is controlled explicitly.

use std::time::Instant;

/// Abstraction over a monotonic clock for dependency injection.
///
/// Allows deterministic testing of TTL expiry by replacing the real clock
/// with one whose time only moves when the test says so.
pub trait ClockSource: Send + Sync {
    /// Returns elapsed milliseconds since an arbitrary, fixed origin.
    fn now(&self) -> u64;
}

/// Default clock source: milliseconds elapsed since the clock was created.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for MonotonicClock {
    fn now(&self) -> u64 {
        // A process would need to run for ~584 million years to overflow.
        #[allow(clippy::cast_possible_truncation)]
        let millis = self.origin.elapsed().as_millis() as u64;
        millis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let first = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = clock.now();
        assert!(second >= first);
    }

    #[test]
    fn monotonic_clock_starts_near_zero() {
        let clock = MonotonicClock::new();
        assert!(clock.now() < 1_000);
    }
}
