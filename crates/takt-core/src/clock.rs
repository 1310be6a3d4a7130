//! Time source seam.
//!
//! Event timestamps come from a [`Clock`] rather than from `Utc::now()`
//! calls scattered through the core, so tests and the simulation harness
//! can pin or step time deterministically.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Source of the current timestamp for event stamping and session login times.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// Process wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually stepped clock for tests and simulation.
///
/// Starts at a fixed instant and only moves when told to, so event
/// ordering in tests is fully controlled by the test body.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock pinned at `start`.
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `step`.
    pub fn advance(&self, step: Duration) {
        let mut now = self.now.lock().expect("fixed clock lock");
        *now += step;
    }

    /// Pin the clock to an absolute instant (may move backwards).
    pub fn set(&self, at: DateTime<Utc>) {
        let mut now = self.now.lock().expect("fixed clock lock");
        *now = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("fixed clock lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_advances_only_when_told() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).single().expect("valid ts");
        let clock = FixedClock::new(start);

        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now(), start + Duration::seconds(90));
    }

    #[test]
    fn fixed_clock_set_can_move_backwards() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).single().expect("valid ts");
        let clock = FixedClock::new(start);

        let earlier = start - Duration::minutes(5);
        clock.set(earlier);
        assert_eq!(clock.now(), earlier);
    }

    #[test]
    fn system_clock_is_monotonic_enough_for_ordering() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
