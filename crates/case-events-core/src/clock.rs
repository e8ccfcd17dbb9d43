//! Clock abstraction for determinism.
//!
//! The clock is read only when a command creates an event. Replay never
//! consults it.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};

/// Abstraction over system time for deterministic behavior.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock that delegates to the system clock.
///
/// Timestamps are truncated to whole microseconds, the precision of
/// `TIMESTAMPTZ`, so a stored `occurred_at` reads back unchanged.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let now = Utc::now();
        now.duration_trunc(TimeDelta::microseconds(1)).unwrap_or(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_has_no_sub_microsecond_component() {
        let now = SystemClock.now();

        assert_eq!(now.timestamp_subsec_nanos() % 1_000, 0);
    }
}
