//! Time effect handlers

use chrono::{DateTime, Duration, Utc};
use coherence_core::effects::ClockEffects;
use parking_lot::Mutex;
use std::sync::Arc;

/// Real time handler for production use
///
/// Stateless; delegates to the operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock handler
    pub fn new() -> Self {
        Self
    }
}

impl ClockEffects for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for simulation and tests
///
/// Clones share the same instant, so a handle kept by a test can move time
/// for every component holding another clone.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl SimulatedClock {
    /// Start at a fixed instant
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Move time forward by whole seconds
    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }

    /// Jump to an instant
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::starting_at(Utc::now())
    }
}

impl ClockEffects for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn simulated_clock_advances_all_clones() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let clock = SimulatedClock::starting_at(start);
        let shared = clock.clone();

        clock.advance_secs(31);
        assert_eq!(shared.now(), start + Duration::seconds(31));

        shared.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
