//! Wall-clock time effect

use chrono::{DateTime, Utc};

/// Source of the current time for timestamps and staleness deadlines
pub trait ClockEffects: Send + Sync {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;
}
