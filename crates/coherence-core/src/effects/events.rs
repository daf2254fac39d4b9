//! State-change event sink

use crate::events::StateChangeEvent;

/// Receives one event per confirmed state mutation.
///
/// Called synchronously from the mutation path after the record is
/// persisted. Implementations must not block and cannot fail the mutation.
pub trait StateChangeSink: Send + Sync {
    /// Deliver an event to downstream listeners
    fn publish(&self, event: &StateChangeEvent);
}
