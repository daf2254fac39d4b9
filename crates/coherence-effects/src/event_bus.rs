//! Broadcast fan-out of state-change events
//!
//! Publishing never blocks and never fails: with no subscribers the event is
//! dropped, and a subscriber that falls more than `capacity` events behind
//! observes a lag on its own receiver instead of slowing the publisher.

use coherence_core::effects::StateChangeSink;
use coherence_core::StateChangeEvent;
use tokio::sync::broadcast;

/// Event fan-out backed by a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StateChangeEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` undelivered events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<StateChangeEvent> {
        self.tx.subscribe()
    }

    /// Current number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl StateChangeSink for EventBus {
    fn publish(&self, event: &StateChangeEvent) {
        // No subscribers is not an error for the publisher.
        let _ = self.tx.send(event.clone());
    }
}
