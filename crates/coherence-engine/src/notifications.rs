//! State-change notification logger
//!
//! A downstream listener on the event bus. It runs on its own task, so a
//! slow log sink never holds up a mutation.

use crate::tasks::BackgroundTasks;
use coherence_core::StateChangeEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

/// Render one event the way the notification log prints it
pub fn describe(event: &StateChangeEvent) -> String {
    format!(
        "component {} in participant {}: {} -> {} (version {})",
        event.component_id, event.participant_id, event.old_state, event.new_state, event.version
    )
}

/// Log every event from `events` until the bus closes or `tasks` shuts down
pub fn spawn_notification_logger(
    tasks: &BackgroundTasks,
    mut events: broadcast::Receiver<StateChangeEvent>,
) {
    tasks.spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!(
                    record = %event.key(),
                    cause = %event.cause,
                    "State change: {}",
                    describe(&event)
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Notification logger fell behind; events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use coherence_core::{CoherenceState, TransitionCause};

    #[test]
    fn describe_names_pair_and_states() {
        let event = StateChangeEvent {
            participant_id: "orders".into(),
            component_id: "cart".into(),
            old_state: CoherenceState::SharedPlus,
            new_state: CoherenceState::SharedMinus,
            version: 4,
            cause: TransitionCause::RemoteWrite,
            at: Utc::now(),
        };
        assert_eq!(
            describe(&event),
            "component cart in participant orders: SHARED_PLUS -> SHARED_MINUS (version 4)"
        );
    }
}
