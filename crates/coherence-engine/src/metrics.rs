//! Process-wide coherence metrics
//!
//! Counters are atomics; the two activity logs are fixed-capacity FIFOs
//! behind short `parking_lot` critical sections that never span an await.
//! One recorder is created per runtime and handed to every component that
//! records activity.

use chrono::{DateTime, Utc};
use coherence_core::{
    CoherenceState, ComponentId, ParticipantId, RecordKey, StateChangeEvent, TransitionCause,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// Default capacity of the recent-transition and activity logs
pub const DEFAULT_RECENT_CAPACITY: usize = 50;

/// One recorded state transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Participant owning the record
    pub participant_id: ParticipantId,
    /// Component of the record
    pub component_id: ComponentId,
    /// State before
    pub from_state: CoherenceState,
    /// State after
    pub to_state: CoherenceState,
    /// Version after the transition
    pub version: u64,
    /// Operation that caused it
    pub cause: TransitionCause,
    /// When it happened
    pub at: DateTime<Utc>,
}

impl From<&StateChangeEvent> for TransitionRecord {
    fn from(event: &StateChangeEvent) -> Self {
        Self {
            participant_id: event.participant_id.clone(),
            component_id: event.component_id.clone(),
            from_state: event.old_state,
            to_state: event.new_state,
            version: event.version,
            cause: event.cause,
            at: event.at,
        }
    }
}

/// Kind of activity log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    /// A state mutation
    StateTransition,
    /// A read/write entry point invocation
    Operation,
}

/// One activity log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Entry kind
    pub kind: ActivityKind,
    /// Participant involved
    pub participant_id: ParticipantId,
    /// Component involved
    pub component_id: ComponentId,
    /// Operation label
    pub operation: String,
    /// Free-form details
    pub details: Option<String>,
    /// When it happened
    pub at: DateTime<Utc>,
}

/// Serializable point-in-time metrics report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Transitions recorded since start
    pub total_operations: u64,
    /// Live record count per state
    pub state_distribution: BTreeMap<CoherenceState, u64>,
    /// Transitions recorded per target state
    pub transition_counts: BTreeMap<CoherenceState, u64>,
}

/// Bounded FIFO that evicts its oldest entry on overflow
#[derive(Debug)]
struct BoundedLog<T> {
    capacity: usize,
    entries: Mutex<VecDeque<T>>,
}

impl<T: Clone> BoundedLog<T> {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn push(&self, entry: T) {
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    fn snapshot(&self) -> Vec<T> {
        self.entries.lock().iter().cloned().collect()
    }
}

/// Concurrent transition counters and recent-activity logs
#[derive(Debug)]
pub struct MetricsRecorder {
    transition_counts: [AtomicU64; 4],
    total_operations: AtomicU64,
    recent_transitions: BoundedLog<TransitionRecord>,
    activity: BoundedLog<ActivityEntry>,
}

impl MetricsRecorder {
    /// Create a recorder with zeroed counters and logs of `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            transition_counts: Default::default(),
            total_operations: AtomicU64::new(0),
            recent_transitions: BoundedLog::new(capacity),
            activity: BoundedLog::new(capacity),
        }
    }

    /// Record one confirmed state mutation
    pub fn record_transition(&self, event: &StateChangeEvent) {
        self.transition_counts[event.new_state.index()].fetch_add(1, Ordering::Relaxed);
        self.total_operations.fetch_add(1, Ordering::Relaxed);

        let record = TransitionRecord::from(event);
        self.activity.push(ActivityEntry {
            kind: ActivityKind::StateTransition,
            participant_id: record.participant_id.clone(),
            component_id: record.component_id.clone(),
            operation: event.cause.as_str().to_string(),
            details: Some(format!("{} -> {}", event.old_state, event.new_state)),
            at: event.at,
        });
        self.recent_transitions.push(record);
    }

    /// Log a read/write entry point invocation
    pub fn log_operation(
        &self,
        key: &RecordKey,
        operation: &str,
        details: Option<String>,
        at: DateTime<Utc>,
    ) {
        self.activity.push(ActivityEntry {
            kind: ActivityKind::Operation,
            participant_id: key.participant_id.clone(),
            component_id: key.component_id.clone(),
            operation: operation.to_string(),
            details,
            at,
        });
    }

    /// Transitions recorded since start
    pub fn total_operations(&self) -> u64 {
        self.total_operations.load(Ordering::Relaxed)
    }

    /// Transitions recorded per target state; every state is present
    pub fn transition_counts(&self) -> BTreeMap<CoherenceState, u64> {
        CoherenceState::ALL
            .into_iter()
            .map(|state| {
                (
                    state,
                    self.transition_counts[state.index()].load(Ordering::Relaxed),
                )
            })
            .collect()
    }

    /// Most recent transitions, oldest first
    pub fn recent_transitions(&self) -> Vec<TransitionRecord> {
        self.recent_transitions.snapshot()
    }

    /// Most recent activity entries, oldest first
    pub fn component_logs(&self) -> Vec<ActivityEntry> {
        self.activity.snapshot()
    }

    /// Build a report around a live state distribution
    pub fn report(&self, state_distribution: BTreeMap<CoherenceState, u64>) -> MetricsReport {
        MetricsReport {
            total_operations: self.total_operations(),
            state_distribution,
            transition_counts: self.transition_counts(),
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn event(n: u64, to: CoherenceState) -> StateChangeEvent {
        StateChangeEvent {
            participant_id: ParticipantId::new(format!("p{n}")),
            component_id: "c".into(),
            old_state: CoherenceState::Invalid,
            new_state: to,
            version: n,
            cause: TransitionCause::Write,
            at: Utc::now(),
        }
    }

    #[test]
    fn counters_start_at_zero_for_every_state() {
        let metrics = MetricsRecorder::default();
        let counts = metrics.transition_counts();
        assert_eq!(counts.len(), 4);
        assert!(counts.values().all(|c| *c == 0));
        assert_eq!(metrics.total_operations(), 0);
    }

    #[test]
    fn transitions_count_by_target_state() {
        let metrics = MetricsRecorder::default();
        metrics.record_transition(&event(1, CoherenceState::Modified));
        metrics.record_transition(&event(2, CoherenceState::Modified));
        metrics.record_transition(&event(3, CoherenceState::Invalid));

        let counts = metrics.transition_counts();
        assert_eq!(counts[&CoherenceState::Modified], 2);
        assert_eq!(counts[&CoherenceState::Invalid], 1);
        assert_eq!(metrics.total_operations(), 3);
    }

    #[test]
    fn recent_log_evicts_oldest_first() {
        let metrics = MetricsRecorder::new(50);
        for n in 0..60 {
            metrics.record_transition(&event(n, CoherenceState::SharedMinus));
        }
        let recent = metrics.recent_transitions();
        assert_eq!(recent.len(), 50);
        assert_eq!(recent.first().unwrap().version, 10);
        assert_eq!(recent.last().unwrap().version, 59);
    }

    #[test]
    fn operations_and_transitions_share_activity_log() {
        let metrics = MetricsRecorder::new(3);
        let key = RecordKey::new("p", "c");
        metrics.log_operation(&key, "read", None, Utc::now());
        metrics.record_transition(&event(1, CoherenceState::SharedPlus));

        let logs = metrics.component_logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].kind, ActivityKind::Operation);
        assert_eq!(logs[1].kind, ActivityKind::StateTransition);
        assert_eq!(logs[1].details.as_deref(), Some("INVALID -> SHARED_PLUS"));
        assert_eq!(metrics.total_operations(), 1);
    }

    #[test]
    fn concurrent_recording_loses_no_updates() {
        let metrics = Arc::new(MetricsRecorder::new(50));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for n in 0..250 {
                        metrics.record_transition(&event(t * 1000 + n, CoherenceState::Modified));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.total_operations(), 2000);
        assert_eq!(metrics.transition_counts()[&CoherenceState::Modified], 2000);
        assert_eq!(metrics.recent_transitions().len(), 50);
    }

    #[test]
    fn report_carries_distribution_and_counts() {
        let metrics = MetricsRecorder::default();
        metrics.record_transition(&event(1, CoherenceState::Modified));
        let mut distribution = BTreeMap::new();
        distribution.insert(CoherenceState::Modified, 1);

        let report = metrics.report(distribution);
        assert_eq!(report.total_operations, 1);
        assert_eq!(report.state_distribution[&CoherenceState::Modified], 1);
        assert_eq!(report.transition_counts[&CoherenceState::Modified], 1);
    }
}
