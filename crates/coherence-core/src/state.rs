//! Coherence states, consistency contracts and the per-pair state record

use crate::identifiers::{ComponentId, ParticipantId, RecordId, RecordKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coherence state of one participant's copy of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoherenceState {
    /// Locally authoritative, dirty
    Modified,
    /// Fresh, shared
    SharedPlus,
    /// Stale but readable, shared
    SharedMinus,
    /// Must resync before use
    Invalid,
}

impl CoherenceState {
    /// Every state, in declaration order
    pub const ALL: [CoherenceState; 4] = [
        CoherenceState::Modified,
        CoherenceState::SharedPlus,
        CoherenceState::SharedMinus,
        CoherenceState::Invalid,
    ];

    /// Dense index used by counter tables
    pub fn index(self) -> usize {
        match self {
            CoherenceState::Modified => 0,
            CoherenceState::SharedPlus => 1,
            CoherenceState::SharedMinus => 2,
            CoherenceState::Invalid => 3,
        }
    }

    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            CoherenceState::Modified => "MODIFIED",
            CoherenceState::SharedPlus => "SHARED_PLUS",
            CoherenceState::SharedMinus => "SHARED_MINUS",
            CoherenceState::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for CoherenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoherenceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        CoherenceState::ALL
            .into_iter()
            .find(|state| state.as_str() == normalized)
            .ok_or_else(|| format!("unknown coherence state: {s}"))
    }
}

/// Consistency contract declared by a participant for one component
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsistencyType {
    /// Invalidate on any remote write
    Strong,
    /// Tolerate staleness, resync in the background
    #[default]
    Eventual,
    /// Tolerate staleness up to a deadline
    BoundedStaleness,
    /// A participant always observes its own writes
    ReadMyWrites,
    /// Never forced backwards by a remote write
    MonotonicReads,
}

impl ConsistencyType {
    /// Every contract, in declaration order
    pub const ALL: [ConsistencyType; 5] = [
        ConsistencyType::Strong,
        ConsistencyType::Eventual,
        ConsistencyType::BoundedStaleness,
        ConsistencyType::ReadMyWrites,
        ConsistencyType::MonotonicReads,
    ];

    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            ConsistencyType::Strong => "STRONG",
            ConsistencyType::Eventual => "EVENTUAL",
            ConsistencyType::BoundedStaleness => "BOUNDED_STALENESS",
            ConsistencyType::ReadMyWrites => "READ_MY_WRITES",
            ConsistencyType::MonotonicReads => "MONOTONIC_READS",
        }
    }
}

impl fmt::Display for ConsistencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsistencyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        ConsistencyType::ALL
            .into_iter()
            .find(|contract| contract.as_str() == normalized)
            .ok_or_else(|| format!("unknown consistency type: {s}"))
    }
}

/// Persisted state of one (participant, component) pair
///
/// At most one record exists per pair. `state`, `version` and
/// `staleness_bound` are only mutated by the state transition engine;
/// `consistency` only changes through contract declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentStateRecord {
    /// Storage identity
    pub id: RecordId,
    /// Owning participant
    pub participant_id: ParticipantId,
    /// Shared component
    pub component_id: ComponentId,
    /// Current coherence state
    pub state: CoherenceState,
    /// Declared consistency contract
    pub consistency: ConsistencyType,
    /// Monotonically non-decreasing per pair
    pub version: u64,
    /// Last time this record was mutated
    pub timestamp: DateTime<Utc>,
    /// Deadline after which a bounded-staleness copy is considered invalid
    pub staleness_bound: Option<DateTime<Utc>>,
}

impl ComponentStateRecord {
    /// The record an absent pair resolves to: INVALID, EVENTUAL, version 0
    pub fn unresolved(key: &RecordKey, now: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::new(),
            participant_id: key.participant_id.clone(),
            component_id: key.component_id.clone(),
            state: CoherenceState::Invalid,
            consistency: ConsistencyType::default(),
            version: 0,
            timestamp: now,
            staleness_bound: None,
        }
    }

    /// Natural key of this record
    pub fn key(&self) -> RecordKey {
        RecordKey {
            participant_id: self.participant_id.clone(),
            component_id: self.component_id.clone(),
        }
    }

    /// True once a staleness bound exists and `now` is past it
    pub fn staleness_expired(&self, now: DateTime<Utc>) -> bool {
        self.staleness_bound.is_some_and(|bound| now > bound)
    }
}
