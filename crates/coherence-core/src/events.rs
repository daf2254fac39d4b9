//! State-change notifications

use crate::identifiers::{ComponentId, ParticipantId, RecordKey};
use crate::state::CoherenceState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What caused a state mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionCause {
    /// Local read resynchronized the record
    Read,
    /// Local write
    Write,
    /// Another participant wrote the component
    RemoteWrite,
    /// The staleness bound passed
    #[serde(rename = "staleness")]
    StalenessExpired,
    /// Background resync pulled a newer version
    Resync,
}

impl TransitionCause {
    /// Label used in logs and activity entries
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionCause::Read => "read",
            TransitionCause::Write => "write",
            TransitionCause::RemoteWrite => "remote-write",
            TransitionCause::StalenessExpired => "staleness",
            TransitionCause::Resync => "resync",
        }
    }
}

impl fmt::Display for TransitionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fired exactly once per actual state mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChangeEvent {
    /// Participant owning the record
    pub participant_id: ParticipantId,
    /// Component of the record
    pub component_id: ComponentId,
    /// State before the mutation
    pub old_state: CoherenceState,
    /// State after the mutation
    pub new_state: CoherenceState,
    /// Record version after the mutation
    pub version: u64,
    /// Why the mutation happened
    pub cause: TransitionCause,
    /// When the mutation was applied
    pub at: DateTime<Utc>,
}

impl StateChangeEvent {
    /// Natural key of the mutated record
    pub fn key(&self) -> RecordKey {
        RecordKey {
            participant_id: self.participant_id.clone(),
            component_id: self.component_id.clone(),
        }
    }
}
