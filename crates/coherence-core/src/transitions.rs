//! The coherence transition table
//!
//! Every rule that maps a consistency contract and a coherence state to the
//! next state lives here, so the engine, the reconciler and the operation
//! model runner dispatch through one table instead of repeating it.
//!
//! | contract            | remote write on SHARED_PLUS | remote write otherwise | read fill   | run step |
//! |---------------------|-----------------------------|------------------------|-------------|----------|
//! | STRONG              | INVALID                     | INVALID                | SHARED_PLUS | write    |
//! | EVENTUAL            | SHARED_MINUS                | unchanged              | SHARED_MINUS| read     |
//! | BOUNDED_STALENESS   | SHARED_MINUS                | unchanged              | SHARED_MINUS| read     |
//! | READ_MY_WRITES      | SHARED_MINUS                | unchanged              | SHARED_MINUS| write    |
//! | MONOTONIC_READS     | unchanged                   | unchanged              | SHARED_MINUS| read     |

use crate::model::OperationKind;
use crate::state::{CoherenceState, ComponentStateRecord, ConsistencyType};
use std::cmp::Ordering;
use std::time::Duration;

/// Staleness window applied to bounded-staleness records
pub const DEFAULT_STALENESS_WINDOW: Duration = Duration::from_secs(30);

/// State a sharer moves to when another participant writes the component.
///
/// Driven by the sharer's own contract, never the writer's.
pub fn remote_write_downgrade(
    consistency: ConsistencyType,
    current: CoherenceState,
) -> CoherenceState {
    match consistency {
        ConsistencyType::Strong => CoherenceState::Invalid,
        ConsistencyType::Eventual
        | ConsistencyType::BoundedStaleness
        | ConsistencyType::ReadMyWrites => match current {
            CoherenceState::SharedPlus => CoherenceState::SharedMinus,
            other => other,
        },
        ConsistencyType::MonotonicReads => current,
    }
}

/// State an INVALID reader lands in after pulling from an authoritative source
pub fn read_fill_state(consistency: ConsistencyType) -> CoherenceState {
    match consistency {
        ConsistencyType::Strong => CoherenceState::SharedPlus,
        ConsistencyType::Eventual
        | ConsistencyType::BoundedStaleness
        | ConsistencyType::ReadMyWrites
        | ConsistencyType::MonotonicReads => CoherenceState::SharedMinus,
    }
}

/// Whether records under this contract carry a staleness deadline
pub fn tracks_staleness(consistency: ConsistencyType) -> bool {
    matches!(consistency, ConsistencyType::BoundedStaleness)
}

/// How an operation model run drives a requirement declared with this contract
pub fn requirement_operation(consistency: ConsistencyType) -> OperationKind {
    match consistency {
        ConsistencyType::Strong | ConsistencyType::ReadMyWrites => OperationKind::Write,
        ConsistencyType::Eventual
        | ConsistencyType::BoundedStaleness
        | ConsistencyType::MonotonicReads => OperationKind::Read,
    }
}

/// Ranking used to choose an authoritative source among same-state candidates.
///
/// Highest version wins. Ties go to the most recently mutated record, then to
/// the lexicographically smallest participant id, so the choice never depends
/// on store iteration order.
pub fn authority_order(a: &ComponentStateRecord, b: &ComponentStateRecord) -> Ordering {
    a.version
        .cmp(&b.version)
        .then_with(|| a.timestamp.cmp(&b.timestamp))
        .then_with(|| b.participant_id.cmp(&a.participant_id))
}

/// Pick the authoritative record among candidates that share one state
pub fn pick_authoritative(
    candidates: impl IntoIterator<Item = ComponentStateRecord>,
) -> Option<ComponentStateRecord> {
    candidates.into_iter().max_by(authority_order)
}
