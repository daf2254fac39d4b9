//! Proptest strategies for protocol values

use coherence_core::{CoherenceState, ConsistencyType};
use proptest::prelude::*;

/// Any coherence state
pub fn any_state() -> impl Strategy<Value = CoherenceState> {
    prop::sample::select(CoherenceState::ALL.to_vec())
}

/// Any consistency contract
pub fn any_contract() -> impl Strategy<Value = ConsistencyType> {
    prop::sample::select(ConsistencyType::ALL.to_vec())
}

/// A sharer: (state, contract, version)
pub fn any_sharer() -> impl Strategy<Value = (CoherenceState, ConsistencyType, u64)> {
    (any_state(), any_contract(), 0u64..20)
}

/// A short sequence of (participant index, is_write) operations on one component
pub fn operation_sequence(
    participants: usize,
    max_len: usize,
) -> impl Strategy<Value = Vec<(usize, bool)>> {
    prop::collection::vec((0..participants, any::<bool>()), 1..max_len)
}
