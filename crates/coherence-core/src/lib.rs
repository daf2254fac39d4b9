//! # Coherence Core - Layer 1: Protocol Vocabulary
//!
//! Foundation types for the consistency-state coordination engine:
//! - Identifiers for participants, components, operation models and runs
//! - Coherence states and consistency contracts, plus the single transition
//!   table that maps (contract, state) to the next state
//! - Operation model (GOM) declarations and run (instance) tracking types
//! - The unified error taxonomy
//! - Effect traits for the external collaborators the engine consumes
//!   (state store, operation model store, clock, condition evaluation,
//!   state-change event sink)
//!
//! Nothing in this crate performs I/O. Handlers live in `coherence-effects`,
//! protocol logic lives in `coherence-engine`.

#![forbid(unsafe_code)]

pub mod config;
pub mod effects;
pub mod errors;
pub mod events;
pub mod identifiers;
pub mod model;
pub mod state;
pub mod transitions;

pub use config::CoherenceConfig;
pub use errors::{
    CoherenceError, CoherenceResult, ConditionPhase, RequirementFailure, StoreError,
};
pub use events::{StateChangeEvent, TransitionCause};
pub use identifiers::{ComponentId, GomId, InstanceId, ParticipantId, RecordId, RecordKey};
pub use model::{
    ComponentRequirement, DeclaredRequirement, GlobalOperationModel, GomInputs, GomInstance,
    GomSummary, InstanceDetails, InstanceMetrics, InstanceStatus, OperationKind,
    ParticipantRequirement, StateSnapshot, StateTransitionRule,
};
pub use state::{CoherenceState, ComponentStateRecord, ConsistencyType};
