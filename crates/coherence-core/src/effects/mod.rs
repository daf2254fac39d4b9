//! Effect traits for the collaborators the engine consumes
//!
//! # Effect Classification
//!
//! - **Storage**: [`StateStore`], [`OperationModelStore`]: the only blocking
//!   points of the engine, reconciler and runner
//! - **Time**: [`ClockEffects`]: injected so staleness is testable
//! - **Extension points**: [`ConditionEvaluator`] for pre/postcondition and
//!   rule expressions, [`StateChangeSink`] for event fan-out
//!
//! Production handlers live in `coherence-effects`.

pub mod condition;
pub mod events;
pub mod store;
pub mod time;

pub use condition::ConditionEvaluator;
pub use events::StateChangeSink;
pub use store::{OperationModelStore, StateStore};
pub use time::ClockEffects;
