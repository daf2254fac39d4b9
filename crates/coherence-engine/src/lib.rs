//! # Coherence Engine - Layer 4: Protocol and Orchestration
//!
//! MESI-style coherence generalized to participants with declared
//! consistency contracts:
//! - [`StateTransitionEngine`]: read/write handlers, authoritative-source
//!   resolution, contract-driven downgrades; the only code that mutates a
//!   record's state, version or staleness bound
//! - [`Reconciler`]: periodic resync of stale records and staleness expiry
//! - [`OperationModelRunner`]: executes a declared multi-participant
//!   operation as an ordered series of engine calls and tracks the run
//! - [`MetricsRecorder`]: concurrent transition counters and bounded
//!   activity logs
//!
//! ## Design Principles
//!
//! - **Per-record linearizability**: mutations of one (participant, component)
//!   pair are serialized by a per-record lock
//! - **Non-atomic propagation**: a write downgrades sharers one record at a
//!   time; the background sweeps repair what a partial failure leaves behind
//! - **Explicit handles**: stores, clock, event sink and metrics are passed in,
//!   never reached through globals

#![forbid(unsafe_code)]

pub mod engine;
mod locks;
pub mod metrics;
pub mod notifications;
pub mod reconciler;
pub mod runner;
pub mod runtime;
pub mod tasks;

pub use engine::{CoherenceEffects, StateTransitionEngine};
pub use metrics::{ActivityEntry, ActivityKind, MetricsRecorder, MetricsReport, TransitionRecord};
pub use reconciler::{Reconciler, SweepReport};
pub use runner::OperationModelRunner;
pub use runtime::{CoherenceRuntime, CoherenceRuntimeBuilder};
pub use tasks::BackgroundTasks;
