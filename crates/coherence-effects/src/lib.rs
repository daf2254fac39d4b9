//! # Coherence Effects - Layer 3: Effect Handlers
//!
//! Handlers for the effect traits declared in `coherence-core`:
//! - [`MemoryStateStore`] / [`MemoryOperationModelStore`]: in-process stores
//! - [`SystemClock`]: wall-clock time; [`SimulatedClock`]: manually advanced time
//! - [`AcceptAllConditions`]: condition evaluator that treats every expression as satisfied
//! - [`EventBus`]: broadcast fan-out of state-change events

#![forbid(unsafe_code)]

pub mod conditions;
pub mod event_bus;
pub mod storage;
pub mod time;

pub use conditions::AcceptAllConditions;
pub use event_bus::EventBus;
pub use storage::{MemoryOperationModelStore, MemoryStateStore};
pub use time::{SimulatedClock, SystemClock};
