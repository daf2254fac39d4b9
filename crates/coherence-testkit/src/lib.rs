//! Coherence Testing Infrastructure
//!
//! Shared setup for engine, reconciler and runner tests: a fully wired
//! fixture on a simulated clock, handlers that inject store failures or
//! count protocol calls, and proptest strategies for the protocol enums.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! ```rust,no_run
//! use coherence_testkit::CoherenceFixture;
//! use coherence_core::{CoherenceState, ConsistencyType};
//!
//! # async fn demo() {
//! let fx = CoherenceFixture::new();
//! fx.seed("orders", "cart", CoherenceState::SharedPlus, ConsistencyType::Strong, 1).await;
//! fx.engine.handle_write(&"billing".into(), &"cart".into()).await.unwrap();
//! assert_eq!(fx.record("orders", "cart").await.state, CoherenceState::Invalid);
//! # }
//! ```

pub mod fixtures;
pub mod mocks;
pub mod strategies;

pub use fixtures::CoherenceFixture;
pub use mocks::{CountingProtocol, FlakyStateStore, RecordingSink, ScriptedConditions};
