//! Background Reconciler
//!
//! Two independent sweeps repair what the write path leaves behind:
//! the resync sweep pulls newer versions into SHARED_MINUS records, and the
//! staleness sweep invalidates records whose deadline has passed without a
//! read. Sweeps never fail; per-record errors are logged and counted.

use crate::engine::StateTransitionEngine;
use crate::tasks::BackgroundTasks;
use coherence_core::{CoherenceConfig, CoherenceState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Records visited
    pub examined: usize,
    /// Records whose state or version changed
    pub updated: usize,
    /// Records skipped because of an error
    pub failed: usize,
}

/// Periodic resync and staleness enforcement
pub struct Reconciler {
    engine: Arc<StateTransitionEngine>,
}

impl Reconciler {
    /// Create a reconciler driving `engine`
    pub fn new(engine: Arc<StateTransitionEngine>) -> Self {
        Self { engine }
    }

    /// Pull newer versions into every SHARED_MINUS record
    pub async fn resync_sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let stale = match self.engine.records_in_state(CoherenceState::SharedMinus).await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Resync sweep could not list records");
                return report;
            }
        };

        for record in stale {
            report.examined += 1;
            let key = record.key();
            match self.engine.resync_stale(&key).await {
                Ok(Some(updated)) => {
                    report.updated += 1;
                    debug!(record = %key, version = updated.version, "Resynced stale record");
                }
                Ok(None) => {}
                Err(e) => {
                    report.failed += 1;
                    error!(record = %key, error = %e, "Failed to resync record");
                }
            }
        }

        if report.updated > 0 || report.failed > 0 {
            info!(
                examined = report.examined,
                updated = report.updated,
                failed = report.failed,
                "Resync sweep finished"
            );
        }
        report
    }

    /// Invalidate every record whose staleness deadline has passed
    pub async fn staleness_sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let records = match self.engine.list_component_states().await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Staleness sweep could not list records");
                return report;
            }
        };

        let now = self.engine.clock().now();
        for record in records.into_iter().filter(|r| r.staleness_expired(now)) {
            report.examined += 1;
            let key = record.key();
            match self.engine.expire_if_stale(&key).await {
                Ok(true) => {
                    report.updated += 1;
                    debug!(record = %key, "Staleness bound passed; record invalidated");
                }
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    error!(record = %key, error = %e, "Failed to expire record");
                }
            }
        }

        if report.updated > 0 || report.failed > 0 {
            info!(
                examined = report.examined,
                updated = report.updated,
                failed = report.failed,
                "Staleness sweep finished"
            );
        }
        report
    }

    /// Run both sweeps on their configured periods until `tasks` shuts down
    pub fn spawn(self: &Arc<Self>, tasks: &BackgroundTasks, config: &CoherenceConfig) {
        let reconciler = Arc::clone(self);
        tasks.spawn_interval(config.resync_interval(), move || {
            let reconciler = Arc::clone(&reconciler);
            async move {
                reconciler.resync_sweep().await;
            }
        });

        let reconciler = Arc::clone(self);
        tasks.spawn_interval(config.staleness_sweep_interval(), move || {
            let reconciler = Arc::clone(&reconciler);
            async move {
                reconciler.staleness_sweep().await;
            }
        });
    }
}
