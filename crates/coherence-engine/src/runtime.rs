//! Runtime assembly
//!
//! Wires stores, clock, event bus and metrics into an engine, a reconciler
//! and a runner, and starts the background loops. Every handle is explicit;
//! nothing here is process-global.

use crate::engine::StateTransitionEngine;
use crate::metrics::MetricsRecorder;
use crate::notifications::spawn_notification_logger;
use crate::reconciler::Reconciler;
use crate::runner::OperationModelRunner;
use crate::tasks::BackgroundTasks;
use coherence_core::effects::{
    ClockEffects, ConditionEvaluator, OperationModelStore, StateStore,
};
use coherence_core::{CoherenceConfig, CoherenceResult};
use coherence_effects::{
    AcceptAllConditions, EventBus, MemoryOperationModelStore, MemoryStateStore, SystemClock,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Builder for [`CoherenceRuntime`]; unset handles fall back to in-memory defaults
pub struct CoherenceRuntimeBuilder {
    config: CoherenceConfig,
    clock: Option<Arc<dyn ClockEffects>>,
    states: Option<Arc<dyn StateStore>>,
    models: Option<Arc<dyn OperationModelStore>>,
    conditions: Option<Arc<dyn ConditionEvaluator>>,
}

impl CoherenceRuntimeBuilder {
    /// Start from a configuration
    pub fn new(config: CoherenceConfig) -> Self {
        Self {
            config,
            clock: None,
            states: None,
            models: None,
            conditions: None,
        }
    }

    /// Use a specific clock
    pub fn with_clock(mut self, clock: Arc<dyn ClockEffects>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use a specific state store
    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.states = Some(store);
        self
    }

    /// Use a specific operation model store
    pub fn with_model_store(mut self, store: Arc<dyn OperationModelStore>) -> Self {
        self.models = Some(store);
        self
    }

    /// Use a specific condition evaluator
    pub fn with_conditions(mut self, conditions: Arc<dyn ConditionEvaluator>) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Validate the configuration and assemble the runtime
    pub fn build(self) -> CoherenceResult<CoherenceRuntime> {
        self.config.validate()?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let states = self
            .states
            .unwrap_or_else(|| Arc::new(MemoryStateStore::new()));
        let models = self
            .models
            .unwrap_or_else(|| Arc::new(MemoryOperationModelStore::new()));
        let conditions = self
            .conditions
            .unwrap_or_else(|| Arc::new(AcceptAllConditions));

        let events = Arc::new(EventBus::new(self.config.event_buffer));
        let metrics = Arc::new(MetricsRecorder::new(self.config.recent_activity_capacity));
        let engine = Arc::new(StateTransitionEngine::new(
            states,
            Arc::clone(&clock),
            events.clone(),
            Arc::clone(&metrics),
            &self.config,
        )?);
        let reconciler = Arc::new(Reconciler::new(Arc::clone(&engine)));
        let runner = Arc::new(OperationModelRunner::new(
            models,
            engine.clone(),
            conditions,
            clock,
        ));

        Ok(CoherenceRuntime {
            config: self.config,
            events,
            metrics,
            engine,
            reconciler,
            runner,
        })
    }
}

/// Assembled engine, reconciler and runner sharing one metrics recorder
pub struct CoherenceRuntime {
    config: CoherenceConfig,
    events: Arc<EventBus>,
    metrics: Arc<MetricsRecorder>,
    engine: Arc<StateTransitionEngine>,
    reconciler: Arc<Reconciler>,
    runner: Arc<OperationModelRunner>,
}

impl CoherenceRuntime {
    /// In-memory runtime on the system clock
    pub fn in_memory(config: CoherenceConfig) -> CoherenceResult<Self> {
        CoherenceRuntimeBuilder::new(config).build()
    }

    /// Active configuration
    pub fn config(&self) -> &CoherenceConfig {
        &self.config
    }

    /// State-change event bus
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Shared metrics recorder
    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    /// Protocol engine
    pub fn engine(&self) -> &Arc<StateTransitionEngine> {
        &self.engine
    }

    /// Background reconciler
    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Operation model runner
    pub fn runner(&self) -> &Arc<OperationModelRunner> {
        &self.runner
    }

    /// Start the sweeps, the notification logger and the metrics reporter.
    ///
    /// Everything stops when the returned registry is shut down or dropped.
    pub fn start(&self) -> BackgroundTasks {
        let tasks = BackgroundTasks::new();
        self.reconciler.spawn(&tasks, &self.config);
        spawn_notification_logger(&tasks, self.events.subscribe());

        if let Some(period) = self.config.metrics_report_interval() {
            let engine = Arc::clone(&self.engine);
            tasks.spawn_interval(period, move || {
                let engine = Arc::clone(&engine);
                async move {
                    match engine.metrics_report().await {
                        Ok(report) => info!(
                            total_operations = report.total_operations,
                            distribution = ?report.state_distribution,
                            transitions = ?report.transition_counts,
                            "Coherence metrics"
                        ),
                        Err(e) => warn!(error = %e, "Metrics report failed"),
                    }
                }
            });
        }

        info!(
            resync_secs = self.config.resync_interval_secs,
            staleness_secs = self.config.staleness_sweep_interval_secs,
            "Background reconciliation started"
        );
        tasks
    }
}
