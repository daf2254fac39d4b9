//! Fully wired engine, reconciler and runner on a simulated clock

use crate::mocks::{CountingProtocol, FlakyStateStore, RecordingSink};
use chrono::{TimeZone, Utc};
use coherence_core::effects::{ClockEffects, ConditionEvaluator, OperationModelStore, StateStore};
use coherence_core::{
    CoherenceConfig, CoherenceState, ComponentStateRecord, ConsistencyType, GlobalOperationModel,
    RecordKey, StateChangeEvent,
};
use coherence_effects::{AcceptAllConditions, MemoryOperationModelStore, SimulatedClock};
use coherence_engine::{MetricsRecorder, OperationModelRunner, Reconciler, StateTransitionEngine};
use std::sync::Arc;

/// Engine, reconciler and runner sharing in-memory stores.
///
/// The runner goes through a [`CountingProtocol`], so tests can assert how
/// many engine calls a run made. The clock starts at 2024-01-01T00:00:00Z.
pub struct CoherenceFixture {
    /// Manually advanced clock shared by every component
    pub clock: SimulatedClock,
    /// State store with injectable failures
    pub states: FlakyStateStore,
    /// Model and instance store
    pub models: MemoryOperationModelStore,
    /// Every published state change
    pub sink: Arc<RecordingSink>,
    /// Shared metrics
    pub metrics: Arc<MetricsRecorder>,
    /// Protocol engine
    pub engine: Arc<StateTransitionEngine>,
    /// Call-counting view of the engine used by the runner
    pub protocol: Arc<CountingProtocol>,
    /// Background sweeps, invoked directly
    pub reconciler: Reconciler,
    /// Operation model runner
    pub runner: OperationModelRunner,
}

impl CoherenceFixture {
    /// Default configuration, every condition satisfied
    pub fn new() -> Self {
        Self::with_config(CoherenceConfig::default())
    }

    /// Custom configuration, every condition satisfied
    pub fn with_config(config: CoherenceConfig) -> Self {
        Self::build(config, Arc::new(AcceptAllConditions))
    }

    /// Default configuration with a specific condition evaluator
    pub fn with_conditions(conditions: Arc<dyn ConditionEvaluator>) -> Self {
        Self::build(CoherenceConfig::default(), conditions)
    }

    fn build(config: CoherenceConfig, conditions: Arc<dyn ConditionEvaluator>) -> Self {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = SimulatedClock::starting_at(start);
        let states = FlakyStateStore::new();
        let models = MemoryOperationModelStore::new();
        let sink = Arc::new(RecordingSink::default());
        let metrics = Arc::new(MetricsRecorder::new(config.recent_activity_capacity));

        let engine = Arc::new(
            StateTransitionEngine::new(
                Arc::new(states.clone()),
                Arc::new(clock.clone()),
                sink.clone(),
                Arc::clone(&metrics),
                &config,
            )
            .unwrap(),
        );
        let protocol = Arc::new(CountingProtocol::new(engine.clone()));
        let reconciler = Reconciler::new(Arc::clone(&engine));
        let runner = OperationModelRunner::new(
            Arc::new(models.clone()),
            protocol.clone(),
            conditions,
            Arc::new(clock.clone()),
        );

        Self {
            clock,
            states,
            models,
            sink,
            metrics,
            engine,
            protocol,
            reconciler,
            runner,
        }
    }

    /// Insert a record directly, bypassing the engine and injected failures
    pub async fn seed(
        &self,
        participant: &str,
        component: &str,
        state: CoherenceState,
        consistency: ConsistencyType,
        version: u64,
    ) -> ComponentStateRecord {
        let key = RecordKey::new(participant, component);
        let mut record = ComponentStateRecord::unresolved(&key, self.clock.now());
        record.state = state;
        record.consistency = consistency;
        record.version = version;
        self.states.inner().upsert(record.clone()).await.unwrap();
        record
    }

    /// Store a model directly
    pub async fn register(&self, model: GlobalOperationModel) {
        self.models.upsert_model(model).await.unwrap();
    }

    /// Current record for a pair; panics if absent
    pub async fn record(&self, participant: &str, component: &str) -> ComponentStateRecord {
        self.states
            .inner()
            .get(&RecordKey::new(participant, component))
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("no record for {participant}/{component}"))
    }

    /// Every state change published so far
    pub fn events(&self) -> Vec<StateChangeEvent> {
        self.sink.events()
    }
}

impl Default for CoherenceFixture {
    fn default() -> Self {
        Self::new()
    }
}
