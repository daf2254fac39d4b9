//! Failure-injecting and call-recording effect handlers

use async_trait::async_trait;
use coherence_core::effects::{ConditionEvaluator, StateChangeSink, StateStore};
use coherence_core::{
    CoherenceResult, CoherenceState, ComponentId, ComponentStateRecord, GomInputs, ParticipantId,
    RecordId, RecordKey, StateChangeEvent, StoreError,
};
use coherence_effects::MemoryStateStore;
use coherence_engine::CoherenceEffects;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// State store that fails on demand
///
/// Operations on a poisoned key, or any listing while listings are poisoned,
/// return [`StoreError::Unavailable`]. Seeding through [`Self::inner`]
/// bypasses the failures.
#[derive(Clone, Default)]
pub struct FlakyStateStore {
    inner: MemoryStateStore,
    poisoned: Arc<Mutex<HashSet<RecordKey>>>,
    fail_listings: Arc<Mutex<bool>>,
}

impl FlakyStateStore {
    /// Create a store with no failures armed
    pub fn new() -> Self {
        Self::default()
    }

    /// Underlying store, free of injected failures
    pub fn inner(&self) -> &MemoryStateStore {
        &self.inner
    }

    /// Make every operation on `key` fail
    pub fn poison(&self, key: RecordKey) {
        self.poisoned.lock().insert(key);
    }

    /// Clear a poisoned key
    pub fn heal(&self, key: &RecordKey) {
        self.poisoned.lock().remove(key);
    }

    /// Make every listing query fail or succeed
    pub fn fail_listings(&self, fail: bool) {
        *self.fail_listings.lock() = fail;
    }

    fn check_key(&self, key: &RecordKey) -> Result<(), StoreError> {
        if self.poisoned.lock().contains(key) {
            return Err(StoreError::Unavailable(format!("injected failure for {key}")));
        }
        Ok(())
    }

    fn check_listing(&self) -> Result<(), StoreError> {
        if *self.fail_listings.lock() {
            return Err(StoreError::Unavailable("injected listing failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for FlakyStateStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<ComponentStateRecord>, StoreError> {
        self.check_key(key)?;
        self.inner.get(key).await
    }

    async fn upsert(&self, record: ComponentStateRecord) -> Result<(), StoreError> {
        self.check_key(&record.key())?;
        self.inner.upsert(record).await
    }

    async fn delete(&self, id: RecordId) -> Result<bool, StoreError> {
        self.inner.delete(id).await
    }

    async fn find_all(&self) -> Result<Vec<ComponentStateRecord>, StoreError> {
        self.check_listing()?;
        self.inner.find_all().await
    }

    async fn find_by_state(
        &self,
        state: CoherenceState,
    ) -> Result<Vec<ComponentStateRecord>, StoreError> {
        self.check_listing()?;
        self.inner.find_by_state(state).await
    }

    async fn find_by_component_excluding_participant(
        &self,
        component: &ComponentId,
        participant: &ParticipantId,
    ) -> Result<Vec<ComponentStateRecord>, StoreError> {
        self.check_listing()?;
        self.inner
            .find_by_component_excluding_participant(component, participant)
            .await
    }

    async fn find_by_component_and_state(
        &self,
        component: &ComponentId,
        state: CoherenceState,
    ) -> Result<Vec<ComponentStateRecord>, StoreError> {
        self.check_listing()?;
        self.inner.find_by_component_and_state(component, state).await
    }

    async fn find_by_component(
        &self,
        component: &ComponentId,
    ) -> Result<Vec<ComponentStateRecord>, StoreError> {
        self.check_listing()?;
        self.inner.find_by_component(component).await
    }
}

/// Event sink that keeps every event it receives
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<StateChangeEvent>>,
}

impl RecordingSink {
    /// Events received so far, in publish order
    pub fn events(&self) -> Vec<StateChangeEvent> {
        self.events.lock().clone()
    }

    /// Forget received events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl StateChangeSink for RecordingSink {
    fn publish(&self, event: &StateChangeEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Protocol wrapper that counts read and write calls
pub struct CountingProtocol {
    inner: Arc<dyn CoherenceEffects>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingProtocol {
    /// Wrap a protocol implementation
    pub fn new(inner: Arc<dyn CoherenceEffects>) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// `handle_read` calls so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// `handle_write` calls so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Reads plus writes
    pub fn mutating_calls(&self) -> usize {
        self.reads() + self.writes()
    }
}

#[async_trait]
impl CoherenceEffects for CountingProtocol {
    async fn handle_read(
        &self,
        participant: &ParticipantId,
        component: &ComponentId,
    ) -> CoherenceResult<ComponentStateRecord> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.handle_read(participant, component).await
    }

    async fn handle_write(
        &self,
        participant: &ParticipantId,
        component: &ComponentId,
    ) -> CoherenceResult<ComponentStateRecord> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.handle_write(participant, component).await
    }

    async fn component_state(
        &self,
        key: &RecordKey,
    ) -> CoherenceResult<Option<ComponentStateRecord>> {
        self.inner.component_state(key).await
    }
}

/// Condition evaluator with per-expression answers; unknown expressions hold
#[derive(Default)]
pub struct ScriptedConditions {
    answers: Mutex<HashMap<String, bool>>,
    evaluated: Mutex<Vec<String>>,
}

impl ScriptedConditions {
    /// Evaluator where every expression holds
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the answer for one expression
    pub fn answer(self, expression: &str, holds: bool) -> Self {
        self.answers.lock().insert(expression.to_string(), holds);
        self
    }

    /// Expressions evaluated so far, in order
    pub fn evaluated(&self) -> Vec<String> {
        self.evaluated.lock().clone()
    }
}

#[async_trait]
impl ConditionEvaluator for ScriptedConditions {
    async fn evaluate(&self, expression: &str, _inputs: &GomInputs) -> CoherenceResult<bool> {
        self.evaluated.lock().push(expression.to_string());
        Ok(self.answers.lock().get(expression).copied().unwrap_or(true))
    }
}
