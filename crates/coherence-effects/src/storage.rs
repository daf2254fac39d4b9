//! In-memory storage handlers
//!
//! Records are held in a map keyed by (participant, component), which gives
//! the one-record-per-pair invariant for free. Query results are returned in
//! key order so callers see a deterministic sequence.

use async_trait::async_trait;
use coherence_core::effects::{OperationModelStore, StateStore};
use coherence_core::{
    CoherenceState, ComponentId, ComponentStateRecord, GlobalOperationModel, GomId, GomInstance,
    InstanceId, ParticipantId, RecordId, RecordKey, StoreError,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory component-state table
#[derive(Clone, Default)]
pub struct MemoryStateStore {
    records: Arc<RwLock<BTreeMap<RecordKey, ComponentStateRecord>>>,
}

impl MemoryStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// True when no records are stored
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn select(
        &self,
        predicate: impl Fn(&ComponentStateRecord) -> bool + Send,
    ) -> Vec<ComponentStateRecord> {
        let records = self.records.read().await;
        records
            .values()
            .filter(|record| predicate(record))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<ComponentStateRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(key).cloned())
    }

    async fn upsert(&self, record: ComponentStateRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        records.insert(record.key(), record);
        Ok(())
    }

    async fn delete(&self, id: RecordId) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.id != id);
        Ok(records.len() != before)
    }

    async fn find_all(&self) -> Result<Vec<ComponentStateRecord>, StoreError> {
        Ok(self.select(|_| true).await)
    }

    async fn find_by_state(
        &self,
        state: CoherenceState,
    ) -> Result<Vec<ComponentStateRecord>, StoreError> {
        Ok(self.select(|record| record.state == state).await)
    }

    async fn find_by_component_excluding_participant(
        &self,
        component: &ComponentId,
        participant: &ParticipantId,
    ) -> Result<Vec<ComponentStateRecord>, StoreError> {
        Ok(self
            .select(|record| {
                &record.component_id == component && &record.participant_id != participant
            })
            .await)
    }

    async fn find_by_component_and_state(
        &self,
        component: &ComponentId,
        state: CoherenceState,
    ) -> Result<Vec<ComponentStateRecord>, StoreError> {
        Ok(self
            .select(|record| &record.component_id == component && record.state == state)
            .await)
    }

    async fn find_by_component(
        &self,
        component: &ComponentId,
    ) -> Result<Vec<ComponentStateRecord>, StoreError> {
        Ok(self.select(|record| &record.component_id == component).await)
    }
}

/// In-memory operation model and run store
#[derive(Clone, Default)]
pub struct MemoryOperationModelStore {
    models: Arc<RwLock<BTreeMap<GomId, GlobalOperationModel>>>,
    instances: Arc<RwLock<HashMap<InstanceId, GomInstance>>>,
}

impl MemoryOperationModelStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored model, ordered by id
    pub async fn models(&self) -> Vec<GlobalOperationModel> {
        self.models.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl OperationModelStore for MemoryOperationModelStore {
    async fn get_model(&self, id: &GomId) -> Result<Option<GlobalOperationModel>, StoreError> {
        Ok(self.models.read().await.get(id).cloned())
    }

    async fn upsert_model(&self, model: GlobalOperationModel) -> Result<(), StoreError> {
        self.models.write().await.insert(model.id.clone(), model);
        Ok(())
    }

    async fn list_instances(&self, gom_id: &GomId) -> Result<Vec<GomInstance>, StoreError> {
        let instances = self.instances.read().await;
        let mut result: Vec<_> = instances
            .values()
            .filter(|instance| &instance.gom_id == gom_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(result)
    }

    async fn get_instance(&self, id: InstanceId) -> Result<Option<GomInstance>, StoreError> {
        Ok(self.instances.read().await.get(&id).cloned())
    }

    async fn upsert_instance(&self, instance: GomInstance) -> Result<(), StoreError> {
        self.instances.write().await.insert(instance.id, instance);
        Ok(())
    }

    async fn delete_instance(&self, id: InstanceId) -> Result<bool, StoreError> {
        Ok(self.instances.write().await.remove(&id).is_some())
    }
}
