//! Storage effects
//!
//! Keyed access to persisted component-state records and to operation
//! models and their runs. Every call may block on I/O and reports failures
//! as [`StoreError`]; none of them interpret protocol semantics.

use crate::errors::StoreError;
use crate::identifiers::{ComponentId, GomId, InstanceId, ParticipantId, RecordId, RecordKey};
use crate::model::{GlobalOperationModel, GomInstance};
use crate::state::{CoherenceState, ComponentStateRecord};
use async_trait::async_trait;

/// Table of per-(participant, component) state records
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch the record for a pair
    async fn get(&self, key: &RecordKey) -> Result<Option<ComponentStateRecord>, StoreError>;

    /// Insert or replace the record for its pair
    async fn upsert(&self, record: ComponentStateRecord) -> Result<(), StoreError>;

    /// Remove a record by identity; `false` when it did not exist
    async fn delete(&self, id: RecordId) -> Result<bool, StoreError>;

    /// Every record
    async fn find_all(&self) -> Result<Vec<ComponentStateRecord>, StoreError>;

    /// Records currently in `state`
    async fn find_by_state(
        &self,
        state: CoherenceState,
    ) -> Result<Vec<ComponentStateRecord>, StoreError>;

    /// Records for `component` held by anyone but `participant`
    async fn find_by_component_excluding_participant(
        &self,
        component: &ComponentId,
        participant: &ParticipantId,
    ) -> Result<Vec<ComponentStateRecord>, StoreError>;

    /// Records for `component` currently in `state`
    async fn find_by_component_and_state(
        &self,
        component: &ComponentId,
        state: CoherenceState,
    ) -> Result<Vec<ComponentStateRecord>, StoreError>;

    /// Every record for `component`
    async fn find_by_component(
        &self,
        component: &ComponentId,
    ) -> Result<Vec<ComponentStateRecord>, StoreError> {
        Ok(self
            .find_all()
            .await?
            .into_iter()
            .filter(|record| &record.component_id == component)
            .collect())
    }
}

/// Operation model definitions and their runs
#[async_trait]
pub trait OperationModelStore: Send + Sync {
    /// Fetch a model
    async fn get_model(&self, id: &GomId) -> Result<Option<GlobalOperationModel>, StoreError>;

    /// Insert or replace a model
    async fn upsert_model(&self, model: GlobalOperationModel) -> Result<(), StoreError>;

    /// Every run of a model, oldest first
    async fn list_instances(&self, gom_id: &GomId) -> Result<Vec<GomInstance>, StoreError>;

    /// Fetch a run
    async fn get_instance(&self, id: InstanceId) -> Result<Option<GomInstance>, StoreError>;

    /// Insert or replace a run
    async fn upsert_instance(&self, instance: GomInstance) -> Result<(), StoreError>;

    /// Remove a run; `false` when it did not exist
    async fn delete_instance(&self, id: InstanceId) -> Result<bool, StoreError>;
}
