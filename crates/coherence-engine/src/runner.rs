//! Operation Model Runner
//!
//! Executes a global operation model (GOM) as an ordered series of engine
//! calls and tracks the run as a [`GomInstance`]. A run validates every
//! declared requirement before touching any record, then drives one read or
//! write per requirement, then applies the model's declared rules.
//!
//! A run that fails at any point is persisted as FAILED before the error is
//! returned; no instance is left RUNNING once `execute_gom` returns.

use crate::engine::CoherenceEffects;
use coherence_core::effects::{ClockEffects, ConditionEvaluator, OperationModelStore};
use coherence_core::transitions::requirement_operation;
use coherence_core::{
    CoherenceError, CoherenceResult, ComponentId, ComponentStateRecord, ConditionPhase,
    DeclaredRequirement, GlobalOperationModel, GomId, GomInputs, GomInstance, GomSummary,
    InstanceDetails, InstanceId, InstanceMetrics, InstanceStatus, OperationKind, ParticipantId,
    RecordKey, RequirementFailure, StateSnapshot,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Drives GOM runs through the coherence protocol
pub struct OperationModelRunner {
    models: Arc<dyn OperationModelStore>,
    protocol: Arc<dyn CoherenceEffects>,
    conditions: Arc<dyn ConditionEvaluator>,
    clock: Arc<dyn ClockEffects>,
}

impl OperationModelRunner {
    /// Create a runner over explicit handles
    pub fn new(
        models: Arc<dyn OperationModelStore>,
        protocol: Arc<dyn CoherenceEffects>,
        conditions: Arc<dyn ConditionEvaluator>,
        clock: Arc<dyn ClockEffects>,
    ) -> Self {
        Self {
            models,
            protocol,
            conditions,
            clock,
        }
    }

    /// Store a model so it can be executed
    pub async fn register_model(&self, model: GlobalOperationModel) -> CoherenceResult<()> {
        if model.id.as_str().is_empty() {
            return Err(CoherenceError::invalid("Operation model id must not be empty"));
        }
        info!(gom = %model.id, requirements = model.declared_requirements().len(), "Registered operation model");
        self.models.upsert_model(model).await?;
        Ok(())
    }

    /// Create a RUNNING instance seeded with one baseline snapshot per requirement
    pub async fn create_instance(&self, gom_id: &GomId, name: &str) -> CoherenceResult<GomInstance> {
        let gom = self.load_model(gom_id).await?;
        let mut instance = self.seed_instance(&gom, name.to_string());
        self.persist(&mut instance).await?;
        Ok(instance)
    }

    /// Execute a model end to end and return the finished instance.
    ///
    /// Fails with `RequirementViolation` before any engine call when a
    /// required record is missing or declares another contract.
    pub async fn execute_gom(
        &self,
        gom_id: &GomId,
        inputs: &GomInputs,
    ) -> CoherenceResult<GomInstance> {
        let gom = self.load_model(gom_id).await?;
        let name = format!("{} @ {}", gom.name, self.clock.now().to_rfc3339());
        let mut instance = self.seed_instance(&gom, name);
        self.persist(&mut instance).await?;
        info!(gom = %gom.id, instance = %instance.id, "Executing operation model");

        let outcome = match self.drive(&gom, &mut instance, inputs).await {
            Ok(()) => {
                instance.status = InstanceStatus::Completed;
                self.persist(&mut instance).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                info!(
                    gom = %gom.id,
                    instance = %instance.id,
                    snapshots = instance.snapshots.len(),
                    "Operation model completed"
                );
                Ok(instance)
            }
            Err(err) => {
                instance.status = InstanceStatus::Failed;
                if let Err(persist_err) = self.persist(&mut instance).await {
                    error!(
                        instance = %instance.id,
                        error = %persist_err,
                        "Failed to persist failed instance"
                    );
                }
                warn!(gom = %gom.id, instance = %instance.id, error = %err, "Operation model failed");
                Err(err)
            }
        }
    }

    /// Every run of a model, oldest first
    pub async fn list_instances(&self, gom_id: &GomId) -> CoherenceResult<Vec<GomInstance>> {
        Ok(self.models.list_instances(gom_id).await?)
    }

    /// One run by id
    pub async fn get_instance(&self, id: InstanceId) -> CoherenceResult<GomInstance> {
        self.models
            .get_instance(id)
            .await?
            .ok_or_else(|| CoherenceError::not_found(format!("Instance not found: {id}")))
    }

    /// Remove a run
    pub async fn delete_instance(&self, id: InstanceId) -> CoherenceResult<()> {
        if !self.models.delete_instance(id).await? {
            return Err(CoherenceError::not_found(format!("Instance not found: {id}")));
        }
        Ok(())
    }

    /// Replace a stored run; `updated_at` is refreshed.
    ///
    /// A COMPLETED or FAILED run cannot be changed. The stored `gom_id` and
    /// `created_at` are kept whatever the caller passes.
    pub async fn update_instance(&self, mut instance: GomInstance) -> CoherenceResult<GomInstance> {
        let stored = self.get_instance(instance.id).await?;
        if stored.status.is_terminal() {
            return Err(CoherenceError::invalid(format!(
                "Instance {} is {:?} and can no longer be updated",
                stored.id, stored.status
            )));
        }
        instance.gom_id = stored.gom_id;
        instance.created_at = stored.created_at;
        self.persist(&mut instance).await?;
        Ok(instance)
    }

    /// A run with its model summary and derived metrics
    pub async fn instance_details(&self, id: InstanceId) -> CoherenceResult<InstanceDetails> {
        let instance = self.get_instance(id).await?;
        let gom = self.load_model(&instance.gom_id).await?;
        Ok(InstanceDetails {
            metrics: InstanceMetrics::of(&instance),
            gom: GomSummary::from(&gom),
            instance,
        })
    }

    async fn drive(
        &self,
        gom: &GlobalOperationModel,
        instance: &mut GomInstance,
        inputs: &GomInputs,
    ) -> CoherenceResult<()> {
        let requirements = gom.declared_requirements();
        self.validate(gom, &requirements).await?;
        self.check_conditions(ConditionPhase::Precondition, &gom.preconditions, inputs)
            .await?;

        for (slot, requirement) in requirements.iter().enumerate() {
            let operation = requirement_operation(requirement.consistency);
            let record = self
                .apply(
                    operation,
                    &requirement.participant_id,
                    &requirement.component_id,
                )
                .await?;
            let snapshot = StateSnapshot::from(&record);
            match instance.snapshots.get_mut(slot) {
                Some(baseline) => *baseline = snapshot,
                None => instance.snapshots.push(snapshot),
            }
            self.persist(instance).await?;
        }

        for rule in &gom.transitions {
            if let Some(condition) = &rule.condition {
                if !self.conditions.evaluate(condition, inputs).await? {
                    debug!(gom = %gom.id, condition = %condition, "Rule condition false; skipped");
                    continue;
                }
            }
            let record = self
                .apply(rule.operation, &rule.source_participant, &rule.component_id)
                .await?;
            if record.state != rule.target_state {
                warn!(
                    gom = %gom.id,
                    record = %record.key(),
                    expected = %rule.target_state,
                    observed = %record.state,
                    "Rule ended in a different state than declared"
                );
            }
            instance.snapshots.push(StateSnapshot::from(&record));
            self.persist(instance).await?;
        }

        self.check_conditions(ConditionPhase::Postcondition, &gom.postconditions, inputs)
            .await
    }

    async fn validate(
        &self,
        gom: &GlobalOperationModel,
        requirements: &[DeclaredRequirement],
    ) -> CoherenceResult<()> {
        let mut violations = Vec::new();
        for requirement in requirements {
            let key = RecordKey::new(
                requirement.participant_id.clone(),
                requirement.component_id.clone(),
            );
            match self.protocol.component_state(&key).await? {
                None => violations.push(RequirementFailure::Missing {
                    participant_id: requirement.participant_id.clone(),
                    component_id: requirement.component_id.clone(),
                }),
                Some(record) if record.consistency != requirement.consistency => {
                    violations.push(RequirementFailure::ContractMismatch {
                        participant_id: requirement.participant_id.clone(),
                        component_id: requirement.component_id.clone(),
                        declared: requirement.consistency,
                        actual: record.consistency,
                    });
                }
                Some(_) => {}
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(CoherenceError::RequirementViolation {
                gom_id: gom.id.clone(),
                violations,
            })
        }
    }

    async fn check_conditions(
        &self,
        phase: ConditionPhase,
        expressions: &[String],
        inputs: &GomInputs,
    ) -> CoherenceResult<()> {
        for expression in expressions {
            if !self.conditions.evaluate(expression, inputs).await? {
                return Err(CoherenceError::ConditionFailed {
                    phase,
                    expression: expression.clone(),
                });
            }
        }
        Ok(())
    }

    async fn apply(
        &self,
        operation: OperationKind,
        participant: &ParticipantId,
        component: &ComponentId,
    ) -> CoherenceResult<ComponentStateRecord> {
        debug!(
            participant = %participant,
            component = %component,
            operation = operation.as_str(),
            "Running step"
        );
        match operation {
            OperationKind::Write => self.protocol.handle_write(participant, component).await,
            OperationKind::Read => self.protocol.handle_read(participant, component).await,
        }
    }

    async fn load_model(&self, gom_id: &GomId) -> CoherenceResult<GlobalOperationModel> {
        self.models
            .get_model(gom_id)
            .await?
            .ok_or_else(|| CoherenceError::not_found(format!("Operation model not found: {gom_id}")))
    }

    fn seed_instance(&self, gom: &GlobalOperationModel, name: String) -> GomInstance {
        let now = self.clock.now();
        GomInstance {
            id: InstanceId::new(),
            gom_id: gom.id.clone(),
            name,
            status: InstanceStatus::Running,
            snapshots: gom
                .declared_requirements()
                .iter()
                .map(|requirement| StateSnapshot::baseline(requirement, now))
                .collect(),
            created_at: now,
            updated_at: now,
        }
    }

    async fn persist(&self, instance: &mut GomInstance) -> CoherenceResult<()> {
        instance.updated_at = self.clock.now();
        self.models.upsert_instance(instance.clone()).await?;
        Ok(())
    }
}
