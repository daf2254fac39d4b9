//! Operation Model Runner Tests
//!
//! GOM execution end to end: requirement validation, step classification,
//! snapshot bookkeeping, failure handling, declared rules, conditions and
//! instance management.

use assert_matches::assert_matches;
use coherence_core::effects::{ClockEffects, OperationModelStore};
use coherence_core::{
    CoherenceError, CoherenceState, ConditionPhase, ConsistencyType, GlobalOperationModel,
    GomId, GomInputs, InstanceId, InstanceStatus, OperationKind, RecordKey, RequirementFailure,
    StateTransitionRule,
};
use coherence_testkit::{CoherenceFixture, ScriptedConditions};
use std::sync::Arc;

use CoherenceState::{Invalid, Modified, SharedMinus, SharedPlus};
use ConsistencyType::{BoundedStaleness, Eventual, ReadMyWrites, Strong};

fn checkout() -> GlobalOperationModel {
    GlobalOperationModel::new("checkout", "Checkout")
        .require("p1", "c1", Strong)
        .require("p2", "c1", Eventual)
}

fn gom_id(id: &str) -> GomId {
    GomId::new(id)
}

async fn only_instance(fx: &CoherenceFixture, id: &str) -> coherence_core::GomInstance {
    let instances = fx.models.list_instances(&gom_id(id)).await.unwrap();
    assert_eq!(instances.len(), 1);
    instances.into_iter().next().unwrap()
}

#[tokio::test]
async fn two_participant_run_completes() {
    let fx = CoherenceFixture::new();
    fx.seed("p1", "c1", Modified, Strong, 1).await;
    fx.seed("p2", "c1", SharedPlus, Eventual, 1).await;
    fx.register(checkout()).await;

    let instance = fx
        .runner
        .execute_gom(&gom_id("checkout"), &GomInputs::new())
        .await
        .unwrap();

    assert_eq!(instance.status, InstanceStatus::Completed);
    assert_eq!(instance.snapshots.len(), 2);
    assert_eq!(instance.snapshots[0].participant_id.as_str(), "p1");
    assert_eq!(instance.snapshots[0].state, Modified);
    assert_eq!(instance.snapshots[0].version, 2);
    assert_eq!(instance.snapshots[1].participant_id.as_str(), "p2");
    assert_eq!(instance.snapshots[1].state, SharedMinus);
    assert_eq!(instance.snapshots[1].version, 1);

    assert_eq!(fx.protocol.writes(), 1);
    assert_eq!(fx.protocol.reads(), 1);
    assert_eq!(fx.record("p1", "c1").await.version, 2);
    assert_eq!(fx.record("p2", "c1").await.state, SharedMinus);
    assert_eq!(only_instance(&fx, "checkout").await, instance);
}

#[tokio::test]
async fn contract_mismatch_aborts_before_any_engine_call() {
    let fx = CoherenceFixture::new();
    fx.seed("p1", "c1", Modified, Eventual, 1).await;
    fx.seed("p2", "c1", SharedPlus, Eventual, 1).await;
    fx.register(checkout()).await;

    let err = fx
        .runner
        .execute_gom(&gom_id("checkout"), &GomInputs::new())
        .await
        .unwrap_err();

    assert_matches!(
        &err,
        CoherenceError::RequirementViolation { gom_id, violations }
            if gom_id.as_str() == "checkout" && violations.len() == 1
    );
    assert_eq!(fx.protocol.mutating_calls(), 0);
    assert_eq!(fx.record("p1", "c1").await.version, 1);

    let instance = only_instance(&fx, "checkout").await;
    assert_eq!(instance.status, InstanceStatus::Failed);
    assert!(instance.snapshots.iter().all(|s| s.state == Invalid && s.version == 0));
}

#[tokio::test]
async fn validation_reports_every_failing_requirement() {
    let fx = CoherenceFixture::new();
    fx.seed("p2", "c1", SharedPlus, Strong, 1).await;
    fx.register(checkout()).await;

    let err = fx
        .runner
        .execute_gom(&gom_id("checkout"), &GomInputs::new())
        .await
        .unwrap_err();

    let CoherenceError::RequirementViolation { violations, .. } = &err else {
        panic!("expected requirement violation, got {err:?}");
    };
    assert_eq!(violations.len(), 2);
    assert_matches!(
        &violations[0],
        RequirementFailure::Missing { participant_id, .. } if participant_id.as_str() == "p1"
    );
    assert_matches!(
        &violations[1],
        RequirementFailure::ContractMismatch { declared: Eventual, actual: Strong, .. }
    );
    assert_eq!(fx.protocol.mutating_calls(), 0);
}

#[tokio::test]
async fn unknown_model_is_not_found() {
    let fx = CoherenceFixture::new();

    let err = fx
        .runner
        .execute_gom(&gom_id("ghost"), &GomInputs::new())
        .await
        .unwrap_err();
    assert_matches!(err, CoherenceError::NotFound { .. });

    let err = fx.runner.create_instance(&gom_id("ghost"), "x").await.unwrap_err();
    assert_matches!(err, CoherenceError::NotFound { .. });
}

#[tokio::test]
async fn create_instance_seeds_baseline_snapshots() {
    let fx = CoherenceFixture::new();
    fx.register(checkout()).await;

    let instance = fx
        .runner
        .create_instance(&gom_id("checkout"), "manual")
        .await
        .unwrap();

    assert_eq!(instance.status, InstanceStatus::Running);
    assert_eq!(instance.name, "manual");
    let contracts: Vec<_> = instance.snapshots.iter().map(|s| s.consistency).collect();
    assert_eq!(contracts, vec![Strong, Eventual]);
    assert!(instance.snapshots.iter().all(|s| s.state == Invalid && s.version == 0));
    assert_eq!(fx.protocol.mutating_calls(), 0);
}

#[tokio::test]
async fn steps_are_classified_by_declared_contract() {
    let fx = CoherenceFixture::new();
    let model = GlobalOperationModel::new("mixed", "Mixed")
        .require("a", "c", ReadMyWrites)
        .require("b", "c", BoundedStaleness)
        .require("d", "c", Strong);
    fx.seed("a", "c", SharedMinus, ReadMyWrites, 0).await;
    fx.seed("b", "c", Invalid, BoundedStaleness, 0).await;
    fx.seed("d", "c", Invalid, Strong, 0).await;
    fx.register(model).await;

    let instance = fx
        .runner
        .execute_gom(&gom_id("mixed"), &GomInputs::new())
        .await
        .unwrap();

    assert_eq!(fx.protocol.writes(), 2);
    assert_eq!(fx.protocol.reads(), 1);
    let states: Vec<_> = instance.snapshots.iter().map(|s| s.state).collect();
    // d's write leaves a MODIFIED: read-my-writes only downgrades SHARED_PLUS.
    assert_eq!(states, vec![Modified, SharedMinus, Modified]);
    assert_eq!(fx.record("a", "c").await.state, Modified);
    assert_eq!(fx.record("b", "c").await.version, 1);
}

#[tokio::test]
async fn store_failure_during_validation_marks_instance_failed() {
    let fx = CoherenceFixture::new();
    fx.seed("p1", "c1", Modified, Strong, 1).await;
    fx.seed("p2", "c1", SharedPlus, Eventual, 1).await;
    fx.register(checkout()).await;
    fx.states.poison(RecordKey::new("p2", "c1"));

    let err = fx
        .runner
        .execute_gom(&gom_id("checkout"), &GomInputs::new())
        .await
        .unwrap_err();

    assert!(err.is_transient());
    let instance = only_instance(&fx, "checkout").await;
    assert_eq!(instance.status, InstanceStatus::Failed);
    assert!(instance.updated_at >= instance.created_at);
}

#[tokio::test]
async fn engine_failure_after_validation_keeps_earlier_snapshots() {
    let fx = CoherenceFixture::new();
    fx.seed("p1", "c1", Modified, Strong, 1).await;
    fx.seed("p2", "c1", SharedPlus, Eventual, 1).await;
    fx.register(checkout()).await;
    // Validation passes, then listing sharers during the first write fails.
    fx.states.fail_listings(true);

    let err = fx
        .runner
        .execute_gom(&gom_id("checkout"), &GomInputs::new())
        .await
        .unwrap_err();

    assert_matches!(err, CoherenceError::Store(_));
    let instance = only_instance(&fx, "checkout").await;
    assert_eq!(instance.status, InstanceStatus::Failed);
    assert_eq!(instance.snapshots[0].state, Invalid);
    assert_eq!(fx.record("p1", "c1").await.version, 2);
}

#[tokio::test]
async fn declared_rules_run_after_requirements() {
    let fx = CoherenceFixture::new();
    let model = checkout()
        .with_rule(StateTransitionRule {
            source_participant: "p2".into(),
            component_id: "c1".into(),
            operation: OperationKind::Write,
            target_state: Modified,
            condition: None,
        })
        .with_rule(StateTransitionRule {
            source_participant: "p1".into(),
            component_id: "c1".into(),
            operation: OperationKind::Read,
            target_state: SharedPlus,
            condition: Some("refresh".to_string()),
        });
    fx.seed("p1", "c1", Modified, Strong, 1).await;
    fx.seed("p2", "c1", SharedPlus, Eventual, 1).await;
    fx.register(model).await;

    let instance = fx
        .runner
        .execute_gom(&gom_id("checkout"), &GomInputs::new())
        .await
        .unwrap();

    assert_eq!(instance.status, InstanceStatus::Completed);
    assert_eq!(instance.snapshots.len(), 4);
    assert_eq!(instance.snapshots[2].participant_id.as_str(), "p2");
    assert_eq!(instance.snapshots[2].state, Modified);
    assert_eq!(instance.snapshots[3].participant_id.as_str(), "p1");
    assert_eq!(instance.snapshots[3].state, SharedPlus);
    assert_eq!(instance.snapshots[3].version, 2);
}

#[tokio::test]
async fn false_rule_condition_skips_the_rule() {
    let conditions = Arc::new(ScriptedConditions::new().answer("never", false));
    let fx = CoherenceFixture::with_conditions(conditions.clone());
    let model = checkout().with_rule(StateTransitionRule {
        source_participant: "p2".into(),
        component_id: "c1".into(),
        operation: OperationKind::Write,
        target_state: Modified,
        condition: Some("never".to_string()),
    });
    fx.seed("p1", "c1", Modified, Strong, 1).await;
    fx.seed("p2", "c1", SharedPlus, Eventual, 1).await;
    fx.register(model).await;

    let instance = fx
        .runner
        .execute_gom(&gom_id("checkout"), &GomInputs::new())
        .await
        .unwrap();

    assert_eq!(instance.snapshots.len(), 2);
    assert_eq!(fx.protocol.writes(), 1);
    assert_eq!(conditions.evaluated(), vec!["never".to_string()]);
}

#[tokio::test]
async fn failing_precondition_stops_before_mutation() {
    let conditions = Arc::new(ScriptedConditions::new().answer("stock > 0", false));
    let fx = CoherenceFixture::with_conditions(conditions);
    let mut model = checkout();
    model.preconditions.push("stock > 0".to_string());
    fx.seed("p1", "c1", Modified, Strong, 1).await;
    fx.seed("p2", "c1", SharedPlus, Eventual, 1).await;
    fx.register(model).await;

    let err = fx
        .runner
        .execute_gom(&gom_id("checkout"), &GomInputs::new())
        .await
        .unwrap_err();

    assert_matches!(
        err,
        CoherenceError::ConditionFailed { phase: ConditionPhase::Precondition, .. }
    );
    assert_eq!(fx.protocol.mutating_calls(), 0);
    assert_eq!(only_instance(&fx, "checkout").await.status, InstanceStatus::Failed);
}

#[tokio::test]
async fn failing_postcondition_fails_after_steps() {
    let conditions = Arc::new(ScriptedConditions::new().answer("paid", false));
    let fx = CoherenceFixture::with_conditions(conditions.clone());
    let mut model = checkout();
    model.preconditions.push("open".to_string());
    model.postconditions.push("paid".to_string());
    fx.seed("p1", "c1", Modified, Strong, 1).await;
    fx.seed("p2", "c1", SharedPlus, Eventual, 1).await;
    fx.register(model).await;

    let err = fx
        .runner
        .execute_gom(&gom_id("checkout"), &GomInputs::new())
        .await
        .unwrap_err();

    assert_matches!(
        err,
        CoherenceError::ConditionFailed { phase: ConditionPhase::Postcondition, .. }
    );
    assert_eq!(fx.protocol.mutating_calls(), 2);
    assert_eq!(conditions.evaluated(), vec!["open".to_string(), "paid".to_string()]);
    let instance = only_instance(&fx, "checkout").await;
    assert_eq!(instance.status, InstanceStatus::Failed);
    assert_eq!(instance.snapshots[0].version, 2);
}

#[tokio::test]
async fn instances_can_be_managed() {
    let fx = CoherenceFixture::new();
    fx.register(checkout()).await;
    let mut instance = fx
        .runner
        .create_instance(&gom_id("checkout"), "first")
        .await
        .unwrap();

    fx.clock.advance_secs(5);
    instance.name = "renamed".to_string();
    let updated = fx.runner.update_instance(instance.clone()).await.unwrap();
    assert_eq!(updated.name, "renamed");
    assert_eq!(updated.updated_at, fx.clock.now());

    let details = fx.runner.instance_details(instance.id).await.unwrap();
    assert_eq!(details.gom.name, "Checkout");
    assert_eq!(details.metrics.total_transitions, 2);
    assert_eq!(details.metrics.execution_time_secs, 5);

    assert_eq!(fx.runner.list_instances(&gom_id("checkout")).await.unwrap().len(), 1);
    fx.runner.delete_instance(instance.id).await.unwrap();
    assert_matches!(
        fx.runner.delete_instance(instance.id).await.unwrap_err(),
        CoherenceError::NotFound { .. }
    );
    assert_matches!(
        fx.runner.get_instance(instance.id).await.unwrap_err(),
        CoherenceError::NotFound { .. }
    );
}

#[tokio::test]
async fn finished_instances_cannot_be_reopened() {
    let fx = CoherenceFixture::new();
    fx.seed("p1", "c1", Modified, Strong, 1).await;
    fx.seed("p2", "c1", SharedPlus, Eventual, 1).await;
    fx.register(checkout()).await;
    let done = fx
        .runner
        .execute_gom(&gom_id("checkout"), &GomInputs::new())
        .await
        .unwrap();
    assert_eq!(done.status, InstanceStatus::Completed);

    let mut reopened = done.clone();
    reopened.status = InstanceStatus::Running;
    reopened.snapshots.clear();
    assert_matches!(
        fx.runner.update_instance(reopened).await.unwrap_err(),
        CoherenceError::Invalid { .. }
    );

    let stored = fx.runner.get_instance(done.id).await.unwrap();
    assert_eq!(stored.status, InstanceStatus::Completed);
    assert_eq!(stored.snapshots, done.snapshots);
}

#[tokio::test]
async fn update_keeps_model_and_creation_time() {
    let fx = CoherenceFixture::new();
    fx.register(checkout()).await;
    let created = fx
        .runner
        .create_instance(&gom_id("checkout"), "first")
        .await
        .unwrap();

    fx.clock.advance_secs(3);
    let mut edited = created.clone();
    edited.gom_id = gom_id("other");
    edited.created_at = fx.clock.now();
    let updated = fx.runner.update_instance(edited).await.unwrap();

    assert_eq!(updated.gom_id, created.gom_id);
    assert_eq!(updated.created_at, created.created_at);
    let stored = fx.runner.get_instance(created.id).await.unwrap();
    assert_eq!(stored.gom_id, created.gom_id);
    assert_eq!(stored.created_at, created.created_at);
}

#[tokio::test]
async fn updating_unknown_instance_is_not_found() {
    let fx = CoherenceFixture::new();
    fx.register(checkout()).await;
    let mut instance = fx
        .runner
        .create_instance(&gom_id("checkout"), "x")
        .await
        .unwrap();
    instance.id = InstanceId::new();

    assert_matches!(
        fx.runner.update_instance(instance).await.unwrap_err(),
        CoherenceError::NotFound { .. }
    );
}

#[tokio::test]
async fn register_model_rejects_empty_id() {
    let fx = CoherenceFixture::new();
    let err = fx
        .runner
        .register_model(GlobalOperationModel::new("", "nameless"))
        .await
        .unwrap_err();
    assert_matches!(err, CoherenceError::Invalid { .. });
}
