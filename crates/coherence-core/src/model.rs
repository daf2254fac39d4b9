//! Global operation models (GOMs) and their tracked runs
//!
//! A GOM declares which participants take part in a cross-participant
//! operation, the contract each must hold on each component, and optional
//! follow-up transition rules. A [`GomInstance`] records one execution.

use crate::identifiers::{ComponentId, GomId, InstanceId, ParticipantId};
use crate::state::{CoherenceState, ComponentStateRecord, ConsistencyType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Caller-supplied inputs for a run, visible to condition evaluation
pub type GomInputs = BTreeMap<String, serde_json::Value>;

/// Kind of engine operation a step performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    /// Local read through the engine
    Read,
    /// Local write through the engine
    Write,
}

impl OperationKind {
    /// Lowercase label used in logs
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Read => "read",
            OperationKind::Write => "write",
        }
    }
}

/// A component a participant must hold under a given contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRequirement {
    /// Required component
    pub component_id: ComponentId,
    /// Contract the participant must have declared for it
    pub consistency: ConsistencyType,
}

/// Everything one participant must hold for the operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRequirement {
    /// Participant taking part
    pub participant_id: ParticipantId,
    /// Required components, in declaration order
    #[serde(default)]
    pub components: Vec<ComponentRequirement>,
}

/// A flattened (participant, component, contract) requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredRequirement {
    /// Participant taking part
    pub participant_id: ParticipantId,
    /// Required component
    pub component_id: ComponentId,
    /// Required contract
    pub consistency: ConsistencyType,
}

/// Declared follow-up transition applied after the requirement steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransitionRule {
    /// Participant performing the operation
    pub source_participant: ParticipantId,
    /// Component operated on
    pub component_id: ComponentId,
    /// Read or write
    pub operation: OperationKind,
    /// State the rule expects the source to end in
    pub target_state: CoherenceState,
    /// Optional guard; absent means always applied
    #[serde(default)]
    pub condition: Option<String>,
}

/// Named, reusable declaration of a cross-participant operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalOperationModel {
    /// Model identity
    pub id: GomId,
    /// Human-readable name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Participant requirements, in declaration order
    #[serde(default)]
    pub requirements: Vec<ParticipantRequirement>,
    /// Ordered follow-up transition rules
    #[serde(default)]
    pub transitions: Vec<StateTransitionRule>,
    /// Expressions that must hold before the first mutation
    #[serde(default)]
    pub preconditions: Vec<String>,
    /// Expressions that must hold after the last step
    #[serde(default)]
    pub postconditions: Vec<String>,
}

impl GlobalOperationModel {
    /// Create an empty model
    pub fn new(id: impl Into<GomId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            requirements: Vec::new(),
            transitions: Vec::new(),
            preconditions: Vec::new(),
            postconditions: Vec::new(),
        }
    }

    /// Add one (participant, component, contract) requirement.
    ///
    /// Requirements for the same participant are grouped under that
    /// participant's first entry, so a run steps through them participant by
    /// participant rather than in call order.
    pub fn require(
        mut self,
        participant_id: impl Into<ParticipantId>,
        component_id: impl Into<ComponentId>,
        consistency: ConsistencyType,
    ) -> Self {
        let participant_id = participant_id.into();
        let component = ComponentRequirement {
            component_id: component_id.into(),
            consistency,
        };
        match self
            .requirements
            .iter_mut()
            .find(|r| r.participant_id == participant_id)
        {
            Some(existing) => existing.components.push(component),
            None => self.requirements.push(ParticipantRequirement {
                participant_id,
                components: vec![component],
            }),
        }
        self
    }

    /// Append a follow-up transition rule
    pub fn with_rule(mut self, rule: StateTransitionRule) -> Self {
        self.transitions.push(rule);
        self
    }

    /// Every requirement flattened in declaration order
    pub fn declared_requirements(&self) -> Vec<DeclaredRequirement> {
        self.requirements
            .iter()
            .flat_map(|participant| {
                participant
                    .components
                    .iter()
                    .map(move |component| DeclaredRequirement {
                        participant_id: participant.participant_id.clone(),
                        component_id: component.component_id.clone(),
                        consistency: component.consistency,
                    })
            })
            .collect()
    }
}

/// Lifecycle of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    /// Steps still executing
    Running,
    /// Every step and postcondition succeeded
    Completed,
    /// A step failed; the error was returned to the caller
    Failed,
}

impl InstanceStatus {
    /// True for `Completed` and `Failed`
    pub fn is_terminal(self) -> bool {
        !matches!(self, InstanceStatus::Running)
    }
}

/// Point-in-time copy of one pair's state captured during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Participant
    pub participant_id: ParticipantId,
    /// Component
    pub component_id: ComponentId,
    /// State at capture time
    pub state: CoherenceState,
    /// Contract at capture time
    pub consistency: ConsistencyType,
    /// Version at capture time
    pub version: u64,
    /// Record timestamp at capture time
    pub timestamp: DateTime<Utc>,
}

impl StateSnapshot {
    /// Baseline snapshot seeded for a requirement before the run starts
    pub fn baseline(requirement: &DeclaredRequirement, now: DateTime<Utc>) -> Self {
        Self {
            participant_id: requirement.participant_id.clone(),
            component_id: requirement.component_id.clone(),
            state: CoherenceState::Invalid,
            consistency: requirement.consistency,
            version: 0,
            timestamp: now,
        }
    }
}

impl From<&ComponentStateRecord> for StateSnapshot {
    fn from(record: &ComponentStateRecord) -> Self {
        Self {
            participant_id: record.participant_id.clone(),
            component_id: record.component_id.clone(),
            state: record.state,
            consistency: record.consistency,
            version: record.version,
            timestamp: record.timestamp,
        }
    }
}

/// One tracked execution of a GOM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GomInstance {
    /// Run identity
    pub id: InstanceId,
    /// Executed model
    pub gom_id: GomId,
    /// Run label
    pub name: String,
    /// Lifecycle status
    pub status: InstanceStatus,
    /// Ordered per-pair snapshots
    pub snapshots: Vec<StateSnapshot>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Refreshed on every persist
    pub updated_at: DateTime<Utc>,
}

/// Model summary embedded in instance details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GomSummary {
    /// Model identity
    pub id: GomId,
    /// Model name
    pub name: String,
    /// Model description
    pub description: String,
}

impl From<&GlobalOperationModel> for GomSummary {
    fn from(gom: &GlobalOperationModel) -> Self {
        Self {
            id: gom.id.clone(),
            name: gom.name.clone(),
            description: gom.description.clone(),
        }
    }
}

/// Execution metrics derived from an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMetrics {
    /// Number of captured snapshots
    pub total_transitions: usize,
    /// Whole seconds between creation and last update
    pub execution_time_secs: i64,
}

impl InstanceMetrics {
    /// Derive metrics from an instance
    pub fn of(instance: &GomInstance) -> Self {
        Self {
            total_transitions: instance.snapshots.len(),
            execution_time_secs: (instance.updated_at - instance.created_at).num_seconds(),
        }
    }
}

/// Instance plus model summary and derived metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDetails {
    /// The run
    pub instance: GomInstance,
    /// The model it executed
    pub gom: GomSummary,
    /// Derived metrics
    pub metrics: InstanceMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn require_groups_steps_by_first_seen_participant() {
        let gom = GlobalOperationModel::new("g", "G")
            .require("p1", "c1", ConsistencyType::Strong)
            .require("p2", "c1", ConsistencyType::Eventual)
            .require("p1", "c2", ConsistencyType::MonotonicReads);

        assert_eq!(gom.requirements.len(), 2);
        let flat: Vec<_> = gom
            .declared_requirements()
            .into_iter()
            .map(|r| (r.participant_id.to_string(), r.component_id.to_string()))
            .collect();
        assert_eq!(
            flat,
            vec![
                ("p1".to_string(), "c1".to_string()),
                ("p1".to_string(), "c2".to_string()),
                ("p2".to_string(), "c1".to_string()),
            ]
        );
    }

    #[test]
    fn instance_metrics_use_whole_seconds() {
        let created = Utc::now();
        let instance = GomInstance {
            id: InstanceId::new(),
            gom_id: "g".into(),
            name: "run".into(),
            status: InstanceStatus::Completed,
            snapshots: vec![],
            created_at: created,
            updated_at: created + Duration::milliseconds(2_500),
        };
        let metrics = InstanceMetrics::of(&instance);
        assert_eq!(metrics.total_transitions, 0);
        assert_eq!(metrics.execution_time_secs, 2);
    }

    #[test]
    fn model_deserializes_with_defaults() {
        let gom: GlobalOperationModel = serde_json::from_value(serde_json::json!({
            "id": "checkout",
            "name": "Checkout",
            "requirements": [
                { "participant_id": "orders",
                  "components": [{ "component_id": "cart", "consistency": "STRONG" }] }
            ]
        }))
        .unwrap();
        assert!(gom.transitions.is_empty());
        assert_eq!(gom.declared_requirements().len(), 1);
    }

    #[test]
    fn only_running_is_non_terminal() {
        assert!(!InstanceStatus::Running.is_terminal());
        assert!(InstanceStatus::Completed.is_terminal());
        assert!(InstanceStatus::Failed.is_terminal());
    }
}
