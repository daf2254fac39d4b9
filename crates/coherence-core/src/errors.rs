//! Unified error system for the coherence engine
//!
//! One error type crosses every crate boundary. Store failures keep their own
//! enum so the reconciler can tell transient I/O apart from protocol errors.

use crate::identifiers::{ComponentId, GomId, ParticipantId};
use crate::state::ConsistencyType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure reported by a state or operation model store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum StoreError {
    /// Backend temporarily unreachable; the caller may retry
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Concurrent modification detected by the backend
    #[error("Store conflict: {0}")]
    Conflict(String),

    /// Any other backend failure
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Which condition list a failed expression came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionPhase {
    /// Checked before the first mutation of a run
    Precondition,
    /// Checked after the last step of a run
    Postcondition,
}

impl fmt::Display for ConditionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionPhase::Precondition => f.write_str("precondition"),
            ConditionPhase::Postcondition => f.write_str("postcondition"),
        }
    }
}

/// One declared requirement that the live state does not satisfy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequirementFailure {
    /// No record exists for the pair
    Missing {
        /// Required participant
        participant_id: ParticipantId,
        /// Required component
        component_id: ComponentId,
    },
    /// A record exists but declares a different contract
    ContractMismatch {
        /// Required participant
        participant_id: ParticipantId,
        /// Required component
        component_id: ComponentId,
        /// Contract the operation model requires
        declared: ConsistencyType,
        /// Contract the live record carries
        actual: ConsistencyType,
    },
}

impl fmt::Display for RequirementFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementFailure::Missing {
                participant_id,
                component_id,
            } => write!(f, "{participant_id}/{component_id}: no state record"),
            RequirementFailure::ContractMismatch {
                participant_id,
                component_id,
                declared,
                actual,
            } => write!(
                f,
                "{participant_id}/{component_id}: requires {declared}, found {actual}"
            ),
        }
    }
}

/// Unified error type for all coherence operations
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum CoherenceError {
    /// Referenced operation model, instance or record does not exist
    #[error("Not found: {message}")]
    NotFound {
        /// What was not found
        message: String,
    },

    /// An operation model's declared contracts do not match live state
    #[error("Requirement violation in {gom_id}: {}", join_failures(.violations))]
    RequirementViolation {
        /// Operation model being executed
        gom_id: GomId,
        /// Every failing requirement, in declaration order
        violations: Vec<RequirementFailure>,
    },

    /// State store I/O failed; the mutation did not complete
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A pre- or postcondition evaluated to false
    #[error("{phase} not satisfied: {expression}")]
    ConditionFailed {
        /// Where the condition was declared
        phase: ConditionPhase,
        /// The expression text
        expression: String,
    },

    /// The condition evaluator could not evaluate an expression
    #[error("Condition evaluation failed for `{expression}`: {reason}")]
    Condition {
        /// The expression text
        expression: String,
        /// Evaluator diagnostic
        reason: String,
    },

    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// What was invalid
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Diagnostic message
        message: String,
    },
}

fn join_failures(violations: &[RequirementFailure]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl CoherenceError {
    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            CoherenceError::NotFound { .. } => "not_found",
            CoherenceError::RequirementViolation { .. } => "requirement_violation",
            CoherenceError::Store(StoreError::Unavailable(_)) => "store_unavailable",
            CoherenceError::Store(StoreError::Conflict(_)) => "store_conflict",
            CoherenceError::Store(StoreError::Backend(_)) => "store_backend",
            CoherenceError::ConditionFailed { .. } => "condition_failed",
            CoherenceError::Condition { .. } => "condition_error",
            CoherenceError::Invalid { .. } => "invalid",
            CoherenceError::Internal { .. } => "internal",
        }
    }

    /// True when retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, CoherenceError::Store(StoreError::Unavailable(_)))
    }
}

/// Standard Result type for coherence operations
pub type CoherenceResult<T> = std::result::Result<T, CoherenceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashSet;

    fn every_error() -> Vec<CoherenceError> {
        vec![
            CoherenceError::not_found("gom"),
            CoherenceError::RequirementViolation {
                gom_id: GomId::new("g"),
                violations: vec![],
            },
            StoreError::Unavailable("down".into()).into(),
            StoreError::Conflict("race".into()).into(),
            StoreError::Backend("disk".into()).into(),
            CoherenceError::ConditionFailed {
                phase: ConditionPhase::Precondition,
                expression: "x".into(),
            },
            CoherenceError::Condition {
                expression: "x".into(),
                reason: "syntax".into(),
            },
            CoherenceError::invalid("bad"),
            CoherenceError::internal("bug"),
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = every_error();
        let codes: HashSet<_> = errors.iter().map(CoherenceError::code).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn only_unavailable_store_is_transient() {
        let transient: Vec<_> = every_error()
            .into_iter()
            .filter(CoherenceError::is_transient)
            .collect();
        assert_eq!(transient.len(), 1);
        assert_matches!(transient[0], CoherenceError::Store(StoreError::Unavailable(_)));
    }

    #[test]
    fn requirement_violation_lists_every_failure() {
        let err = CoherenceError::RequirementViolation {
            gom_id: GomId::new("checkout"),
            violations: vec![
                RequirementFailure::Missing {
                    participant_id: "a".into(),
                    component_id: "cart".into(),
                },
                RequirementFailure::ContractMismatch {
                    participant_id: "b".into(),
                    component_id: "cart".into(),
                    declared: ConsistencyType::Strong,
                    actual: ConsistencyType::Eventual,
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Requirement violation in checkout: a/cart: no state record; \
             b/cart: requires STRONG, found EVENTUAL"
        );
    }
}
