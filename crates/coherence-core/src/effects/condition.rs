//! Condition expression evaluation
//!
//! Operation models carry precondition, postcondition and rule-guard
//! expressions as opaque strings. Their language is not fixed: a runner is
//! handed an evaluator and never interprets the text itself.

use crate::errors::CoherenceResult;
use crate::model::GomInputs;
use async_trait::async_trait;

/// Evaluates a condition expression against a run's inputs
#[async_trait]
pub trait ConditionEvaluator: Send + Sync {
    /// `Ok(true)` when the expression holds
    async fn evaluate(&self, expression: &str, inputs: &GomInputs) -> CoherenceResult<bool>;
}
