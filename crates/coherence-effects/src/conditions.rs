//! Condition evaluator handlers

use async_trait::async_trait;
use coherence_core::effects::ConditionEvaluator;
use coherence_core::{CoherenceResult, GomInputs};

/// Treats every expression as satisfied
///
/// The default evaluator until an expression language is plugged in.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllConditions;

#[async_trait]
impl ConditionEvaluator for AcceptAllConditions {
    async fn evaluate(&self, expression: &str, _inputs: &GomInputs) -> CoherenceResult<bool> {
        tracing::trace!(expression, "condition accepted without evaluation");
        Ok(true)
    }
}
