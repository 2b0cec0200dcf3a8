use async_trait::async_trait;
use sagaflow_core::{SagaContext, StepError};
use serde_json::Value;

/// What a successful step hands back to the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutput {
    /// Merged into the saga output when it is a JSON object, stored under the
    /// step id otherwise.
    pub data: Option<Value>,
}

impl StepOutput {
    /// A successful step that contributes nothing to the saga output.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_data(data: Value) -> Self {
        Self { data: Some(data) }
    }
}

/// The body of a saga step: a forward action and its compensation.
///
/// The engine treats both actions as opaque side effects. Each invocation
/// receives a snapshot of the saga context, so later steps can read what
/// earlier steps contributed.
///
/// Invocations run as detached tasks. When an invocation exceeds its
/// timeout the engine stops waiting for it but does not abort it, so an
/// implementation may still finish its side effect after the saga has moved
/// on.
#[async_trait]
pub trait SagaStep: Send + Sync + 'static {
    /// Run the forward action.
    ///
    /// # Errors
    ///
    /// Returns a [`StepError`] to reject the step; rejections count against
    /// the step's retry budget like any other failure.
    async fn execute(&self, ctx: &SagaContext) -> Result<StepOutput, StepError>;

    /// Undo the forward action's effects.
    ///
    /// Called during rollback, only for steps that completed. The default
    /// implementation is a no-op, suitable for read-only steps.
    ///
    /// # Errors
    ///
    /// Returns an error if compensation fails.
    async fn compensate(&self, ctx: &SagaContext) -> Result<(), StepError> {
        let _ = ctx;
        Ok(())
    }
}
