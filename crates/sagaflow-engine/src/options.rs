use std::time::Duration;

use sagaflow_core::JsonMap;

/// Options for [`SagaEngine::execute_saga`](crate::SagaEngine::execute_saga).
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Roll back completed steps when the saga fails. Defaults to `true`.
    pub auto_compensate: bool,
    /// Correlation id to thread through; a fresh one is generated if `None`.
    pub correlation_id: Option<String>,
    /// Free-form metadata stored with the saga and searched by history
    /// queries.
    pub metadata: Option<JsonMap>,
    /// Step timeout used when a step declares none.
    pub timeout: Option<Duration>,
    /// Keep going after a non-critical step fails.
    pub continue_on_non_critical_failure: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            auto_compensate: true,
            correlation_id: None,
            metadata: None,
            timeout: None,
            continue_on_non_critical_failure: false,
        }
    }
}

impl ExecuteOptions {
    #[must_use]
    pub fn with_metadata(mut self, metadata: JsonMap) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Options for [`SagaEngine::compensate_saga`](crate::SagaEngine::compensate_saga).
#[derive(Debug, Clone)]
pub struct CompensateOptions {
    /// Steps to undo; all completed steps when `None`.
    pub steps: Option<Vec<String>>,
    /// Undo in reverse order of the selected list. Defaults to `true`.
    pub reverse_order: bool,
    /// Abort at the first compensation failure instead of continuing.
    pub stop_on_failure: bool,
    /// Compensation timeout used when a step declares none.
    pub timeout: Option<Duration>,
}

impl Default for CompensateOptions {
    fn default() -> Self {
        Self {
            steps: None,
            reverse_order: true,
            stop_on_failure: false,
            timeout: None,
        }
    }
}
