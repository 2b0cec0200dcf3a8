use std::error::Error as _;
use std::time::Duration;

use sagaflow_core::{ErrorRecord, RecordError, StepError};
use sagaflow_store::StoreError;
use thiserror::Error;

use crate::definition::SagaPattern;

/// A saga definition rejected at registration.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum DefinitionError {
    #[error("saga '{workflow_type}' has no steps")]
    EmptySteps { workflow_type: String },

    #[error("saga '{workflow_type}' declares step '{step_id}' more than once")]
    DuplicateStepId {
        workflow_type: String,
        step_id: String,
    },

    #[error("step '{step_id}' of saga '{workflow_type}' depends on unknown step '{dependency}'")]
    UnknownDependency {
        workflow_type: String,
        step_id: String,
        dependency: String,
    },

    #[error("saga '{workflow_type}' marks unknown step '{step_id}' as critical")]
    UnknownCriticalStep {
        workflow_type: String,
        step_id: String,
    },
}

/// Error from saga execution, compensation or lookup.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SagaError {
    #[error("no saga definition registered for workflow type '{0}'")]
    UnknownWorkflow(String),

    #[error("workflow type '{workflow_type}' uses the {pattern} pattern, which cannot be executed")]
    UnsupportedPattern {
        workflow_type: String,
        pattern: SagaPattern,
    },

    #[error("saga '{saga_id}' not found")]
    NotFound { saga_id: String },

    /// A step exhausted its attempts and the saga aborted.
    #[error("step '{step_id}' of saga '{saga_id}' failed")]
    StepFailed {
        saga_id: String,
        step_id: String,
        #[source]
        source: StepError,
    },

    #[error("step '{step_id}' of saga '{saga_id}' requires step '{dependency}' to be completed")]
    DependencyNotSatisfied {
        saga_id: String,
        step_id: String,
        dependency: String,
    },

    #[error(
        "compensation of step '{step_id}' in saga '{saga_id}' timed out after {}ms",
        timeout.as_millis()
    )]
    CompensationTimeout {
        saga_id: String,
        step_id: String,
        timeout: Duration,
    },

    #[error("compensation of step '{step_id}' in saga '{saga_id}' failed")]
    CompensationFailed {
        saga_id: String,
        step_id: String,
        #[source]
        source: StepError,
    },

    #[error("failed to persist saga '{saga_id}'")]
    Persistence {
        saga_id: String,
        #[source]
        source: StoreError,
    },

    #[error("saga store error")]
    Store(#[from] StoreError),

    #[error("stored saga could not be rehydrated")]
    Record(#[from] RecordError),
}

impl SagaError {
    /// The saga this error belongs to, when it is tied to one.
    #[must_use]
    pub fn saga_id(&self) -> Option<&str> {
        match self {
            Self::NotFound { saga_id }
            | Self::StepFailed { saga_id, .. }
            | Self::DependencyNotSatisfied { saga_id, .. }
            | Self::CompensationTimeout { saga_id, .. }
            | Self::CompensationFailed { saga_id, .. }
            | Self::Persistence { saga_id, .. } => Some(saga_id),
            Self::UnknownWorkflow(_)
            | Self::UnsupportedPattern { .. }
            | Self::Store(_)
            | Self::Record(_) => None,
        }
    }

    /// Stable machine-readable code, stored with the saga's terminal error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownWorkflow(_) => "UNKNOWN_WORKFLOW",
            Self::UnsupportedPattern { .. } => "UNSUPPORTED_PATTERN",
            Self::NotFound { .. } => "SAGA_NOT_FOUND",
            Self::StepFailed { .. } => "STEP_FAILED",
            Self::DependencyNotSatisfied { .. } => "DEPENDENCY_NOT_SATISFIED",
            Self::CompensationTimeout { .. } => "COMPENSATION_TIMEOUT",
            Self::CompensationFailed { .. } => "COMPENSATION_FAILED",
            Self::Persistence { .. } | Self::Store(_) => "STORE_ERROR",
            Self::Record(_) => "RECORD_ERROR",
        }
    }

    /// The step error behind a step or compensation failure.
    #[must_use]
    pub fn step_error(&self) -> Option<&StepError> {
        match self {
            Self::StepFailed { source, .. } | Self::CompensationFailed { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::CompensationTimeout { .. })
            || self.step_error().is_some_and(StepError::is_timeout)
    }

    pub(crate) fn to_record(&self) -> ErrorRecord {
        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        ErrorRecord::new(message, Some(self.code().to_string()))
    }
}

/// Failure to load engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse engine configuration")]
    Parse(#[from] toml::de::Error),

    #[error("invalid engine configuration: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_dependency_names_step_and_dependency() {
        let err = DefinitionError::UnknownDependency {
            workflow_type: "issue.execute".to_string(),
            step_id: "launch_agent".to_string(),
            dependency: "create_worktree".to_string(),
        };

        let msg = err.to_string();

        assert!(msg.contains("launch_agent"));
        assert!(msg.contains("create_worktree"));
    }

    #[test]
    fn step_failed_record_includes_cause_and_code() {
        let err = SagaError::StepFailed {
            saga_id: "saga-1".to_string(),
            step_id: "open_pr".to_string(),
            source: StepError::rejected("forge returned 502"),
        };

        let record = err.to_record();

        assert_eq!(record.code.as_deref(), Some("STEP_FAILED"));
        assert!(record.message.contains("open_pr"));
        assert!(record.message.ends_with("forge returned 502"));
        assert_eq!(err.saga_id(), Some("saga-1"));
    }

    #[test]
    fn compensation_timeout_is_a_timeout() {
        let err = SagaError::CompensationTimeout {
            saga_id: "saga-1".to_string(),
            step_id: "remove_worktree".to_string(),
            timeout: Duration::from_millis(100),
        };

        assert!(err.is_timeout());
        assert!(err.to_string().contains("100ms"));
        assert_eq!(err.code(), "COMPENSATION_TIMEOUT");
    }

    #[test]
    fn timed_out_step_failure_is_a_timeout() {
        let err = SagaError::StepFailed {
            saga_id: "saga-1".to_string(),
            step_id: "launch".to_string(),
            source: StepError::timed_out("launch", Duration::from_secs(1)),
        };

        assert!(err.is_timeout());
    }

    #[test]
    fn lookup_errors_have_no_saga_id() {
        let err = SagaError::UnknownWorkflow("missing".to_string());

        assert!(err.saga_id().is_none());
        assert!(err.to_string().contains("missing"));
    }
}
