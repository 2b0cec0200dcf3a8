use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a step attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    /// The step body reported a business failure.
    Rejected,
    /// The step body returned an error.
    Failed,
    /// The step body panicked.
    Panicked,
    /// The orchestrator stopped waiting for the step body.
    TimedOut,
}

impl fmt::Display for StepErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rejected => "rejected",
            Self::Failed => "failed",
            Self::Panicked => "panicked",
            Self::TimedOut => "timed out",
        };
        f.write_str(name)
    }
}

/// Normalized failure of a step's forward or compensating action.
///
/// Rejections, errors, panics and timeouts all end up in this shape and count
/// identically against a step's retry budget. The `recoverable` hint is
/// carried for callers and persisted, but the engine never consults it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct StepError {
    pub kind: StepErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recoverable: Option<bool>,
}

impl StepError {
    /// A business rejection reported by the step body.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            kind: StepErrorKind::Rejected,
            message: message.into(),
            code: None,
            recoverable: None,
        }
    }

    /// Wraps any displayable error raised while running the step body.
    #[must_use]
    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            kind: StepErrorKind::Failed,
            message: error.to_string(),
            code: None,
            recoverable: None,
        }
    }

    #[must_use]
    pub fn panicked(message: impl Into<String>) -> Self {
        Self {
            kind: StepErrorKind::Panicked,
            message: message.into(),
            code: Some("STEP_PANICKED".to_string()),
            recoverable: None,
        }
    }

    #[must_use]
    pub fn timed_out(step_id: &str, timeout: Duration) -> Self {
        Self {
            kind: StepErrorKind::TimedOut,
            message: format!("step '{step_id}' timed out after {}ms", timeout.as_millis()),
            code: Some("STEP_TIMEOUT".to_string()),
            recoverable: None,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = Some(recoverable);
        self
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind == StepErrorKind::TimedOut
    }
}

/// Terminal error stored on a saga instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorRecord {
    #[must_use]
    pub fn new(message: impl Into<String>, code: Option<String>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Failure to rebuild a runtime instance from its durable record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("saga record '{saga_id}' lists step '{step_id}' more than once in {table}")]
    DuplicateEntry {
        saga_id: String,
        step_id: String,
        table: &'static str,
    },

    #[error("saga record '{saga_id}' has a context for saga '{context_saga_id}'")]
    ContextMismatch {
        saga_id: String,
        context_saga_id: String,
    },
}
