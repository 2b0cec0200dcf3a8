use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a saga instance.
///
/// `Pending → Running → {Completed, Failed}`, then `Failed → Compensating →
/// Compensated`. A `Completed` saga may also be compensated on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    /// Created and persisted, no step has run yet.
    #[default]
    Pending,
    /// Steps are being executed.
    Running,
    /// Every step was processed without an aborting failure.
    Completed,
    /// A step failure aborted the saga.
    Failed,
    /// Completed steps are being rolled back.
    Compensating,
    /// Rollback finished.
    Compensated,
}

impl SagaStatus {
    /// Returns `true` for states that need no further work unless a manual
    /// compensation is requested.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Compensated)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Compensating => "COMPENSATING",
            Self::Compensated => "COMPENSATED",
        }
    }
}

impl fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single step within a saga instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    /// Not started yet.
    #[default]
    Pending,
    /// An attempt is in flight.
    Running,
    /// The forward action succeeded.
    Completed,
    /// The forward action (or its compensation) failed.
    Failed,
    /// The compensating action is in flight.
    Compensating,
    /// The compensating action succeeded.
    Compensated,
}

impl StepStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Compensating => "COMPENSATING",
            Self::Compensated => "COMPENSATED",
        }
    }

    /// Single-character marker used in audit summaries.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Pending => "·",
            Self::Running | Self::Compensating => "…",
            Self::Completed => "✓",
            Self::Failed => "✗",
            Self::Compensated => "↩",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_completed_and_compensated_are_terminal() {
        assert!(SagaStatus::Completed.is_terminal());
        assert!(SagaStatus::Compensated.is_terminal());
        assert!(!SagaStatus::Failed.is_terminal());
        assert!(!SagaStatus::Compensating.is_terminal());
        assert!(!SagaStatus::Running.is_terminal());
        assert!(!SagaStatus::Pending.is_terminal());
    }

    #[test]
    fn statuses_serialize_in_screaming_case() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_string(&SagaStatus::Compensating)?, "\"COMPENSATING\"");
        assert_eq!(serde_json::to_string(&StepStatus::Completed)?, "\"COMPLETED\"");

        let parsed: SagaStatus = serde_json::from_str("\"FAILED\"")?;
        assert_eq!(parsed, SagaStatus::Failed);
        Ok(())
    }

    #[test]
    fn display_matches_wire_name() {
        assert_eq!(SagaStatus::Running.to_string(), "RUNNING");
        assert_eq!(StepStatus::Compensated.to_string(), "COMPENSATED");
    }
}
