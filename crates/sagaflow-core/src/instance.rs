use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::JsonMap;
use crate::context::SagaContext;
use crate::error::{ErrorRecord, StepError};
use crate::status::{SagaStatus, StepStatus};

/// Runtime state of one step within a saga instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepState {
    pub step_id: String,
    pub status: StepStatus,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compensated_at: Option<DateTime<Utc>>,
}

impl StepState {
    #[must_use]
    pub fn new(step_id: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Pending,
            attempts: 0,
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
            compensated_at: None,
        }
    }
}

/// A single run of a saga definition.
#[derive(Debug, Clone, PartialEq)]
pub struct SagaInstance {
    pub id: String,
    pub workflow_type: String,
    pub status: SagaStatus,
    pub context: SagaContext,
    /// Step states in definition order.
    pub step_states: IndexMap<String, StepState>,
    pub completed_steps: Vec<String>,
    pub failed_steps: Vec<String>,
    pub compensated_steps: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<ErrorRecord>,
    pub metadata: Option<JsonMap>,
}

impl SagaInstance {
    /// Creates a `Pending` instance with a `Pending` state for every step.
    #[must_use]
    pub fn new<'a>(
        workflow_type: impl Into<String>,
        context: SagaContext,
        step_ids: impl IntoIterator<Item = &'a str>,
        metadata: Option<JsonMap>,
    ) -> Self {
        let step_states = step_ids
            .into_iter()
            .map(|id| (id.to_string(), StepState::new(id)))
            .collect();

        Self {
            id: context.saga_id.clone(),
            workflow_type: workflow_type.into(),
            status: SagaStatus::Pending,
            context,
            step_states,
            completed_steps: Vec::new(),
            failed_steps: Vec::new(),
            compensated_steps: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            error: None,
            metadata,
        }
    }

    #[must_use]
    pub fn step_state(&self, step_id: &str) -> Option<&StepState> {
        self.step_states.get(step_id)
    }

    /// Returns the state for `step_id`, inserting a `Pending` one if the
    /// instance has never seen the step.
    pub fn step_state_mut(&mut self, step_id: &str) -> &mut StepState {
        self.step_states
            .entry(step_id.to_string())
            .or_insert_with(|| StepState::new(step_id))
    }

    #[must_use]
    pub fn step_status(&self, step_id: &str) -> Option<StepStatus> {
        self.step_states.get(step_id).map(|state| state.status)
    }

    #[must_use]
    pub fn is_step_completed(&self, step_id: &str) -> bool {
        self.step_status(step_id) == Some(StepStatus::Completed)
    }

    /// One line per step with a status marker, for display.
    #[must_use]
    pub fn summary(&self) -> String {
        self.step_states
            .values()
            .map(|state| {
                let mut line = format!("{} {}", state.status.symbol(), state.step_id);
                if state.attempts > 1 {
                    line.push_str(&format!(" ({} attempts)", state.attempts));
                }
                if let Some(error) = &state.error {
                    line.push_str(&format!(": {error}"));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
