//! Durable shape of a saga instance.
//!
//! Ordered maps are flattened into lists of `{stepId, ...}` entries so the
//! record only holds plain structured values, and are rebuilt in the same
//! order on load.

use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::JsonMap;
use crate::context::SagaContext;
use crate::error::{ErrorRecord, RecordError};
use crate::instance::{SagaInstance, StepState};
use crate::status::SagaStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResultEntry {
    pub step_id: String,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepStateEntry {
    pub step_id: String,
    pub state: StepState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextRecord {
    pub saga_id: String,
    pub correlation_id: String,
    pub input: Value,
    #[serde(default)]
    pub output: JsonMap,
    #[serde(default)]
    pub step_results: Vec<StepResultEntry>,
    #[serde(default)]
    pub metadata: JsonMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Serialized saga instance, keyed by `id` in the durable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaRecord {
    pub id: String,
    pub workflow_type: String,
    pub status: SagaStatus,
    pub context: ContextRecord,
    #[serde(default)]
    pub step_states: Vec<StepStateEntry>,
    #[serde(default)]
    pub completed_steps: Vec<String>,
    #[serde(default)]
    pub failed_steps: Vec<String>,
    #[serde(default)]
    pub compensated_steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonMap>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SagaRecord {
    /// Text the history query matches aggregate ids against.
    #[must_use]
    pub fn metadata_text(&self) -> String {
        self.metadata
            .as_ref()
            .map(|metadata| Value::Object(metadata.clone()).to_string())
            .unwrap_or_default()
    }

    /// Rebuilds the runtime instance from this record.
    ///
    /// # Errors
    ///
    /// Returns an error if a step appears twice in a flattened table or the
    /// context belongs to another saga.
    pub fn into_instance(self) -> Result<SagaInstance, RecordError> {
        if self.context.saga_id != self.id {
            return Err(RecordError::ContextMismatch {
                saga_id: self.id,
                context_saga_id: self.context.saga_id,
            });
        }

        let step_results = unflatten(
            &self.id,
            "step results",
            self.context
                .step_results
                .into_iter()
                .map(|entry| (entry.step_id, entry.result)),
        )?;
        let step_states = unflatten(
            &self.id,
            "step states",
            self.step_states
                .into_iter()
                .map(|entry| (entry.step_id, entry.state)),
        )?;

        let context = SagaContext {
            saga_id: self.context.saga_id,
            correlation_id: self.context.correlation_id,
            input: self.context.input,
            output: self.context.output,
            step_results,
            metadata: self.context.metadata,
            timeout: self.context.timeout_ms.map(Duration::from_millis),
        };

        Ok(SagaInstance {
            id: self.id,
            workflow_type: self.workflow_type,
            status: self.status,
            context,
            step_states,
            completed_steps: self.completed_steps,
            failed_steps: self.failed_steps,
            compensated_steps: self.compensated_steps,
            started_at: self.started_at,
            completed_at: self.completed_at,
            error: self.error,
            metadata: self.metadata,
        })
    }
}

impl From<&SagaInstance> for SagaRecord {
    fn from(instance: &SagaInstance) -> Self {
        let context = &instance.context;
        Self {
            id: instance.id.clone(),
            workflow_type: instance.workflow_type.clone(),
            status: instance.status,
            context: ContextRecord {
                saga_id: context.saga_id.clone(),
                correlation_id: context.correlation_id.clone(),
                input: context.input.clone(),
                output: context.output.clone(),
                step_results: context
                    .step_results
                    .iter()
                    .map(|(step_id, result)| StepResultEntry {
                        step_id: step_id.clone(),
                        result: result.clone(),
                    })
                    .collect(),
                metadata: context.metadata.clone(),
                timeout_ms: context
                    .timeout
                    .map(|timeout| u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)),
            },
            step_states: instance
                .step_states
                .iter()
                .map(|(step_id, state)| StepStateEntry {
                    step_id: step_id.clone(),
                    state: state.clone(),
                })
                .collect(),
            completed_steps: instance.completed_steps.clone(),
            failed_steps: instance.failed_steps.clone(),
            compensated_steps: instance.compensated_steps.clone(),
            error: instance.error.clone(),
            metadata: instance.metadata.clone(),
            started_at: instance.started_at,
            completed_at: instance.completed_at,
        }
    }
}

impl TryFrom<SagaRecord> for SagaInstance {
    type Error = RecordError;

    fn try_from(record: SagaRecord) -> Result<Self, Self::Error> {
        record.into_instance()
    }
}

fn unflatten<V>(
    saga_id: &str,
    table: &'static str,
    entries: impl Iterator<Item = (String, V)>,
) -> Result<IndexMap<String, V>, RecordError> {
    let mut map = IndexMap::new();
    for (step_id, value) in entries {
        if map.contains_key(&step_id) {
            return Err(RecordError::DuplicateEntry {
                saga_id: saga_id.to_string(),
                step_id,
                table,
            });
        }
        map.insert(step_id, value);
    }
    Ok(map)
}
