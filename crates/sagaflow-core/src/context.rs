use std::time::Duration;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::JsonMap;

/// Data shared by every step of one saga run.
///
/// Steps see a snapshot of the context taken just before they run, so a step
/// can read what earlier steps contributed to [`output`](Self::output) and
/// [`step_results`](Self::step_results).
#[derive(Debug, Clone, PartialEq)]
pub struct SagaContext {
    pub saga_id: String,
    /// Threads related sagas and events together for tracing.
    pub correlation_id: String,
    pub input: Value,
    /// Accumulated output; each successful step's object data is merged in.
    pub output: JsonMap,
    /// Data returned by each completed step, in completion order.
    pub step_results: IndexMap<String, Value>,
    pub metadata: JsonMap,
    pub timeout: Option<Duration>,
}

impl SagaContext {
    /// Creates a context for a new run, generating a correlation id when none
    /// is supplied.
    #[must_use]
    pub fn new(
        saga_id: impl Into<String>,
        correlation_id: Option<String>,
        input: Value,
        metadata: JsonMap,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            saga_id: saga_id.into(),
            correlation_id: correlation_id.unwrap_or_else(crate::new_id),
            input,
            output: JsonMap::new(),
            step_results: IndexMap::new(),
            metadata,
            timeout,
        }
    }

    /// Records what a step returned and merges it into the output.
    ///
    /// Object data is merged key by key, later steps overwriting earlier
    /// keys. Any other value is stored under the step id.
    pub fn record_step_result(&mut self, step_id: &str, data: Option<Value>) {
        let result = data.unwrap_or(Value::Null);
        match &result {
            Value::Object(fields) => {
                for (key, value) in fields {
                    self.output.insert(key.clone(), value.clone());
                }
            }
            Value::Null => {}
            other => {
                self.output.insert(step_id.to_string(), other.clone());
            }
        }
        self.step_results.insert(step_id.to_string(), result);
    }

    #[must_use]
    pub fn step_result(&self, step_id: &str) -> Option<&Value> {
        self.step_results.get(step_id)
    }

    #[must_use]
    pub fn output_value(&self, key: &str) -> Option<&Value> {
        self.output.get(key)
    }

    /// Deserializes the saga input into a typed value.
    ///
    /// # Errors
    ///
    /// Returns an error if the input does not match `T`.
    pub fn input_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.input)
    }

    /// Deserializes one output key into a typed value, `Ok(None)` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value does not match `T`.
    pub fn output_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, serde_json::Error> {
        self.output.get(key).map(T::deserialize).transpose()
    }
}
