//! Data model shared by the saga engine and its durable stores.
//!
//! A [`SagaInstance`] is the runtime view of one saga run; a [`SagaRecord`]
//! is its flattened, serializable form.

mod context;
mod error;
mod instance;
mod record;
mod status;

pub use context::SagaContext;
pub use error::{ErrorRecord, RecordError, StepError, StepErrorKind};
pub use instance::{SagaInstance, StepState};
pub use record::{ContextRecord, SagaRecord, StepResultEntry, StepStateEntry};
pub use status::{SagaStatus, StepStatus};

/// JSON object used for saga output and metadata.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Generates a fresh identifier for sagas and correlation ids.
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
