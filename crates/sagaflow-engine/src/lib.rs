//! Saga orchestration engine.
//!
//! Register [`SagaDefinition`]s with a [`SagaEngine`], then execute them by
//! workflow type. Steps run in declaration order with per-step retries and
//! timeouts; when a saga fails, the steps that completed are compensated in
//! reverse. Every transition is written to a [`SagaStore`] before it is
//! announced to the engine's [`EventPublisher`], so a saga can be inspected
//! or compensated again after a restart.
//!
//! [`SagaStore`]: sagaflow_store::SagaStore

mod compensation;
mod config;
mod definition;
mod engine;
mod error;
mod events;
mod executor;
mod lease;
mod options;
mod race;
mod registry;
mod step;

pub use config::EngineConfig;
pub use definition::{SagaDefinition, SagaPattern, StepDefinition};
pub use engine::SagaEngine;
pub use error::{ConfigError, DefinitionError, SagaError};
pub use events::{
    BroadcastPublisher, EventPublisher, LoggingPublisher, NoopPublisher, RecordingPublisher,
    SagaEvent,
};
pub use options::{CompensateOptions, ExecuteOptions};
pub use registry::DefinitionRegistry;
pub use step::{SagaStep, StepOutput};

pub use sagaflow_core::{
    JsonMap, SagaContext, SagaInstance, SagaStatus, StepError, StepErrorKind, StepState,
    StepStatus,
};
