use parking_lot::Mutex;
use sagaflow_core::{ErrorRecord, JsonMap, StepError};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, trace};

/// A lifecycle transition of a saga.
///
/// Published after the transition has been persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
#[non_exhaustive]
pub enum SagaEvent {
    #[serde(rename = "saga.started")]
    Started {
        saga_id: String,
        workflow_type: String,
        correlation_id: String,
    },
    #[serde(rename = "saga.step.started")]
    StepStarted {
        saga_id: String,
        step_id: String,
        attempt: u32,
    },
    #[serde(rename = "saga.step.completed")]
    StepCompleted {
        saga_id: String,
        step_id: String,
        attempts: u32,
        result: Value,
    },
    #[serde(rename = "saga.step.failed")]
    StepFailed {
        saga_id: String,
        step_id: String,
        attempts: u32,
        error: StepError,
    },
    #[serde(rename = "saga.step.compensating")]
    StepCompensating { saga_id: String, step_id: String },
    #[serde(rename = "saga.step.compensated")]
    StepCompensated { saga_id: String, step_id: String },
    #[serde(rename = "saga.completed")]
    Completed { saga_id: String, output: JsonMap },
    #[serde(rename = "saga.failed")]
    Failed { saga_id: String, error: ErrorRecord },
    #[serde(rename = "saga.compensated")]
    Compensated {
        saga_id: String,
        compensated_steps: Vec<String>,
    },
}

impl SagaEvent {
    /// Dotted event name, e.g. `saga.step.completed`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "saga.started",
            Self::StepStarted { .. } => "saga.step.started",
            Self::StepCompleted { .. } => "saga.step.completed",
            Self::StepFailed { .. } => "saga.step.failed",
            Self::StepCompensating { .. } => "saga.step.compensating",
            Self::StepCompensated { .. } => "saga.step.compensated",
            Self::Completed { .. } => "saga.completed",
            Self::Failed { .. } => "saga.failed",
            Self::Compensated { .. } => "saga.compensated",
        }
    }

    #[must_use]
    pub fn saga_id(&self) -> &str {
        match self {
            Self::Started { saga_id, .. }
            | Self::StepStarted { saga_id, .. }
            | Self::StepCompleted { saga_id, .. }
            | Self::StepFailed { saga_id, .. }
            | Self::StepCompensating { saga_id, .. }
            | Self::StepCompensated { saga_id, .. }
            | Self::Completed { saga_id, .. }
            | Self::Failed { saga_id, .. }
            | Self::Compensated { saga_id, .. } => saga_id,
        }
    }

    #[must_use]
    pub fn step_id(&self) -> Option<&str> {
        match self {
            Self::StepStarted { step_id, .. }
            | Self::StepCompleted { step_id, .. }
            | Self::StepFailed { step_id, .. }
            | Self::StepCompensating { step_id, .. }
            | Self::StepCompensated { step_id, .. } => Some(step_id),
            Self::Started { .. }
            | Self::Completed { .. }
            | Self::Failed { .. }
            | Self::Compensated { .. } => None,
        }
    }
}

/// Receives lifecycle events synchronously, in transition order.
///
/// Implementations must not block: they run inline on the saga's task.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &SagaEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: &SagaEvent) {}
}

/// Emits every event as a `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingPublisher;

impl EventPublisher for LoggingPublisher {
    fn publish(&self, event: &SagaEvent) {
        info!(
            event = event.name(),
            saga_id = %event.saga_id(),
            step_id = event.step_id().unwrap_or_default(),
            "saga event"
        );
    }
}

/// Fans events out to any number of async subscribers.
///
/// Slow subscribers lag and miss events rather than blocking the saga.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<SagaEvent>,
}

impl BroadcastPublisher {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SagaEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: &SagaEvent) {
        if self.sender.send(event.clone()).is_err() {
            trace!(event = event.name(), "no event subscribers");
        }
    }
}

/// Keeps every published event in memory.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<SagaEvent>>,
}

impl RecordingPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<SagaEvent> {
        self.events.lock().clone()
    }

    /// Names of recorded events for `saga_id`, in publication order.
    #[must_use]
    pub fn names_for(&self, saga_id: &str) -> Vec<&'static str> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.saga_id() == saga_id)
            .map(SagaEvent::name)
            .collect()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: &SagaEvent) {
        self.events.lock().push(event.clone());
    }
}
