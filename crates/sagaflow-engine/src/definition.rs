use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::step::SagaStep;

const DEFAULT_MAX_RETRIES: u32 = 3;

/// How the steps of a saga are coordinated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaPattern {
    /// The engine drives every step in order.
    #[default]
    Orchestration,
    /// Steps react to each other's events. Definitions may declare it, but
    /// the engine only executes orchestrated sagas.
    Choreography,
}

impl fmt::Display for SagaPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Orchestration => f.write_str("ORCHESTRATION"),
            Self::Choreography => f.write_str("CHOREOGRAPHY"),
        }
    }
}

/// One step of a saga definition.
///
/// A step is not retried unless marked [`retryable`](Self::retryable); a
/// retryable step gets `max_retries` attempts in total.
#[derive(Clone)]
pub struct StepDefinition {
    id: String,
    name: String,
    step: Arc<dyn SagaStep>,
    retryable: bool,
    max_retries: u32,
    timeout: Option<Duration>,
    dependencies: Vec<String>,
    idempotent_compensation: bool,
}

impl StepDefinition {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, step: impl SagaStep) -> Self {
        Self::from_arc(id, name, Arc::new(step))
    }

    /// Like [`new`](Self::new) for a step body shared with other definitions.
    #[must_use]
    pub fn from_arc(id: impl Into<String>, name: impl Into<String>, step: Arc<dyn SagaStep>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            step,
            retryable: false,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: None,
            dependencies: Vec::new(),
            idempotent_compensation: false,
        }
    }

    #[must_use]
    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        self.dependencies.push(step_id.into());
        self
    }

    /// Declares that compensating this step twice is harmless.
    ///
    /// Advisory only: the engine never relies on it.
    #[must_use]
    pub fn idempotent_compensation(mut self, idempotent: bool) -> Self {
        self.idempotent_compensation = idempotent;
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    #[must_use]
    pub fn max_retry_count(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub fn step_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    #[must_use]
    pub fn has_idempotent_compensation(&self) -> bool {
        self.idempotent_compensation
    }

    pub(crate) fn body(&self) -> Arc<dyn SagaStep> {
        Arc::clone(&self.step)
    }

    pub(crate) fn max_attempts(&self) -> u32 {
        if self.retryable {
            self.max_retries.max(1)
        } else {
            1
        }
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("retryable", &self.retryable)
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .field("dependencies", &self.dependencies)
            .field("idempotent_compensation", &self.idempotent_compensation)
            .finish_non_exhaustive()
    }
}

/// Blueprint for a workflow type.
///
/// Steps run in declaration order; a step's dependencies must be declared
/// before it. Unless [`with_critical_steps`](Self::with_critical_steps) is
/// used, every step is critical.
#[derive(Debug, Clone)]
pub struct SagaDefinition {
    workflow_type: String,
    name: String,
    pattern: SagaPattern,
    steps: Vec<StepDefinition>,
    timeout: Option<Duration>,
    critical_steps: Option<Vec<String>>,
}

impl SagaDefinition {
    #[must_use]
    pub fn new(workflow_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            workflow_type: workflow_type.into(),
            name: name.into(),
            pattern: SagaPattern::default(),
            steps: Vec::new(),
            timeout: None,
            critical_steps: None,
        }
    }

    #[must_use]
    pub fn with_step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: SagaPattern) -> Self {
        self.pattern = pattern;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_critical_steps<I, S>(mut self, step_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.critical_steps = Some(step_ids.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn workflow_type(&self) -> &str {
        &self.workflow_type
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn pattern(&self) -> SagaPattern {
        self.pattern
    }

    #[must_use]
    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Explicitly critical step ids, or `None` when every step is critical.
    #[must_use]
    pub fn critical_steps(&self) -> Option<&[String]> {
        self.critical_steps.as_deref()
    }

    #[must_use]
    pub fn step(&self, step_id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|step| step.id == step_id)
    }

    #[must_use]
    pub fn is_critical(&self, step_id: &str) -> bool {
        self.critical_steps
            .as_ref()
            .is_none_or(|critical| critical.iter().any(|id| id == step_id))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use sagaflow_core::{SagaContext, StepError};

    use super::*;
    use crate::step::StepOutput;

    struct Noop;

    #[async_trait]
    impl SagaStep for Noop {
        async fn execute(&self, _ctx: &SagaContext) -> Result<StepOutput, StepError> {
            Ok(StepOutput::empty())
        }
    }

    #[test]
    fn non_retryable_step_gets_one_attempt() {
        let step = StepDefinition::new("a", "A", Noop).max_retries(5);

        assert_eq!(step.max_attempts(), 1);
    }

    #[test]
    fn retryable_step_gets_max_retries_attempts() {
        let step = StepDefinition::new("a", "A", Noop).retryable(true).max_retries(4);
        assert_eq!(step.max_attempts(), 4);

        let zero = StepDefinition::new("b", "B", Noop).retryable(true).max_retries(0);
        assert_eq!(zero.max_attempts(), 1);
    }

    #[test]
    fn every_step_is_critical_by_default() {
        let definition = SagaDefinition::new("wf", "Workflow")
            .with_step(StepDefinition::new("a", "A", Noop))
            .with_step(StepDefinition::new("b", "B", Noop));

        assert!(definition.is_critical("a"));
        assert!(definition.is_critical("b"));
    }

    #[test]
    fn explicit_critical_steps_limit_criticality() {
        let definition = SagaDefinition::new("wf", "Workflow")
            .with_step(StepDefinition::new("a", "A", Noop))
            .with_step(StepDefinition::new("b", "B", Noop))
            .with_critical_steps(["a"]);

        assert!(definition.is_critical("a"));
        assert!(!definition.is_critical("b"));
    }

    #[test]
    fn step_lookup_by_id() {
        let definition = SagaDefinition::new("wf", "Workflow")
            .with_step(StepDefinition::new("a", "Create worktree", Noop).depends_on("x"));

        let step = definition.step("a").expect("step should exist");
        assert_eq!(step.name(), "Create worktree");
        assert_eq!(step.dependencies(), ["x".to_string()]);
        assert!(definition.step("missing").is_none());
    }
}
