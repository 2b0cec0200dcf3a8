use std::time::Duration;

use chrono::Utc;
use sagaflow_core::{SagaContext, SagaInstance, SagaStatus, StepError, StepStatus};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::definition::{SagaDefinition, SagaPattern, StepDefinition};
use crate::engine::SagaEngine;
use crate::error::SagaError;
use crate::events::SagaEvent;
use crate::options::{CompensateOptions, ExecuteOptions};
use crate::race::{RaceError, race_detached};

enum StepRun {
    Completed,
    Failed(StepError),
}

impl SagaEngine {
    /// Runs a new saga of `workflow_type` to completion.
    ///
    /// Steps execute in declaration order. When the saga fails and
    /// `auto_compensate` is set, completed steps are rolled back before this
    /// returns; the rollback never turns the failure into a success.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::UnknownWorkflow` if no definition is registered,
    /// `SagaError::StepFailed` or `SagaError::DependencyNotSatisfied` (with
    /// the saga id) when the saga aborts, and `SagaError::Persistence` if a
    /// transition cannot be written to the store.
    pub async fn execute_saga(
        &self,
        workflow_type: &str,
        input: Value,
        options: ExecuteOptions,
    ) -> Result<SagaInstance, SagaError> {
        let definition = self
            .definition(workflow_type)
            .ok_or_else(|| SagaError::UnknownWorkflow(workflow_type.to_string()))?;
        if definition.pattern() != SagaPattern::Orchestration {
            return Err(SagaError::UnsupportedPattern {
                workflow_type: workflow_type.to_string(),
                pattern: definition.pattern(),
            });
        }

        let saga_id = sagaflow_core::new_id();
        let _lease = self.leases.acquire(&saga_id).await;

        let metadata = options.metadata.clone();
        let context = SagaContext::new(
            saga_id.as_str(),
            options.correlation_id.clone(),
            input,
            metadata.clone().unwrap_or_default(),
            options.timeout.or(definition.timeout()),
        );
        let mut instance = SagaInstance::new(
            workflow_type,
            context,
            definition.steps().iter().map(StepDefinition::id),
            metadata,
        );

        self.persist(&instance).await?;
        info!(
            saga_id = %instance.id,
            workflow_type,
            correlation_id = %instance.context.correlation_id,
            "saga started"
        );
        self.announce(&SagaEvent::Started {
            saga_id: instance.id.clone(),
            workflow_type: workflow_type.to_string(),
            correlation_id: instance.context.correlation_id.clone(),
        });

        instance.status = SagaStatus::Running;
        self.persist(&instance).await?;

        match self.run_steps(&definition, &mut instance, &options).await {
            Ok(()) => {
                instance.status = SagaStatus::Completed;
                instance.completed_at = Some(Utc::now());
                self.persist(&instance).await?;
                info!(saga_id = %instance.id, "saga completed");
                self.announce(&SagaEvent::Completed {
                    saga_id: instance.id.clone(),
                    output: instance.context.output.clone(),
                });
                self.evict(&instance.id);
                Ok(instance)
            }
            Err(failure) => Err(self.fail_saga(&definition, instance, &options, failure).await),
        }
    }

    async fn run_steps(
        &self,
        definition: &SagaDefinition,
        instance: &mut SagaInstance,
        options: &ExecuteOptions,
    ) -> Result<(), SagaError> {
        for step in definition.steps() {
            check_dependencies(step, instance)?;

            let timeout = step
                .step_timeout()
                .or(options.timeout)
                .or(definition.timeout())
                .unwrap_or(self.config().step_timeout());

            match self.execute_step(step, instance, timeout).await? {
                StepRun::Completed => {}
                StepRun::Failed(source) => {
                    if definition.is_critical(step.id()) || !options.continue_on_non_critical_failure
                    {
                        return Err(SagaError::StepFailed {
                            saga_id: instance.id.clone(),
                            step_id: step.id().to_string(),
                            source,
                        });
                    }
                    warn!(
                        saga_id = %instance.id,
                        step_id = step.id(),
                        error = %source,
                        "non-critical step failed, continuing"
                    );
                }
            }
        }
        Ok(())
    }

    /// Runs one step through its retry budget.
    ///
    /// Only persistence failures are returned as errors; a step that fails
    /// every attempt yields `StepRun::Failed`.
    async fn execute_step(
        &self,
        step: &StepDefinition,
        instance: &mut SagaInstance,
        timeout: Duration,
    ) -> Result<StepRun, SagaError> {
        let step_id = step.id();
        let max_attempts = step.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            {
                let state = instance.step_state_mut(step_id);
                state.status = StepStatus::Running;
                state.attempts += 1;
                state.started_at.get_or_insert_with(Utc::now);
            }
            self.persist(instance).await?;
            debug!(saga_id = %instance.id, step_id, attempt, max_attempts, "step started");
            self.announce(&SagaEvent::StepStarted {
                saga_id: instance.id.clone(),
                step_id: step_id.to_string(),
                attempt,
            });

            let body = step.body();
            let ctx = instance.context.clone();
            let outcome = race_detached(timeout, async move { body.execute(&ctx).await })
                .await
                .unwrap_or_else(|race_error| Err(race_failure(step_id, timeout, race_error)));

            match outcome {
                Ok(output) => {
                    instance.context.record_step_result(step_id, output.data);
                    let result = instance
                        .context
                        .step_result(step_id)
                        .cloned()
                        .unwrap_or(Value::Null);
                    let state = instance.step_state_mut(step_id);
                    state.status = StepStatus::Completed;
                    state.result = Some(result.clone());
                    state.error = None;
                    state.completed_at = Some(Utc::now());
                    let attempts = state.attempts;
                    instance.completed_steps.push(step_id.to_string());
                    self.persist(instance).await?;
                    debug!(saga_id = %instance.id, step_id, attempts, "step completed");
                    self.announce(&SagaEvent::StepCompleted {
                        saga_id: instance.id.clone(),
                        step_id: step_id.to_string(),
                        attempts,
                        result,
                    });
                    return Ok(StepRun::Completed);
                }
                Err(step_error) => {
                    instance.step_state_mut(step_id).error = Some(step_error.clone());

                    if attempt < max_attempts {
                        self.persist(instance).await?;
                        let delay = self.config().backoff_delay(attempt);
                        warn!(
                            saga_id = %instance.id,
                            step_id,
                            attempt,
                            max_attempts,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %step_error,
                            "step attempt failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    let state = instance.step_state_mut(step_id);
                    state.status = StepStatus::Failed;
                    state.completed_at = Some(Utc::now());
                    let attempts = state.attempts;
                    instance.failed_steps.push(step_id.to_string());
                    self.persist(instance).await?;
                    warn!(
                        saga_id = %instance.id,
                        step_id,
                        attempts,
                        error = %step_error,
                        "step failed"
                    );
                    self.announce(&SagaEvent::StepFailed {
                        saga_id: instance.id.clone(),
                        step_id: step_id.to_string(),
                        attempts,
                        error: step_error.clone(),
                    });
                    return Ok(StepRun::Failed(step_error));
                }
            }
        }
    }

    /// Marks the saga failed, rolls it back if requested and drops it from
    /// the active cache. Always hands back the original failure.
    async fn fail_saga(
        &self,
        definition: &SagaDefinition,
        mut instance: SagaInstance,
        options: &ExecuteOptions,
        failure: SagaError,
    ) -> SagaError {
        if matches!(failure, SagaError::Persistence { .. }) {
            self.evict(&instance.id);
            return failure;
        }

        instance.status = SagaStatus::Failed;
        instance.error = Some(failure.to_record());
        instance.completed_at = Some(Utc::now());
        if let Err(persist_error) = self.persist(&instance).await {
            error!(
                saga_id = %instance.id,
                error = %persist_error,
                "failed to persist saga failure"
            );
            self.evict(&instance.id);
            return failure;
        }
        info!(saga_id = %instance.id, error = %failure, "saga failed");
        if let Some(record) = &instance.error {
            self.announce(&SagaEvent::Failed {
                saga_id: instance.id.clone(),
                error: record.clone(),
            });
        }

        if options.auto_compensate && !instance.completed_steps.is_empty() {
            let compensate = CompensateOptions {
                timeout: options.timeout,
                ..CompensateOptions::default()
            };
            if let Err(compensation_error) = self
                .run_compensation(definition, &mut instance, &compensate)
                .await
            {
                error!(
                    saga_id = %instance.id,
                    error = %compensation_error,
                    "automatic compensation failed"
                );
            }
        }

        self.evict(&instance.id);
        failure
    }
}

fn check_dependencies(step: &StepDefinition, instance: &SagaInstance) -> Result<(), SagaError> {
    match step
        .dependencies()
        .iter()
        .find(|dependency| !instance.is_step_completed(dependency))
    {
        Some(dependency) => Err(SagaError::DependencyNotSatisfied {
            saga_id: instance.id.clone(),
            step_id: step.id().to_string(),
            dependency: dependency.clone(),
        }),
        None => Ok(()),
    }
}

pub(crate) fn race_failure(step_id: &str, timeout: Duration, error: RaceError) -> StepError {
    match error {
        RaceError::TimedOut => StepError::timed_out(step_id, timeout),
        RaceError::Panicked(message) => StepError::panicked(message),
    }
}
