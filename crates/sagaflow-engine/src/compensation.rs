use chrono::Utc;
use sagaflow_core::{SagaInstance, SagaStatus, StepStatus};
use tracing::{debug, error, info, warn};

use crate::definition::{SagaDefinition, StepDefinition};
use crate::engine::SagaEngine;
use crate::error::SagaError;
use crate::events::SagaEvent;
use crate::executor::race_failure;
use crate::options::CompensateOptions;
use crate::race::race_detached;

impl SagaEngine {
    /// Undoes the completed steps of a stored or running saga.
    ///
    /// A saga that is already compensated (or being compensated) is left
    /// untouched and `Ok(())` is returned.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::NotFound` if the saga is unknown,
    /// `SagaError::UnknownWorkflow` if its definition is no longer registered,
    /// and, when `stop_on_failure` is set, the first
    /// `SagaError::CompensationTimeout` or `SagaError::CompensationFailed`.
    /// An aborted pass puts the saga back in the status it had before, so
    /// the remaining steps can be compensated by a later call.
    pub async fn compensate_saga(
        &self,
        saga_id: &str,
        options: CompensateOptions,
    ) -> Result<(), SagaError> {
        let _lease = self.leases.acquire(saga_id).await;

        let mut instance = self
            .get_saga_instance(saga_id)
            .await?
            .ok_or_else(|| SagaError::NotFound {
                saga_id: saga_id.to_string(),
            })?;

        if matches!(
            instance.status,
            SagaStatus::Compensated | SagaStatus::Compensating
        ) {
            debug!(saga_id, status = %instance.status, "saga already compensated");
            return Ok(());
        }

        let definition = self
            .definition(&instance.workflow_type)
            .ok_or_else(|| SagaError::UnknownWorkflow(instance.workflow_type.clone()))?;

        self.run_compensation(&definition, &mut instance, &options)
            .await
    }

    /// Compensation pass shared by manual and automatic rollback. The caller
    /// must hold the saga's lease.
    ///
    /// The saga leaves the active cache however the pass ends.
    pub(crate) async fn run_compensation(
        &self,
        definition: &SagaDefinition,
        instance: &mut SagaInstance,
        options: &CompensateOptions,
    ) -> Result<(), SagaError> {
        let outcome = self.compensation_pass(definition, instance, options).await;
        self.evict(&instance.id);
        outcome
    }

    async fn compensation_pass(
        &self,
        definition: &SagaDefinition,
        instance: &mut SagaInstance,
        options: &CompensateOptions,
    ) -> Result<(), SagaError> {
        let resume_status = instance.status;
        instance.status = SagaStatus::Compensating;
        self.persist(instance).await?;
        info!(saga_id = %instance.id, "compensating saga");

        let mut selected = options
            .steps
            .clone()
            .unwrap_or_else(|| instance.completed_steps.clone());
        if options.reverse_order {
            selected.reverse();
        }

        for step_id in &selected {
            if instance.step_status(step_id) != Some(StepStatus::Completed) {
                debug!(saga_id = %instance.id, step_id, "step not completed, nothing to undo");
                continue;
            }
            let Some(step) = definition.step(step_id) else {
                warn!(
                    saga_id = %instance.id,
                    step_id,
                    "step missing from current definition, skipping compensation"
                );
                continue;
            };

            if let Err(failure) = self.compensate_step(step, instance, options).await {
                if matches!(failure, SagaError::Persistence { .. }) {
                    return Err(failure);
                }
                if options.stop_on_failure {
                    // Pre-pass status and error are kept; the failure lives on
                    // the step state only.
                    instance.status = resume_status;
                    self.persist(instance).await?;
                    warn!(
                        saga_id = %instance.id,
                        step_id,
                        status = %instance.status,
                        "compensation aborted"
                    );
                    return Err(failure);
                }
                error!(
                    saga_id = %instance.id,
                    step_id,
                    error = %failure,
                    "compensation step failed, continuing"
                );
            }
        }

        instance.status = SagaStatus::Compensated;
        instance.completed_at = Some(Utc::now());
        self.persist(instance).await?;
        info!(
            saga_id = %instance.id,
            compensated = instance.compensated_steps.len(),
            "saga compensated"
        );
        self.announce(&SagaEvent::Compensated {
            saga_id: instance.id.clone(),
            compensated_steps: instance.compensated_steps.clone(),
        });
        Ok(())
    }

    async fn compensate_step(
        &self,
        step: &StepDefinition,
        instance: &mut SagaInstance,
        options: &CompensateOptions,
    ) -> Result<(), SagaError> {
        let step_id = step.id();
        instance.step_state_mut(step_id).status = StepStatus::Compensating;
        self.persist(instance).await?;
        debug!(saga_id = %instance.id, step_id, "compensating step");
        self.announce(&SagaEvent::StepCompensating {
            saga_id: instance.id.clone(),
            step_id: step_id.to_string(),
        });

        let timeout = step
            .step_timeout()
            .or(options.timeout)
            .unwrap_or(self.config().compensation_timeout());
        let body = step.body();
        let ctx = instance.context.clone();
        let outcome = race_detached(timeout, async move { body.compensate(&ctx).await })
            .await
            .unwrap_or_else(|race_error| Err(race_failure(step_id, timeout, race_error)));

        match outcome {
            Ok(()) => {
                let state = instance.step_state_mut(step_id);
                state.status = StepStatus::Compensated;
                state.compensated_at = Some(Utc::now());
                instance.compensated_steps.push(step_id.to_string());
                self.persist(instance).await?;
                debug!(saga_id = %instance.id, step_id, "step compensated");
                self.announce(&SagaEvent::StepCompensated {
                    saga_id: instance.id.clone(),
                    step_id: step_id.to_string(),
                });
                Ok(())
            }
            Err(step_error) => {
                let state = instance.step_state_mut(step_id);
                state.status = StepStatus::Failed;
                state.error = Some(step_error.clone());
                self.persist(instance).await?;

                let saga_id = instance.id.clone();
                let step_id = step_id.to_string();
                if step_error.is_timeout() {
                    Err(SagaError::CompensationTimeout {
                        saga_id,
                        step_id,
                        timeout,
                    })
                } else {
                    Err(SagaError::CompensationFailed {
                        saga_id,
                        step_id,
                        source: step_error,
                    })
                }
            }
        }
    }
}
