use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::definition::SagaDefinition;
use crate::error::DefinitionError;

/// Validated saga definitions keyed by workflow type.
///
/// Registration is expected to happen at start-up; lookups are cheap clones
/// of an `Arc`.
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    definitions: RwLock<HashMap<String, Arc<SagaDefinition>>>,
}

impl DefinitionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores `definition`, replacing any definition previously
    /// registered for the same workflow type.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition has no steps, repeats a step id,
    /// declares a dependency on a step it does not contain, or marks an
    /// unknown step as critical. Nothing is stored in that case.
    pub fn register(&self, definition: SagaDefinition) -> Result<(), DefinitionError> {
        validate(&definition)?;

        let workflow_type = definition.workflow_type().to_string();
        let replaced = self
            .definitions
            .write()
            .insert(workflow_type.clone(), Arc::new(definition))
            .is_some();
        debug!(workflow_type = %workflow_type, replaced, "registered saga definition");
        Ok(())
    }

    #[must_use]
    pub fn get(&self, workflow_type: &str) -> Option<Arc<SagaDefinition>> {
        self.definitions.read().get(workflow_type).cloned()
    }

    /// Registered workflow types, sorted.
    #[must_use]
    pub fn workflow_types(&self) -> Vec<String> {
        let mut types: Vec<_> = self.definitions.read().keys().cloned().collect();
        types.sort();
        types
    }
}

fn validate(definition: &SagaDefinition) -> Result<(), DefinitionError> {
    let workflow_type = definition.workflow_type();
    if definition.steps().is_empty() {
        return Err(DefinitionError::EmptySteps {
            workflow_type: workflow_type.to_string(),
        });
    }

    let mut ids = HashSet::new();
    for step in definition.steps() {
        if !ids.insert(step.id()) {
            return Err(DefinitionError::DuplicateStepId {
                workflow_type: workflow_type.to_string(),
                step_id: step.id().to_string(),
            });
        }
    }

    for step in definition.steps() {
        if let Some(dependency) = step
            .dependencies()
            .iter()
            .find(|dependency| !ids.contains(dependency.as_str()))
        {
            return Err(DefinitionError::UnknownDependency {
                workflow_type: workflow_type.to_string(),
                step_id: step.id().to_string(),
                dependency: dependency.clone(),
            });
        }
    }

    if let Some(step_id) = definition
        .critical_steps()
        .into_iter()
        .flatten()
        .find(|step_id| !ids.contains(step_id.as_str()))
    {
        return Err(DefinitionError::UnknownCriticalStep {
            workflow_type: workflow_type.to_string(),
            step_id: step_id.clone(),
        });
    }

    Ok(())
}
