use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sagaflow_core::{SagaInstance, SagaRecord};
use sagaflow_store::SagaStore;
use tracing::debug;

use crate::config::EngineConfig;
use crate::definition::SagaDefinition;
use crate::error::{DefinitionError, SagaError};
use crate::events::{EventPublisher, NoopPublisher, SagaEvent};
use crate::lease::LeaseTable;
use crate::registry::DefinitionRegistry;

/// Runs saga definitions against a durable store.
///
/// The engine is meant to be shared (`Arc<SagaEngine>`) between tasks. Each
/// saga id is advanced by one execution or compensation pass at a time; the
/// pass publishes a snapshot of the instance to the active cache every time
/// it persists, which is what [`get_saga_instance`](Self::get_saga_instance)
/// returns while the saga is running.
pub struct SagaEngine {
    registry: DefinitionRegistry,
    store: Arc<dyn SagaStore>,
    publisher: Arc<dyn EventPublisher>,
    config: EngineConfig,
    active: RwLock<HashMap<String, SagaInstance>>,
    pub(crate) leases: LeaseTable,
}

impl SagaEngine {
    #[must_use]
    pub fn new(store: Arc<dyn SagaStore>) -> Self {
        Self {
            registry: DefinitionRegistry::new(),
            store,
            publisher: Arc::new(NoopPublisher),
            config: EngineConfig::default(),
            active: RwLock::new(HashMap::new()),
            leases: LeaseTable::default(),
        }
    }

    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers a saga definition. See [`DefinitionRegistry::register`].
    ///
    /// # Errors
    ///
    /// Returns an error if the definition is invalid; it is not stored.
    pub fn register_saga(&self, definition: SagaDefinition) -> Result<(), DefinitionError> {
        self.registry.register(definition)
    }

    #[must_use]
    pub fn definition(&self, workflow_type: &str) -> Option<Arc<SagaDefinition>> {
        self.registry.get(workflow_type)
    }

    #[must_use]
    pub fn registered_types(&self) -> Vec<String> {
        self.registry.workflow_types()
    }

    /// Ids of sagas currently held in the active cache, sorted.
    #[must_use]
    pub fn active_saga_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.active.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Looks a saga up in the active cache, then in the durable store.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored record cannot be read or rehydrated.
    pub async fn get_saga_instance(&self, saga_id: &str) -> Result<Option<SagaInstance>, SagaError> {
        let cached = self.active.read().get(saga_id).cloned();
        if cached.is_some() {
            return Ok(cached);
        }

        match self.store.load(saga_id).await? {
            Some(record) => Ok(Some(record.into_instance()?)),
            None => Ok(None),
        }
    }

    /// Stored sagas whose metadata mentions `aggregate_id`, newest first.
    ///
    /// The match is a substring search over the serialized metadata;
    /// `aggregate_type` only labels the query.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried or a record cannot be
    /// rehydrated.
    pub async fn get_saga_history(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Vec<SagaInstance>, SagaError> {
        let records = self.store.find_by_metadata(aggregate_id).await?;
        debug!(
            aggregate_type,
            aggregate_id,
            count = records.len(),
            "loaded saga history"
        );
        records
            .into_iter()
            .map(|record| record.into_instance().map_err(SagaError::from))
            .collect()
    }

    /// Every stored saga, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed or a record cannot be
    /// rehydrated.
    pub async fn list_sagas(&self) -> Result<Vec<SagaInstance>, SagaError> {
        self.store
            .list()
            .await?
            .into_iter()
            .map(|record| record.into_instance().map_err(SagaError::from))
            .collect()
    }

    /// Writes the instance through to the store, then refreshes the active
    /// cache snapshot.
    pub(crate) async fn persist(&self, instance: &SagaInstance) -> Result<(), SagaError> {
        let record = SagaRecord::from(instance);
        self.store
            .upsert(&record)
            .await
            .map_err(|source| SagaError::Persistence {
                saga_id: instance.id.clone(),
                source,
            })?;
        self.active
            .write()
            .insert(instance.id.clone(), instance.clone());
        Ok(())
    }

    pub(crate) fn evict(&self, saga_id: &str) {
        self.active.write().remove(saga_id);
    }

    pub(crate) fn announce(&self, event: &SagaEvent) {
        self.publisher.publish(event);
    }
}
