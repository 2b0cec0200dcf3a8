use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use sagaflow_core::SagaRecord;

use crate::Result;
use crate::error::StoreError;
use crate::store::{SagaStore, sort_newest_first};

/// Keeps serialized records in memory.
///
/// Records are stored as JSON text, so a load goes through the same
/// serialize/parse path as a real durable store.
#[derive(Debug, Default)]
pub struct InMemorySagaStore {
    records: RwLock<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl InMemorySagaStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Number of upserts performed so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw stored text for `saga_id`.
    #[must_use]
    pub fn raw(&self, saga_id: &str) -> Option<String> {
        self.records.read().get(saga_id).cloned()
    }
}

fn parse(id: &str, text: &str) -> Result<SagaRecord> {
    serde_json::from_str(text).map_err(|source| StoreError::Parse {
        id: id.to_string(),
        source,
    })
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn upsert(&self, record: &SagaRecord) -> Result<()> {
        let text = serde_json::to_string(record).map_err(|source| StoreError::Serialize {
            id: record.id.clone(),
            source,
        })?;
        self.records.write().insert(record.id.clone(), text);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, saga_id: &str) -> Result<Option<SagaRecord>> {
        let text = self.records.read().get(saga_id).cloned();
        text.map(|text| parse(saga_id, &text)).transpose()
    }

    async fn list(&self) -> Result<Vec<SagaRecord>> {
        let snapshot: Vec<(String, String)> = self
            .records
            .read()
            .iter()
            .map(|(id, text)| (id.clone(), text.clone()))
            .collect();
        let mut records = snapshot
            .iter()
            .map(|(id, text)| parse(id, text))
            .collect::<Result<Vec<_>>>()?;
        sort_newest_first(&mut records);
        Ok(records)
    }
}
