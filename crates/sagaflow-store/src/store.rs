use async_trait::async_trait;
use sagaflow_core::SagaRecord;

use crate::Result;

/// Durable storage for saga records, keyed by saga id.
///
/// The engine writes every state transition through [`upsert`](Self::upsert)
/// and treats the store as the single source of truth across restarts.
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Inserts or replaces the record stored under `record.id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or written.
    async fn upsert(&self, record: &SagaRecord) -> Result<()>;

    /// Loads the record stored under `saga_id`.
    /// Returns `Ok(None)` if no such record exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be read or parsed.
    async fn load(&self, saga_id: &str) -> Result<Option<SagaRecord>>;

    /// Lists every stored record, newest `started_at` first.
    ///
    /// # Errors
    ///
    /// Returns an error if any record cannot be read or parsed.
    async fn list(&self) -> Result<Vec<SagaRecord>>;

    /// Records whose serialized metadata contains `needle`, newest first.
    ///
    /// This is a plain substring match over the metadata text, not an
    /// indexed lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if any record cannot be read or parsed.
    async fn find_by_metadata(&self, needle: &str) -> Result<Vec<SagaRecord>> {
        let records = self.list().await?;
        Ok(records
            .into_iter()
            .filter(|record| record.metadata_text().contains(needle))
            .collect())
    }
}

pub(crate) fn sort_newest_first(records: &mut [SagaRecord]) {
    records.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| a.id.cmp(&b.id)));
}
