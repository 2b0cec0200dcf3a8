use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-saga exclusive leases.
///
/// Only the holder of a saga's lease may advance that saga. Slots are created
/// on first use and dropped once nobody holds or waits for them.
#[derive(Debug, Default)]
pub(crate) struct LeaseTable {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl LeaseTable {
    pub(crate) async fn acquire(&self, saga_id: &str) -> Lease<'_> {
        let slot = Arc::clone(self.slots.lock().entry(saga_id.to_string()).or_default());
        let guard = slot.lock_owned().await;
        Lease {
            table: self,
            saga_id: saga_id.to_string(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots.lock().len()
    }
}

#[derive(Debug)]
pub(crate) struct Lease<'a> {
    table: &'a LeaseTable,
    saga_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        let mut slots = self.table.slots.lock();
        self.guard.take();
        if slots
            .get(&self.saga_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.saga_id);
        }
    }
}
