//! Scripted steps shared by the engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sagaflow_engine::{EngineConfig, SagaContext, SagaEngine, SagaStep, StepError, StepOutput};
use sagaflow_store::InMemorySagaStore;
use serde_json::Value;

/// Ordered record of every forward and compensating invocation.
#[derive(Debug, Default, Clone)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn push(&self, entry: String) {
        self.entries.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().iter().filter(|e| *e == entry).count()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Compensation {
    Succeed,
    Fail,
    Hang,
}

/// A step whose behavior is fixed up front.
///
/// It fails its first `failures` invocations, then returns `data`.
pub struct ScriptedStep {
    id: &'static str,
    journal: Journal,
    failures: u32,
    calls: AtomicU32,
    data: Option<Value>,
    compensation: Compensation,
}

impl ScriptedStep {
    pub fn ok(id: &'static str, journal: &Journal) -> Self {
        Self {
            id,
            journal: journal.clone(),
            failures: 0,
            calls: AtomicU32::new(0),
            data: None,
            compensation: Compensation::Succeed,
        }
    }

    pub fn failing(id: &'static str, journal: &Journal) -> Self {
        Self::ok(id, journal).fail_first(u32::MAX)
    }

    #[must_use]
    pub fn fail_first(mut self, failures: u32) -> Self {
        self.failures = failures;
        self
    }

    #[must_use]
    pub fn returning(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn compensation(mut self, compensation: Compensation) -> Self {
        self.compensation = compensation;
        self
    }
}

#[async_trait]
impl SagaStep for ScriptedStep {
    async fn execute(&self, _ctx: &SagaContext) -> Result<StepOutput, StepError> {
        self.journal.push(format!("execute {}", self.id));
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(StepError::rejected(format!("{} refused", self.id)).with_recoverable(true));
        }
        Ok(StepOutput {
            data: self.data.clone(),
        })
    }

    async fn compensate(&self, _ctx: &SagaContext) -> Result<(), StepError> {
        self.journal.push(format!("compensate {}", self.id));
        match self.compensation {
            Compensation::Succeed => Ok(()),
            Compensation::Fail => Err(StepError::failed(format!("{} cleanup failed", self.id))),
            Compensation::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

/// Backoff short enough that retry tests finish quickly.
pub fn fast_config() -> EngineConfig {
    EngineConfig::default().with_retry_backoff(Duration::from_millis(1), Duration::from_millis(4))
}

pub fn memory_engine() -> (SagaEngine, Arc<InMemorySagaStore>) {
    let store = Arc::new(InMemorySagaStore::new());
    let engine = SagaEngine::new(store.clone()).with_config(fast_config());
    (engine, store)
}
