//! Durable stores for saga records.
//!
//! [`SagaStore`] is the contract the engine persists through. Two
//! implementations ship with the crate: [`InMemorySagaStore`] for tests and
//! embedding, and [`FileSystemSagaStore`] which keeps one JSON document per
//! saga on disk.

mod error;
mod file_system;
mod memory;
mod store;

pub use error::{Result, StoreError};
pub use file_system::FileSystemSagaStore;
pub use memory::InMemorySagaStore;
pub use store::SagaStore;
