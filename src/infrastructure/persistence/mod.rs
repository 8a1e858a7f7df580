//! Document store adapters
//!
//! Implements `DocumentStorePort` in memory and on SQLite, plus the factory
//! that picks one from configuration.

mod factory;
mod memory_store;
mod sqlite_store;

pub use factory::{DocumentStoreBackend, DocumentStoreFactory};
pub use memory_store::InMemoryDocumentStore;
pub use sqlite_store::SqliteDocumentStore;
