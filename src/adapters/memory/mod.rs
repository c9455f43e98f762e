//! In-memory adapters for tests and local development.

mod reconciliation_store;

pub use reconciliation_store::InMemoryReconciliationStore;
