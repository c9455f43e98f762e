//! PostgreSQL adapters - Database implementations of the reconciliation ports.

mod reconciliation_store;

pub use reconciliation_store::PostgresReconciliationStore;
