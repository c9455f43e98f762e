//! Ports - Interfaces between the reconciliation core and the outside world.
//!
//! The application layer depends only on these traits; adapters provide
//! the Postgres, in-memory, and identity-provider implementations.

mod access_flag_reader;
mod identity_verifier;
mod reconciliation_store;
mod user_directory;

pub use access_flag_reader::AccessFlagReader;
pub use identity_verifier::{IdentityVerifier, KeySetCache, KeySetFetcher};
pub use reconciliation_store::{InsertResult, ReconciliationStore, ReconciliationTx};
pub use user_directory::{StoreHealth, UserDirectory};
