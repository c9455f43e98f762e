//! Identity verification adapters.

mod chained;
mod jwks;
pub(crate) mod key_set_cache;
mod legacy;
mod static_verifier;

pub use chained::ChainedIdentityVerifier;
pub use jwks::JwksIdentityVerifier;
pub use key_set_cache::{HttpKeySetFetcher, TtlKeySetCache, DEFAULT_KEY_SET_TTL};
pub use legacy::LegacyTokenVerifier;
pub use static_verifier::StaticIdentityVerifier;
