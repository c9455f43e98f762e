//! UserDirectory port - Lookup of local accounts for authenticated requests.

use async_trait::async_trait;

use crate::domain::billing::{EmailAddress, User};
use crate::domain::foundation::DomainError;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Finds a user by normalized email.
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, DomainError>;
}

/// Liveness probe for the backing store.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    /// Succeeds when the store answers a trivial query.
    async fn ping(&self) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_ports_are_object_safe() {
        fn _accepts_directory(_d: &dyn UserDirectory) {}
        fn _accepts_health(_h: &dyn StoreHealth) {}
    }
}
