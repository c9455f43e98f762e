//! GetAccountHandler - Resolves a verified identity to a local account.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::domain::billing::{EmailAddress, Role, User};
use crate::domain::foundation::{AuthenticatedIdentity, DomainError, UserId};
use crate::ports::{AccessFlagReader, UserDirectory};

/// Account summary with the current entitlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    #[serde(skip)]
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
    pub plan: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Error)]
pub enum AccountError {
    /// Token carried no usable email.
    #[error("identity has no email")]
    MissingEmail,

    #[error("user not found")]
    UserNotFound,

    #[error(transparent)]
    Store(#[from] DomainError),
}

pub struct GetAccountHandler {
    directory: Arc<dyn UserDirectory>,
    reader: Arc<dyn AccessFlagReader>,
}

impl GetAccountHandler {
    pub fn new(directory: Arc<dyn UserDirectory>, reader: Arc<dyn AccessFlagReader>) -> Self {
        Self { directory, reader }
    }

    /// Finds the local user the identity's email belongs to.
    pub async fn resolve_user(&self, identity: &AuthenticatedIdentity) -> Result<User, AccountError> {
        let email = identity
            .email
            .as_deref()
            .and_then(|raw| EmailAddress::parse(raw).ok())
            .ok_or(AccountError::MissingEmail)?;

        self.directory
            .find_by_email(&email)
            .await?
            .ok_or(AccountError::UserNotFound)
    }

    pub async fn handle(&self, identity: &AuthenticatedIdentity) -> Result<AccountView, AccountError> {
        let user = self.resolve_user(identity).await?;
        let flag = self.reader.get_access_flag(&user.id).await?;

        Ok(AccountView {
            user_id: user.id,
            email: user.email.to_string(),
            role: user.role,
            plan: flag.plan,
            is_active: flag.is_active,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryReconciliationStore;

    fn handler(store: &Arc<InMemoryReconciliationStore>) -> GetAccountHandler {
        GetAccountHandler::new(store.clone(), store.clone())
    }

    #[tokio::test]
    async fn known_email_returns_account() {
        let store = Arc::new(InMemoryReconciliationStore::new());
        let user = store.seed_user(&EmailAddress::parse("erin@x.com").unwrap()).await;

        let identity = AuthenticatedIdentity::new("sub_1", Some("Erin@X.com".to_string()));
        let account = handler(&store).handle(&identity).await.unwrap();

        assert_eq!(account.user_id, user.id);
        assert_eq!(account.email, "erin@x.com");
        assert_eq!(account.role, Role::User);
        assert!(!account.is_active);
        assert!(account.plan.is_none());
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        let store = Arc::new(InMemoryReconciliationStore::new());
        let identity = AuthenticatedIdentity::new("sub_1", Some("ghost@x.com".to_string()));

        let err = handler(&store).handle(&identity).await.unwrap_err();

        assert!(matches!(err, AccountError::UserNotFound));
    }

    #[tokio::test]
    async fn identity_without_email_is_rejected() {
        let store = Arc::new(InMemoryReconciliationStore::new());
        let identity = AuthenticatedIdentity::new("sub_1", None);

        let err = handler(&store).handle(&identity).await.unwrap_err();

        assert!(matches!(err, AccountError::MissingEmail));
    }
}
