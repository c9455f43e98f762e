//! Maps an event's correlation data to a local user.

use crate::domain::billing::{EmailAddress, User, STRIPE_PROVIDER};
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::ReconciliationTx;

/// Resolves the user an event belongs to.
///
/// Resolution order:
/// 1. email of an existing user
/// 2. email with no user: a billing-only account is created
/// 3. provider customer id already bound to a user by the ledger
///
/// `Ok(None)` means the event cannot be tied to anyone yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityResolver;

impl IdentityResolver {
    pub async fn resolve(
        &self,
        tx: &mut dyn ReconciliationTx,
        email: Option<&EmailAddress>,
        customer_id: Option<&str>,
    ) -> Result<Option<UserId>, DomainError> {
        if let Some(email) = email {
            if let Some(user) = tx.find_user_by_email(email).await? {
                return Ok(Some(user.id));
            }

            let created = tx.insert_user(&User::billing_only(email.clone())).await?;
            tracing::info!(user_id = %created.id, "created billing-only account");
            return Ok(Some(created.id));
        }

        match customer_id {
            Some(customer_id) => tx.find_user_by_customer_id(STRIPE_PROVIDER, customer_id).await,
            None => Ok(None),
        }
    }
}
