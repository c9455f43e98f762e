//! AccessFlagReader port (read side).
//!
//! Feature-gated operations ask this port whether a user may use paid
//! features. A user without a flag is inactive with no plan.

use async_trait::async_trait;

use crate::domain::billing::AccessFlagView;
use crate::domain::foundation::{DomainError, UserId};

#[async_trait]
pub trait AccessFlagReader: Send + Sync {
    /// Returns the user's current access flag, defaulting to inactive.
    async fn get_access_flag(&self, user_id: &UserId) -> Result<AccessFlagView, DomainError>;
}
