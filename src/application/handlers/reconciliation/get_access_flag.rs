//! Read side: access flag queries and the feature gate.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::billing::AccessFlagView;
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::AccessFlagReader;

/// Query for a user's access flag.
#[derive(Debug, Clone)]
pub struct GetAccessFlagQuery {
    pub user_id: UserId,
}

pub struct GetAccessFlagHandler {
    reader: Arc<dyn AccessFlagReader>,
}

impl GetAccessFlagHandler {
    pub fn new(reader: Arc<dyn AccessFlagReader>) -> Self {
        Self { reader }
    }

    pub async fn handle(&self, query: GetAccessFlagQuery) -> Result<AccessFlagView, DomainError> {
        self.reader.get_access_flag(&query.user_id).await
    }
}

/// Why a gated operation was refused.
#[derive(Debug, Error)]
pub enum AccessDenied {
    #[error("inactive plan")]
    InactivePlan,

    #[error("access check failed: {0}")]
    Store(#[from] DomainError),
}

/// Guard for paid features.
#[derive(Clone)]
pub struct AccessGate {
    reader: Arc<dyn AccessFlagReader>,
}

impl AccessGate {
    pub fn new(reader: Arc<dyn AccessFlagReader>) -> Self {
        Self { reader }
    }

    /// Returns the flag when it is active, `InactivePlan` otherwise.
    pub async fn require_active(&self, user_id: &UserId) -> Result<AccessFlagView, AccessDenied> {
        let view = self.reader.get_access_flag(user_id).await?;
        if view.is_active {
            Ok(view)
        } else {
            Err(AccessDenied::InactivePlan)
        }
    }
}
