//! Response DTOs for access endpoints.

use serde::Serialize;

use crate::application::AccountView;
use crate::domain::billing::{AccessFlagView, Role};

/// Current entitlement of the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessResponse {
    pub plan: Option<String>,
    pub is_active: bool,
}

impl From<AccessFlagView> for AccessResponse {
    fn from(view: AccessFlagView) -> Self {
        Self {
            plan: view.plan,
            is_active: view.is_active,
        }
    }
}

/// Returned by the access gate when the plan is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessCheckResponse {
    pub ok: bool,
    pub plan: Option<String>,
}

/// Caller's account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountResponse {
    pub email: String,
    pub role: Role,
    pub plan: Option<String>,
    pub is_active: bool,
}

impl From<AccountView> for AccountResponse {
    fn from(view: AccountView) -> Self {
        Self {
            email: view.email,
            role: view.role,
            plan: view.plan,
            is_active: view.is_active,
        }
    }
}
