//! HTTP handlers for access and account endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::error::ErrorResponse;
use crate::adapters::http::middleware::RequireAuth;
use crate::adapters::http::state::AppState;
use crate::application::{AccessDenied, AccountError, GetAccessFlagQuery};
use crate::domain::billing::AccessFlagView;

use super::dto::{AccessCheckResponse, AccessResponse, AccountResponse};

/// GET /access - Current plan and active flag.
///
/// A caller with no local account has no entitlement and reads inactive.
pub async fn get_access(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<impl IntoResponse, AccessApiError> {
    let user = match state.account_handler.resolve_user(&identity).await {
        Ok(user) => user,
        Err(AccountError::UserNotFound) => {
            return Ok(Json(AccessResponse::from(AccessFlagView::inactive())));
        }
        Err(e) => return Err(e.into()),
    };

    let view = state
        .access_flag_handler
        .handle(GetAccessFlagQuery { user_id: user.id })
        .await
        .map_err(AccountError::from)?;

    Ok(Json(AccessResponse::from(view)))
}

/// GET /access/verify - Succeeds only for an active plan.
pub async fn verify_access(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<impl IntoResponse, AccessApiError> {
    let user = state.account_handler.resolve_user(&identity).await?;
    let view = state.access_gate.require_active(&user.id).await?;

    Ok(Json(AccessCheckResponse {
        ok: true,
        plan: view.plan,
    }))
}

/// GET /me - Caller's account with entitlement.
pub async fn get_me(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<impl IntoResponse, AccessApiError> {
    let account = state.account_handler.handle(&identity).await?;
    Ok(Json(AccountResponse::from(account)))
}

/// API error type for access endpoints.
#[derive(Debug)]
pub enum AccessApiError {
    Account(AccountError),
    Denied(AccessDenied),
}

impl From<AccountError> for AccessApiError {
    fn from(err: AccountError) -> Self {
        Self::Account(err)
    }
}

impl From<AccessDenied> for AccessApiError {
    fn from(err: AccessDenied) -> Self {
        Self::Denied(err)
    }
}

impl IntoResponse for AccessApiError {
    fn into_response(self) -> Response {
        match self {
            AccessApiError::Account(AccountError::MissingEmail) => {
                ErrorResponse::new("MISSING_EMAIL", "Token carries no email")
                    .with_status(StatusCode::UNAUTHORIZED)
            }
            AccessApiError::Account(AccountError::UserNotFound) => {
                ErrorResponse::not_found("User not found").with_status(StatusCode::NOT_FOUND)
            }
            AccessApiError::Denied(AccessDenied::InactivePlan) => {
                ErrorResponse::forbidden("inactive plan").with_status(StatusCode::FORBIDDEN)
            }
            AccessApiError::Account(AccountError::Store(e))
            | AccessApiError::Denied(AccessDenied::Store(e)) => {
                tracing::error!(error = %e, "access lookup failed");
                ErrorResponse::internal("Internal server error")
                    .with_status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
