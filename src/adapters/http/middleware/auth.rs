//! Authentication middleware and extractors for axum.
//!
//! This module provides:
//! - `auth_middleware` - Layer that verifies Bearer tokens and injects the identity into extensions
//! - `RequireAuth` - Extractor that requires authentication
//!
//! The middleware uses the `IdentityVerifier` port, so the JWKS verifier,
//! the legacy HS256 fallback and the static test verifier all plug in the
//! same way.
//!
//! ```text
//! Request → auth_middleware → injects AuthenticatedIdentity into extensions
//!                                      ↓
//!                              Handler → RequireAuth extractor reads from extensions
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::domain::foundation::{AuthError, AuthenticatedIdentity};
use crate::ports::IdentityVerifier;

/// Auth middleware state - wraps the identity verifier.
pub type AuthState = Arc<dyn IdentityVerifier>;

/// Authentication middleware that verifies Bearer tokens.
///
/// A missing token passes through untouched so `RequireAuth` can reject it;
/// a token that fails verification is answered here.
pub async fn auth_middleware(
    State(verifier): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        return next.run(request).await;
    };

    match verifier.resolve_authenticated_identity(token).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => auth_error_response(&e),
    }
}

fn auth_error_response(err: &AuthError) -> Response {
    let (status, message) = match err {
        AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired"),
        AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
        AuthError::ServiceUnavailable(msg) => {
            tracing::error!("Identity provider unavailable: {}", msg);
            (StatusCode::SERVICE_UNAVAILABLE, "Authentication service unavailable")
        }
        AuthError::UserNotFound => (StatusCode::UNAUTHORIZED, "Authentication failed"),
    };

    (
        status,
        Json(serde_json::json!({
            "error": message,
            "code": "AUTH_ERROR"
        })),
    )
        .into_response()
}

/// Extractor that requires an authenticated identity.
///
/// ```ignore
/// async fn my_handler(RequireAuth(identity): RequireAuth) -> impl IntoResponse {
///     identity.subject
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthenticatedIdentity);

impl<S> axum::extract::FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            parts
                .extensions
                .get::<AuthenticatedIdentity>()
                .cloned()
                .map(RequireAuth)
                .ok_or(AuthRejection::Unauthenticated)
        })
    }
}

/// Rejection type for authentication failures.
#[derive(Debug, Clone)]
pub enum AuthRejection {
    /// No valid authentication token was provided.
    Unauthenticated,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthRejection::Unauthenticated => (StatusCode::UNAUTHORIZED, "Authentication required"),
        };

        (
            status,
            Json(serde_json::json!({
                "error": message,
                "code": "UNAUTHENTICATED"
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::auth::StaticIdentityVerifier;
    use axum::body::Body;
    use axum::extract::FromRequestParts;
    use axum::http::Request as HttpRequest;
    use axum::routing::get;
    use axum::{middleware, Router};
    use tower::ServiceExt;

    fn identity() -> AuthenticatedIdentity {
        AuthenticatedIdentity::new("user_123", Some("alice@example.com".to_string()))
    }

    fn app(verifier: StaticIdentityVerifier) -> Router {
        let state: AuthState = Arc::new(verifier);
        Router::new()
            .route(
                "/whoami",
                get(|RequireAuth(identity): RequireAuth| async move { identity.subject }),
            )
            .layer(middleware::from_fn_with_state(state, auth_middleware))
    }

    fn request(token: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/whoami");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn require_auth_extracts_identity_from_extensions() {
        let mut request: HttpRequest<()> = HttpRequest::builder().uri("/test").body(()).unwrap();
        request.extensions_mut().insert(identity());
        let (mut parts, _body) = request.into_parts();

        let RequireAuth(found) = RequireAuth::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(found.subject, "user_123");
    }

    #[tokio::test]
    async fn require_auth_fails_without_identity() {
        let request: HttpRequest<()> = HttpRequest::builder().uri("/test").body(()).unwrap();
        let (mut parts, _body) = request.into_parts();

        let result = RequireAuth::from_request_parts(&mut parts, &()).await;

        assert!(matches!(result, Err(AuthRejection::Unauthenticated)));
    }

    #[tokio::test]
    async fn valid_token_reaches_handler() {
        let app = app(StaticIdentityVerifier::new().with_token("good", identity()));

        let response = app.oneshot(request(Some("good"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_token_is_rejected_by_extractor() {
        let app = app(StaticIdentityVerifier::new());

        let response = app.oneshot(request(None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_token_is_unauthorized() {
        let app = app(StaticIdentityVerifier::new());

        let response = app.oneshot(request(Some("bogus"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn provider_outage_is_service_unavailable() {
        let app = app(
            StaticIdentityVerifier::new().with_error(AuthError::service_unavailable("jwks down")),
        );

        let response = app.oneshot(request(Some("any"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
