use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
};

use crate::app::AppState;
use crate::error::ApiError;
use crate::policy::{AuthorizationContext, RequestScope, SecureQuery};

/// Request body that has passed the query policy.
///
/// Reads the `AuthorizationContext` attached by the authenticator, the tenant
/// header if the configured mode uses one, and the raw body. Handlers only
/// ever see the committed query.
#[derive(Debug)]
pub struct PolicyCompliant(pub SecureQuery);

#[async_trait]
impl FromRequest<AppState> for PolicyCompliant {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = req.extensions().get::<AuthorizationContext>().cloned();
        let tenant_header = state
            .policy
            .mode()
            .tenant_header()
            .and_then(|name| req.headers().get(name))
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = Bytes::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::payload_too_large(rejection.body_text())
            } else {
                ApiError::bad_request_with_details("Failed to read request body", rejection.body_text())
            }
        })?;

        let scope = RequestScope {
            auth: auth.as_ref(),
            tenant_header: tenant_header.as_deref(),
        };
        let query = state.policy.evaluate(&body, scope)?;

        Ok(PolicyCompliant(query))
    }
}
