//! Axum handlers for the provider endpoints.
//!
//! - [`authorize`] - `GET|POST /authorize`
//! - [`token`] - `POST /token`
//! - [`jwks`] - `GET /jwks`

pub mod authorize;
pub mod jwks;
pub mod token;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
};

use crate::oauth::response::AuthErrorResponse;
use crate::provider::OpenIdProvider;

pub use authorize::authorize_handler;
pub use jwks::jwks_handler;
pub use token::token_handler;

/// Builds the provider router.
///
/// `/authorize` and `/token` accept any method so that unsupported methods
/// get a protocol error instead of a bare `405`.
pub fn router(provider: Arc<OpenIdProvider>) -> Router {
    Router::new()
        .route("/authorize", any(authorize_handler))
        .route("/token", any(token_handler))
        .route("/jwks", get(jwks_handler))
        .with_state(provider)
}

/// Renders `err` as a JSON body, applying the status and headers it carries
/// plus `extra`.
pub(crate) fn error_response(
    err: AuthErrorResponse,
    extra: &[(HeaderName, &'static str)],
) -> Response {
    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::BAD_REQUEST);

    let mut headers = HeaderMap::new();
    for (name, value) in &err.headers {
        match (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping invalid error header"),
        }
    }
    for (name, value) in extra {
        headers.insert(name.clone(), HeaderValue::from_static(value));
    }

    (status, headers, Json(err)).into_response()
}
