//! JWKS endpoint handler (`GET /jwks`).
//!
//! Publishes the provider's ES256 public key so relying parties can verify
//! ID tokens ([RFC 7517](https://tools.ietf.org/html/rfc7517)).

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::provider::OpenIdProvider;

/// Returns the public key set with a one hour cache lifetime.
pub async fn jwks_handler(State(provider): State<Arc<OpenIdProvider>>) -> Response {
    match provider.jwks() {
        Some(jwks) => (
            [(header::CACHE_CONTROL, "public, max-age=3600")],
            Json(jwks),
        )
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
