//! Token endpoint handler (`POST /token`).
//!
//! ```text
//! POST /token
//! Content-Type: application/x-www-form-urlencoded
//! Authorization: Basic <base64(client_id:client_secret)>
//!
//! grant_type=authorization_code
//! &code=SplxlOBeZQQYbYS6WxSbIA
//! &redirect_uri=https://app.example.com/callback
//! &client_id=my-app
//! ```

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{OriginalUri, State},
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::oauth::params::AuthRequest;
use crate::oauth::response::AuthErrorResponse;
use crate::oauth::token::TokenOutcome;
use crate::provider::OpenIdProvider;

use super::error_response;

const NO_CACHE: [(header::HeaderName, &str); 2] = [
    (header::CACHE_CONTROL, "no-store"),
    (header::PRAGMA, "no-cache"),
];

/// Handles token requests.
pub async fn token_handler(
    State(provider): State<Arc<OpenIdProvider>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method != Method::POST {
        return error_response(
            AuthErrorResponse::invalid_request("Method must be POST"),
            &NO_CACHE,
        );
    }

    let config = provider.config();
    if config.require_tls && !is_tls(&uri, &headers, config.trust_forwarded_proto) {
        tracing::warn!("Token request over plain HTTP rejected");
        return error_response(
            AuthErrorResponse::invalid_request("TLS is required"),
            &NO_CACHE,
        );
    }

    let request = AuthRequest::new(method, uri, headers, &body);

    match provider.token(&request).await {
        TokenOutcome::NotServing => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        TokenOutcome::Respond(Ok(success)) => {
            (StatusCode::OK, NO_CACHE, Json(success)).into_response()
        }
        TokenOutcome::Respond(Err(err)) => error_response(err, &NO_CACHE),
    }
}

fn is_tls(uri: &axum::http::Uri, headers: &HeaderMap, trust_forwarded_proto: bool) -> bool {
    if uri.scheme_str() == Some("https") {
        return true;
    }

    trust_forwarded_proto
        && headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}
