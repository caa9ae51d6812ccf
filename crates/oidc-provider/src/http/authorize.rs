//! Authorization endpoint handler (`GET|POST /authorize`).

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{OriginalUri, State},
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::authenticator::Prompt;
use crate::oauth::authorize::{AuthorizeOutcome, AuthorizeResponse};
use crate::oauth::params::AuthRequest;
use crate::provider::OpenIdProvider;

use super::error_response;

/// Handles authorization requests.
///
/// Successful responses and errors with a trusted `redirect_uri` are
/// delivered as `302 Found`, with parameters in the query (code flow) or
/// fragment (implicit and hybrid). Errors without a trusted `redirect_uri`
/// are rendered as a JSON body.
pub async fn authorize_handler(
    State(provider): State<Arc<OpenIdProvider>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method != Method::GET && method != Method::POST {
        return (StatusCode::BAD_REQUEST, "Method must be GET or POST").into_response();
    }

    let request = AuthRequest::new(method, uri, headers, &body);

    match provider.authorize(&request).await {
        AuthorizeOutcome::NotServing => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        AuthorizeOutcome::Prompt(prompt) => prompt_response(prompt),
        AuthorizeOutcome::Reload { location } => {
            (StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, location)]).into_response()
        }
        AuthorizeOutcome::Respond(response) => deliver(response),
    }
}

fn prompt_response(prompt: Prompt) -> Response {
    let status = StatusCode::from_u16(prompt.status).unwrap_or(StatusCode::OK);
    (
        status,
        [(header::CONTENT_TYPE, prompt.content_type)],
        prompt.body,
    )
        .into_response()
}

fn deliver(response: AuthorizeResponse) -> Response {
    let AuthorizeResponse {
        result,
        mode,
        redirect_uri,
    } = response;

    if let Some(redirect_uri) = redirect_uri {
        let location = match &result {
            Ok(success) => success.to_redirect_url(&redirect_uri, mode),
            Err(err) => err.to_redirect_url(&redirect_uri, mode),
        };
        match location {
            Ok(location) => {
                return (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redirect URI cannot carry the response");
            }
        }
    }

    match result {
        Ok(success) => (StatusCode::OK, Json(success)).into_response(),
        Err(err) => error_response(err, &[]),
    }
}
