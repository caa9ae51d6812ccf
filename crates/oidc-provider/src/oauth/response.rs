//! Authorization and token endpoint responses.
//!
//! Every protocol operation produces an [`AuthResponse`]: either a success
//! carrying the issued artifacts or an error carrying an OAuth 2.0 error code.
//! Transport hints (status code, extra headers) ride on the error value and
//! are never serialized.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::oauth::flow::ResponseMode;

/// Result of an authorization or token request.
pub type AuthResponse = Result<AuthSuccessResponse, AuthErrorResponse>;

// ============================================================================
// Success
// ============================================================================

/// Successful authorization or token response.
///
/// Fields that were not issued are omitted from the serialized form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSuccessResponse {
    /// Authorization code (code and hybrid flows).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Echoed `state` parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Signed ID token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Signed access token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Access token type, always `bearer`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Access token lifetime in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl AuthSuccessResponse {
    /// Sets the echoed state, ignoring an empty value.
    #[must_use]
    pub fn with_state(mut self, state: &str) -> Self {
        self.state = non_empty(state);
        self
    }

    /// Returns the populated fields as name/value pairs in wire order.
    #[must_use]
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(ref code) = self.code {
            pairs.push(("code", code.clone()));
        }
        if let Some(ref access_token) = self.access_token {
            pairs.push(("access_token", access_token.clone()));
        }
        if let Some(ref token_type) = self.token_type {
            pairs.push(("token_type", token_type.clone()));
        }
        if let Some(expires_in) = self.expires_in {
            pairs.push(("expires_in", expires_in.to_string()));
        }
        if let Some(ref id_token) = self.id_token {
            pairs.push(("id_token", id_token.clone()));
        }
        if let Some(ref state) = self.state {
            pairs.push(("state", state.clone()));
        }
        pairs
    }

    /// Builds the redirect URL carrying this response.
    ///
    /// # Errors
    ///
    /// Returns an error if `redirect_uri` is not an absolute URL.
    pub fn to_redirect_url(
        &self,
        redirect_uri: &str,
        mode: ResponseMode,
    ) -> Result<String, url::ParseError> {
        encode_redirect(redirect_uri, mode, &self.pairs())
    }
}

// ============================================================================
// Error
// ============================================================================

/// OAuth 2.0 / OpenID Connect error codes used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is missing a parameter or is otherwise malformed.
    InvalidRequest,
    /// Client authentication failed.
    InvalidClient,
    /// The authorization code is invalid, expired, or was issued to another client.
    InvalidGrant,
    /// The grant type is not supported by this provider.
    UnsupportedGrantType,
    /// The end-user or provider denied the request.
    AccessDenied,
    /// End-user authentication is required but was not completed.
    LoginRequired,
    /// The provider hit an unexpected condition.
    ServerError,
}

impl ErrorCode {
    /// Returns the wire value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::AccessDenied => "access_denied",
            Self::LoginRequired => "login_required",
            Self::ServerError => "server_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error response of the authorization or token endpoint.
///
/// # Example
///
/// ```ignore
/// HTTP/1.1 302 Found
/// Location: https://app.example.com/callback?
///   error=invalid_request
///   &error_description=Scope+doesn%27t+contain+openid
///   &state=abc123xyz
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthErrorResponse {
    /// OAuth 2.0 error code.
    pub error: ErrorCode,

    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,

    /// URI of a page describing the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,

    /// Echoed `state` parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// HTTP status to use when rendered directly. Defaults to 400.
    #[serde(skip)]
    pub status_code: Option<u16>,

    /// Extra headers to send with a directly rendered error.
    #[serde(skip)]
    pub headers: Vec<(String, String)>,
}

impl AuthErrorResponse {
    /// Creates an error with the given code.
    #[must_use]
    pub fn new(error: ErrorCode) -> Self {
        Self {
            error,
            error_description: None,
            error_uri: None,
            state: None,
            status_code: None,
            headers: Vec::new(),
        }
    }

    /// `invalid_request` with a description.
    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest).with_description(description)
    }

    /// `invalid_client` with a description.
    #[must_use]
    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidClient).with_description(description)
    }

    /// `invalid_grant` with a description.
    #[must_use]
    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidGrant).with_description(description)
    }

    /// `access_denied` with a description.
    #[must_use]
    pub fn access_denied(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::AccessDenied).with_description(description)
    }

    /// `server_error` with a description.
    #[must_use]
    pub fn server_error(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServerError).with_description(description)
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.error_description = Some(description.into());
        self
    }

    /// Sets the echoed state, ignoring an empty value.
    #[must_use]
    pub fn with_state(mut self, state: &str) -> Self {
        self.state = non_empty(state);
        self
    }

    /// Sets the HTTP status used when the error is rendered directly.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    /// Adds a header sent when the error is rendered directly.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// HTTP status for direct rendering.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status_code.unwrap_or(400)
    }

    /// Returns the populated fields as name/value pairs in wire order.
    #[must_use]
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("error", self.error.as_str().to_string())];
        if let Some(ref description) = self.error_description {
            pairs.push(("error_description", description.clone()));
        }
        if let Some(ref uri) = self.error_uri {
            pairs.push(("error_uri", uri.clone()));
        }
        if let Some(ref state) = self.state {
            pairs.push(("state", state.clone()));
        }
        pairs
    }

    /// Builds the redirect URL carrying this error.
    ///
    /// # Errors
    ///
    /// Returns an error if `redirect_uri` is not an absolute URL.
    pub fn to_redirect_url(
        &self,
        redirect_uri: &str,
        mode: ResponseMode,
    ) -> Result<String, url::ParseError> {
        encode_redirect(redirect_uri, mode, &self.pairs())
    }
}

impl fmt::Display for AuthErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error_description {
            Some(ref description) => write!(f, "{}: {}", self.error, description),
            None => write!(f, "{}", self.error),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Appends `pairs` to the query or fragment of `redirect_uri`, keeping any
/// parameters already present there.
fn encode_redirect(
    redirect_uri: &str,
    mode: ResponseMode,
    pairs: &[(&'static str, String)],
) -> Result<String, url::ParseError> {
    let mut url = Url::parse(redirect_uri)?;
    match mode {
        ResponseMode::Query => {
            let mut query = url.query_pairs_mut();
            for (name, value) in pairs {
                query.append_pair(name, value);
            }
        }
        ResponseMode::Fragment => {
            let mut fragment = url::form_urlencoded::Serializer::new(String::new());
            if let Some(existing) = url.fragment() {
                fragment.extend_pairs(url::form_urlencoded::parse(existing.as_bytes()));
            }
            for (name, value) in pairs {
                fragment.append_pair(name, value);
            }
            let fragment = fragment.finish();
            url.set_fragment(Some(&fragment));
        }
    }
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_query_redirect() {
        let response = AuthSuccessResponse {
            code: Some("abc".to_string()),
            ..Default::default()
        }
        .with_state("xyz");

        let url = response
            .to_redirect_url("https://app.example.com/cb?keep=1", ResponseMode::Query)
            .unwrap();
        assert_eq!(url, "https://app.example.com/cb?keep=1&code=abc&state=xyz");
    }

    #[test]
    fn test_success_fragment_redirect() {
        let response = AuthSuccessResponse {
            id_token: Some("header.payload.sig".to_string()),
            access_token: Some("tok".to_string()),
            token_type: Some("bearer".to_string()),
            expires_in: Some(300),
            ..Default::default()
        };

        let url = response
            .to_redirect_url("https://app.example.com/cb", ResponseMode::Fragment)
            .unwrap();
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.query(), None);
        let fragment: Vec<(String, String)> =
            url::form_urlencoded::parse(parsed.fragment().unwrap().as_bytes())
                .into_owned()
                .collect();
        assert!(fragment.contains(&("id_token".to_string(), "header.payload.sig".to_string())));
        assert!(fragment.contains(&("expires_in".to_string(), "300".to_string())));
        assert!(fragment.contains(&("token_type".to_string(), "bearer".to_string())));
    }

    #[test]
    fn test_fragment_keeps_existing_fragment_params() {
        let err = AuthErrorResponse::access_denied("no").with_state("s1");
        let url = err
            .to_redirect_url("myapp://cb#tab=2", ResponseMode::Fragment)
            .unwrap();
        assert!(url.starts_with("myapp://cb#tab=2&error=access_denied"));
        assert!(url.ends_with("state=s1"));
    }

    #[test]
    fn test_error_json_shape() {
        let err = AuthErrorResponse::invalid_request("Scope doesn't contain openid")
            .with_state("")
            .with_status(401)
            .with_header("WWW-Authenticate", "Basic realm=openid");

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["error"], "invalid_request");
        assert_eq!(json["error_description"], "Scope doesn't contain openid");
        assert!(json.get("state").is_none());
        assert!(json.get("status_code").is_none());
        assert!(json.get("headers").is_none());
        assert_eq!(err.status(), 401);
    }

    #[test]
    fn test_error_default_status() {
        assert_eq!(AuthErrorResponse::new(ErrorCode::InvalidGrant).status(), 400);
    }

    #[test]
    fn test_success_json_omits_missing_fields() {
        let response = AuthSuccessResponse {
            access_token: Some("a".to_string()),
            id_token: Some("i".to_string()),
            token_type: Some("bearer".to_string()),
            expires_in: Some(300),
            ..Default::default()
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("code"));
        assert!(!json.contains("state"));
        assert!(json.contains(r#""token_type":"bearer""#));
    }

    #[test]
    fn test_error_code_strings() {
        assert_eq!(ErrorCode::LoginRequired.as_str(), "login_required");
        assert_eq!(ErrorCode::UnsupportedGrantType.to_string(), "unsupported_grant_type");
        assert_eq!(
            serde_json::to_string(&ErrorCode::ServerError).unwrap(),
            r#""server_error""#
        );
    }

    #[test]
    fn test_unparsable_redirect_uri() {
        let err = AuthErrorResponse::invalid_request("x");
        assert!(err.to_redirect_url("not a url", ResponseMode::Query).is_err());
    }
}
