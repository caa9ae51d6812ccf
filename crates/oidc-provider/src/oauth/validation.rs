//! Authorization request validation.
//!
//! Four rule sets run in a fixed order:
//!
//! 1. [`validate_oauth_params`] - parameter syntax (RFC 6749 Appendix A)
//! 2. [`validate_scope_param`] - `scope` contains `openid`
//! 3. [`validate_required_params`] - required parameters, known flow,
//!    registered client, redirect URI policy, implicit flow nonce
//! 4. [`validate_subject`] - requested subject matches the authenticated
//!    end-user (runs after authentication)
//!
//! Each rule returns the protocol error to send, with `state` echoed.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::oauth::claims::ClaimsRequest;
use crate::oauth::flow::Flow;
use crate::oauth::params::AuthRequest;
use crate::oauth::response::AuthErrorResponse;
use crate::storage::{ApplicationType, ClientRegistry};
use crate::token::jwt::{IdTokenClaims, JwtService};

// ============================================================================
// Grammar (RFC 6749 Appendix A)
// ============================================================================

const VSCHAR: &str = r"^[\x20-\x7E]*$";
const NQSCHAR: &str = r"^[\x20-\x21\x23-\x5B\x5D-\x7E]*$";
const SCOPE: &str = r"^[\x21\x23-\x5B\x5D-\x7E]+( [\x21\x23-\x5B\x5D-\x7E]+)*$";
const RESPONSE_TYPE: &str = r"^[_0-9A-Za-z]+( [_0-9A-Za-z]+)*$";
const NAME_OR_URI: &str = r"^([-._0-9A-Za-z]+|[A-Za-z][A-Za-z0-9+.-]*:[\x21-\x7E]*)$";
const URI_REFERENCE: &str = r"^[\x21-\x7E]*$";
const DIGITS: &str = r"^[0-9]+$";
const UNICODE_NO_CRLF: &str =
    r"^[\x09\x20-\x7E\x{80}-\x{D7FF}\x{E000}-\x{FFFD}\x{10000}-\x{10FFFF}]*$";

/// Parameter name and the grammar its value must match, in check order.
const GRAMMAR_TABLE: [(&str, &str); 18] = [
    ("client_id", VSCHAR),
    ("client_secret", VSCHAR),
    ("response_type", RESPONSE_TYPE),
    ("scope", SCOPE),
    ("state", VSCHAR),
    ("redirect_uri", URI_REFERENCE),
    ("error", NQSCHAR),
    ("error_description", NQSCHAR),
    ("error_uri", URI_REFERENCE),
    ("grant_type", NAME_OR_URI),
    ("code", VSCHAR),
    ("access_token", VSCHAR),
    ("token_type", NAME_OR_URI),
    ("expires_in", DIGITS),
    ("username", UNICODE_NO_CRLF),
    ("password", UNICODE_NO_CRLF),
    ("refresh_token", VSCHAR),
    ("max_age", DIGITS),
];

static GRAMMAR: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    GRAMMAR_TABLE
        .into_iter()
        .map(|(name, pattern)| (name, Regex::new(pattern).expect("Invalid grammar regex")))
        .collect()
});

// ============================================================================
// Rules
// ============================================================================

/// Rule 1: every OAuth parameter present in the request matches its grammar.
///
/// All offending names are listed in the description.
///
/// # Errors
///
/// Returns `invalid_request` naming the malformed parameters.
pub fn validate_oauth_params(request: &AuthRequest) -> Result<(), AuthErrorResponse> {
    let malformed: Vec<&str> = GRAMMAR
        .iter()
        .filter(|(name, grammar)| {
            let value = request.param(name);
            !value.is_empty() && !grammar.is_match(value)
        })
        .map(|(name, _)| *name)
        .collect();

    if malformed.is_empty() {
        return Ok(());
    }

    tracing::debug!(params = %malformed.join(","), "Malformed request parameters");
    Err(AuthErrorResponse::invalid_request(format!(
        "One or more malformed request parameters: {}",
        malformed.join(";")
    ))
    .with_state(request.state()))
}

/// Rule 2: `scope` contains the `openid` token.
///
/// # Errors
///
/// Returns `invalid_request` otherwise.
pub fn validate_scope_param(request: &AuthRequest) -> Result<(), AuthErrorResponse> {
    if request.param("scope").split(' ').any(|token| token == "openid") {
        return Ok(());
    }

    Err(AuthErrorResponse::invalid_request("Scope doesn't contain openid").with_state(request.state()))
}

/// Rule 3: required parameters are present, `response_type` names a known
/// flow, the client is registered, the redirect URI passes the flow's
/// policy, and implicit requests carry a `nonce`.
///
/// # Errors
///
/// Returns `invalid_request` listing every failed check.
pub async fn validate_required_params(
    request: &AuthRequest,
    clients: &dyn ClientRegistry,
) -> Result<(), AuthErrorResponse> {
    let mut reasons = Vec::new();

    for name in ["scope", "response_type", "client_id", "redirect_uri"] {
        if request.param(name).is_empty() {
            reasons.push(format!("{name} missing"));
        }
    }

    let response_type = request.param("response_type");
    let flow = Flow::classify(response_type);
    if !response_type.is_empty() && !flow.is_known() {
        reasons.push("response_type not supported".to_string());
    }

    let client_id = request.param("client_id");
    let redirect_uri = request.param("redirect_uri");
    if !client_id.is_empty() {
        if !clients.is_client(client_id).await {
            reasons.push("client_id not registered".to_string());
        } else if !redirect_uri.is_empty()
            && !check_redirect_uri(redirect_uri, client_id, flow, clients).await
        {
            reasons.push("redirect_uri not allowed".to_string());
        }
    }

    if flow == Flow::Implicit && request.param("nonce").is_empty() {
        reasons.push("nonce missing".to_string());
    }

    if reasons.is_empty() {
        return Ok(());
    }

    tracing::debug!(client_id = %client_id, reasons = %reasons.join("; "), "Invalid request parameters");
    Err(AuthErrorResponse::invalid_request(format!(
        "One or more invalid request parameters: {}",
        reasons.join("; ")
    ))
    .with_state(request.state()))
}

/// Rule 4: a subject requested through `claims` or `id_token_hint` must be
/// the authenticated end-user.
///
/// # Errors
///
/// Returns `invalid_request` for a malformed `claims` parameter or an
/// `id_token_hint` not issued by this provider, and `access_denied` when
/// the requested subject differs from `subject`.
pub fn validate_subject(
    request: &AuthRequest,
    subject: &str,
    jwt: &JwtService,
) -> Result<(), AuthErrorResponse> {
    let state = request.state();

    let claims = ClaimsRequest::from_param(request.param("claims")).map_err(|e| {
        tracing::debug!(error = %e, "Unparsable claims parameter");
        AuthErrorResponse::invalid_request("claims parameter is malformed").with_state(state)
    })?;

    if let Some(ref claims) = claims {
        if claims
            .subject_constraints()
            .any(|constraint| !constraint.accepts(subject))
        {
            tracing::warn!("Requested sub claim does not match the authenticated end-user");
            return Err(AuthErrorResponse::access_denied(
                "Requested subject does not match the authenticated end-user",
            )
            .with_state(state));
        }
    }

    let hint = request.param("id_token_hint");
    if !hint.is_empty() {
        let hinted = jwt
            .decode_allow_expired::<IdTokenClaims>(hint)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected id_token_hint");
                AuthErrorResponse::invalid_request("id_token_hint is invalid").with_state(state)
            })?;

        if hinted.claims.sub != subject {
            tracing::warn!("id_token_hint subject does not match the authenticated end-user");
            return Err(AuthErrorResponse::access_denied(
                "id_token_hint subject does not match the authenticated end-user",
            )
            .with_state(state));
        }
    }

    Ok(())
}

// ============================================================================
// Redirect URI policy
// ============================================================================

/// Checks `redirect_uri` against the policy of `flow`.
///
/// - Implicit: `http` is allowed only for native clients redirecting to
///   `localhost`; `https` and custom schemes are accepted.
/// - Other flows: the URI must be registered for the client.
///
/// Unparsable URIs are always rejected.
pub async fn check_redirect_uri(
    redirect_uri: &str,
    client_id: &str,
    flow: Flow,
    clients: &dyn ClientRegistry,
) -> bool {
    let Ok(url) = Url::parse(redirect_uri) else {
        return false;
    };

    match flow {
        Flow::Implicit => {
            if url.scheme() != "http" {
                return true;
            }
            url.host_str() == Some("localhost")
                && clients.application_type(client_id).await == ApplicationType::Native
        }
        _ => clients.validate_redirect_uri(client_id, redirect_uri).await,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use axum::http::{HeaderMap, Method};

    use super::*;
    use crate::oauth::response::ErrorCode;
    use crate::storage::ClientAuthentication;
    use crate::token::jwt::SigningKeyPair;

    struct MockClients {
        clients: HashMap<String, (ApplicationType, Vec<String>)>,
    }

    impl MockClients {
        fn new() -> Self {
            let mut clients = HashMap::new();
            clients.insert(
                "web-app".to_string(),
                (
                    ApplicationType::Web,
                    vec!["https://app.example.com/cb".to_string()],
                ),
            );
            clients.insert(
                "native-app".to_string(),
                (ApplicationType::Native, vec!["myapp://cb".to_string()]),
            );
            Self { clients }
        }
    }

    #[async_trait]
    impl ClientRegistry for MockClients {
        async fn is_client(&self, client_id: &str) -> bool {
            self.clients.contains_key(client_id)
        }

        async fn application_type(&self, client_id: &str) -> ApplicationType {
            self.clients
                .get(client_id)
                .map(|(t, _)| *t)
                .unwrap_or_default()
        }

        async fn validate_redirect_uri(&self, client_id: &str, redirect_uri: &str) -> bool {
            self.clients
                .get(client_id)
                .is_some_and(|(_, uris)| uris.iter().any(|u| u == redirect_uri))
        }

        async fn authenticate_client(
            &self,
            _client_id: &str,
            _request: &AuthRequest,
        ) -> ClientAuthentication {
            ClientAuthentication::Authenticated
        }
    }

    fn request(query: &str) -> AuthRequest {
        AuthRequest::new(
            Method::GET,
            format!("/authorize?{query}").parse().unwrap(),
            HeaderMap::new(),
            b"",
        )
    }

    const VALID: &str = "response_type=code&client_id=web-app&scope=openid\
                         &redirect_uri=https%3A%2F%2Fapp.example.com%2Fcb&state=af0ifjsldkj";

    #[test]
    fn test_grammar_table_compiles() {
        assert_eq!(GRAMMAR.len(), GRAMMAR_TABLE.len());
        for ((name, re), (table_name, pattern)) in GRAMMAR.iter().zip(GRAMMAR_TABLE) {
            assert_eq!(*name, table_name);
            assert_eq!(re.as_str(), pattern);
        }
    }

    #[test]
    fn test_rule1_accepts_valid_request() {
        assert!(validate_oauth_params(&request(VALID)).is_ok());
    }

    #[test]
    fn test_rule1_lists_all_malformed_params() {
        let err = validate_oauth_params(&request(
            "response_type=code%21&scope=openid%20%20profile&max_age=soon&state=s",
        ))
        .unwrap_err();

        assert_eq!(err.error, ErrorCode::InvalidRequest);
        assert_eq!(
            err.error_description.as_deref(),
            Some("One or more malformed request parameters: response_type;scope;max_age")
        );
        assert_eq!(err.state.as_deref(), Some("s"));
    }

    #[test]
    fn test_rule1_ignores_absent_params() {
        assert!(validate_oauth_params(&request("")).is_ok());
    }

    #[test]
    fn test_rule1_control_characters() {
        assert!(validate_oauth_params(&request("state=a%0Ab")).is_err());
        assert!(validate_oauth_params(&request("redirect_uri=https%3A%2F%2Fa%20b")).is_err());
        assert!(validate_oauth_params(&request("username=j%C3%BCrgen")).is_ok());
        assert!(validate_oauth_params(&request("username=a%0Db")).is_err());
        assert!(validate_oauth_params(&request("grant_type=authorization_code")).is_ok());
        assert!(validate_oauth_params(&request(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"
        ))
        .is_ok());
    }

    #[test]
    fn test_rule2_requires_openid_token() {
        assert!(validate_scope_param(&request("scope=openid%20profile")).is_ok());
        assert!(validate_scope_param(&request("scope=profile%20openid")).is_ok());

        for scope in ["scope=profile", "scope=openidx", "scope=", ""] {
            let err = validate_scope_param(&request(scope)).unwrap_err();
            assert_eq!(err.error, ErrorCode::InvalidRequest);
            assert_eq!(
                err.error_description.as_deref(),
                Some("Scope doesn't contain openid")
            );
        }
    }

    #[tokio::test]
    async fn test_rule3_accepts_valid_request() {
        let clients = MockClients::new();
        assert!(validate_required_params(&request(VALID), &clients).await.is_ok());
    }

    #[tokio::test]
    async fn test_rule3_accumulates_reasons() {
        let clients = MockClients::new();
        let err = validate_required_params(&request("state=xyz"), &clients)
            .await
            .unwrap_err();

        let description = err.error_description.unwrap();
        assert!(description.starts_with("One or more invalid request parameters: "));
        for reason in [
            "scope missing",
            "response_type missing",
            "client_id missing",
            "redirect_uri missing",
        ] {
            assert!(description.contains(reason), "{description}");
        }
        assert_eq!(err.state.as_deref(), Some("xyz"));
    }

    #[tokio::test]
    async fn test_rule3_unknown_flow_and_client() {
        let clients = MockClients::new();
        let err = validate_required_params(
            &request("response_type=token&client_id=nobody&scope=openid&redirect_uri=https%3A%2F%2Fx"),
            &clients,
        )
        .await
        .unwrap_err();

        let description = err.error_description.unwrap();
        assert!(description.contains("response_type not supported"));
        assert!(description.contains("client_id not registered"));
    }

    #[tokio::test]
    async fn test_rule3_unregistered_redirect() {
        let clients = MockClients::new();
        let err = validate_required_params(
            &request("response_type=code&client_id=web-app&scope=openid&redirect_uri=https%3A%2F%2Fevil.example.com%2Fcb"),
            &clients,
        )
        .await
        .unwrap_err();
        assert!(err.error_description.unwrap().contains("redirect_uri not allowed"));
    }

    #[tokio::test]
    async fn test_rule3_implicit_requires_nonce() {
        let clients = MockClients::new();
        let base = "response_type=id_token&client_id=web-app&scope=openid\
                    &redirect_uri=https%3A%2F%2Fapp.example.com%2Fcb";

        let err = validate_required_params(&request(base), &clients)
            .await
            .unwrap_err();
        assert!(err.error_description.unwrap().contains("nonce missing"));

        let with_nonce = format!("{base}&nonce=n-0S6");
        assert!(validate_required_params(&request(&with_nonce), &clients).await.is_ok());
    }

    #[tokio::test]
    async fn test_redirect_policy_implicit() {
        let clients = MockClients::new();
        let implicit = Flow::Implicit;

        assert!(check_redirect_uri("https://anywhere.example/cb", "web-app", implicit, &clients).await);
        assert!(check_redirect_uri("myapp://cb", "web-app", implicit, &clients).await);
        assert!(check_redirect_uri("http://localhost:8080/cb", "native-app", implicit, &clients).await);

        assert!(!check_redirect_uri("http://localhost/cb", "web-app", implicit, &clients).await);
        assert!(!check_redirect_uri("http://127.0.0.1/cb", "native-app", implicit, &clients).await);
        assert!(!check_redirect_uri("http://localhost.evil.com/cb", "native-app", implicit, &clients).await);
        assert!(!check_redirect_uri("not a uri", "native-app", implicit, &clients).await);
    }

    #[tokio::test]
    async fn test_redirect_policy_other_flows_delegate() {
        let clients = MockClients::new();
        for flow in [Flow::AuthorizationCode, Flow::Hybrid, Flow::Unknown] {
            assert!(check_redirect_uri("https://app.example.com/cb", "web-app", flow, &clients).await);
            assert!(!check_redirect_uri("https://app.example.com/other", "web-app", flow, &clients).await);
            assert!(!check_redirect_uri("://", "web-app", flow, &clients).await);
        }
    }

    fn jwt() -> JwtService {
        JwtService::new(SigningKeyPair::generate("k").unwrap(), "https://op")
    }

    #[test]
    fn test_rule4_claims_subject_mismatch() {
        let req = request("state=s&claims=%7B%22id_token%22%3A%7B%22sub%22%3A%7B%22value%22%3A%22bob%22%7D%7D%7D");
        let err = validate_subject(&req, "alice", &jwt()).unwrap_err();
        assert_eq!(err.error, ErrorCode::AccessDenied);
        assert_eq!(err.state.as_deref(), Some("s"));

        assert!(validate_subject(&req, "bob", &jwt()).is_ok());
    }

    #[test]
    fn test_rule4_userinfo_values() {
        let req = request("claims=%7B%22userinfo%22%3A%7B%22sub%22%3A%7B%22values%22%3A%5B%22a%22%2C%22b%22%5D%7D%7D%7D");
        assert!(validate_subject(&req, "b", &jwt()).is_ok());
        assert!(validate_subject(&req, "c", &jwt()).is_err());
    }

    #[test]
    fn test_rule4_malformed_claims() {
        let err = validate_subject(&request("claims=%7Bnope"), "alice", &jwt()).unwrap_err();
        assert_eq!(err.error, ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_rule4_id_token_hint() {
        let jwt = jwt();
        let hint = jwt
            .encode(&IdTokenClaims {
                iss: "https://op".to_string(),
                sub: "alice".to_string(),
                aud: "web-app".to_string(),
                exp: 1_000,
                iat: 900,
                auth_time: None,
                nonce: None,
                acr: None,
                amr: vec![],
                at_hash: None,
                c_hash: None,
                additional: serde_json::Map::new(),
            })
            .unwrap();
        let req = request(&format!("id_token_hint={hint}"));

        // expired hints are still valid hints
        assert!(validate_subject(&req, "alice", &jwt).is_ok());

        let err = validate_subject(&req, "bob", &jwt).unwrap_err();
        assert_eq!(err.error, ErrorCode::AccessDenied);
    }

    #[test]
    fn test_rule4_foreign_hint() {
        let req = request("id_token_hint=eyJhbGciOiJub25lIn0.eyJzdWIiOiJhbGljZSJ9.");
        let err = validate_subject(&req, "alice", &jwt()).unwrap_err();
        assert_eq!(err.error, ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_rule4_nothing_requested() {
        assert!(validate_subject(&request("scope=openid"), "alice", &jwt()).is_ok());
    }
}
