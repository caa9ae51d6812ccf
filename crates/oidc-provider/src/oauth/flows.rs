//! The three OpenID Connect flows.
//!
//! Each flow runs after validation rules 1-4 passed and the end-user is
//! authenticated. A flow either returns a complete success response or a
//! protocol error; partial successes are never returned.

use std::sync::Arc;
use std::time::Duration;

use crate::authenticator::Authenticated;
use crate::oauth::flow::{Flow, requests_access_token};
use crate::oauth::params::AuthRequest;
use crate::oauth::response::{AuthErrorResponse, AuthResponse, AuthSuccessResponse};
use crate::oauth::session::Session;
use crate::storage::SessionStore;
use crate::token::{TokenBindings, TokenIssuer};

const UNFULFILLABLE: &str = "Server isn't able to fulfill your request";

/// Runs the authorization code, implicit, and hybrid flows.
pub struct FlowExecutor {
    sessions: Arc<dyn SessionStore>,
    tokens: Arc<TokenIssuer>,
    code_lifetime: Duration,
}

impl FlowExecutor {
    /// Creates a new executor.
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        tokens: Arc<TokenIssuer>,
        code_lifetime: Duration,
    ) -> Self {
        Self {
            sessions,
            tokens,
            code_lifetime,
        }
    }

    /// Dispatches to the flow matching `flow`.
    pub async fn execute(
        &self,
        flow: Flow,
        request: &AuthRequest,
        auth: &Authenticated,
    ) -> AuthResponse {
        match flow {
            Flow::AuthorizationCode => self.authorization_code(request, auth).await,
            Flow::Implicit => self.implicit(request, auth).await,
            Flow::Hybrid => self.hybrid(request, auth).await,
            Flow::Unknown => Err(AuthErrorResponse::invalid_request("response_type not supported")
                .with_state(request.state())),
        }
    }

    /// Authorization code flow: cache a session under a fresh code and
    /// return the code.
    pub async fn authorization_code(
        &self,
        request: &AuthRequest,
        auth: &Authenticated,
    ) -> AuthResponse {
        let state = request.state();
        let code = new_code(state)?;
        let session = self.build_session(request, auth, Some(code.clone()))?;

        self.store(&session, state).await?;

        tracing::info!(
            client_id = %session.client_id,
            session_id = %session.id,
            "Authorization code issued"
        );

        Ok(AuthSuccessResponse {
            code: Some(code),
            ..Default::default()
        }
        .with_state(state))
    }

    /// Implicit flow: issue tokens directly; nothing is cached.
    pub async fn implicit(&self, request: &AuthRequest, auth: &Authenticated) -> AuthResponse {
        let state = request.state();
        let session = self.build_session(request, auth, None)?;

        let mut response = AuthSuccessResponse::default();
        self.issue_tokens(&session, request, &mut response).await?;

        tracing::info!(
            client_id = %session.client_id,
            session_id = %session.id,
            "Implicit flow tokens issued"
        );

        Ok(response.with_state(state))
    }

    /// Hybrid flow: issue a code plus tokens; the session is cached once
    /// token issuance succeeded.
    pub async fn hybrid(&self, request: &AuthRequest, auth: &Authenticated) -> AuthResponse {
        let state = request.state();
        let code = new_code(state)?;
        let session = self.build_session(request, auth, Some(code.clone()))?;

        let mut response = AuthSuccessResponse {
            code: Some(code),
            ..Default::default()
        };
        self.issue_tokens(&session, request, &mut response).await?;

        self.store(&session, state).await?;

        tracing::info!(
            client_id = %session.client_id,
            session_id = %session.id,
            "Hybrid flow code and tokens issued"
        );

        Ok(response.with_state(state))
    }

    fn build_session(
        &self,
        request: &AuthRequest,
        auth: &Authenticated,
        code: Option<String>,
    ) -> Result<Session, AuthErrorResponse> {
        Session::from_request(request, auth, code, self.code_lifetime).map_err(|e| {
            tracing::debug!(error = %e, "Unparsable claims parameter");
            AuthErrorResponse::invalid_request("claims parameter is malformed")
                .with_state(request.state())
        })
    }

    /// Issues the ID token, plus an access token when `response_type`
    /// contains `token`, into `response`.
    async fn issue_tokens(
        &self,
        session: &Session,
        request: &AuthRequest,
        response: &mut AuthSuccessResponse,
    ) -> Result<(), AuthErrorResponse> {
        let state = request.state();

        if requests_access_token(request.param("response_type")) {
            let access_token = self.tokens.new_access_token(session).map_err(|e| {
                tracing::error!(error = %e, "Access token signing failed");
                AuthErrorResponse::server_error(UNFULFILLABLE).with_state(state)
            })?;
            response.access_token = Some(access_token.token);
            response.token_type = Some(access_token.token_type);
            response.expires_in = Some(access_token.expires_in);
        }

        let bindings = TokenBindings {
            access_token: response.access_token.as_deref(),
            code: response.code.as_deref(),
        };
        let id_token = self
            .tokens
            .new_id_token(session, bindings)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "ID token signing failed");
                AuthErrorResponse::server_error(UNFULFILLABLE).with_state(state)
            })?;
        response.id_token = Some(id_token);

        Ok(())
    }

    async fn store(&self, session: &Session, state: &str) -> Result<(), AuthErrorResponse> {
        self.sessions.cache(session).await.map_err(|e| {
            tracing::error!(error = %e, session_id = %session.id, "Failed to cache session");
            AuthErrorResponse::server_error(UNFULFILLABLE).with_state(state)
        })
    }
}

fn new_code(state: &str) -> Result<String, AuthErrorResponse> {
    Session::generate_code().map_err(|e| {
        tracing::error!(error = %e, "Random source failed");
        AuthErrorResponse::server_error(UNFULFILLABLE).with_state(state)
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use axum::http::{HeaderMap, Method};
    use time::OffsetDateTime;
    use tokio::sync::RwLock;

    use super::*;
    use crate::config::ProviderConfig;
    use crate::oauth::response::ErrorCode;
    use crate::storage::ClaimStore;
    use crate::token::jwt::{IdTokenClaims, JwtService, SigningKeyPair, left_half_hash};
    use crate::{AuthError, AuthResult};

    #[derive(Default)]
    struct MockSessions {
        sessions: RwLock<HashMap<String, Session>>,
        fail: bool,
    }

    #[async_trait]
    impl SessionStore for MockSessions {
        async fn cache(&self, session: &Session) -> AuthResult<()> {
            if self.fail {
                return Err(AuthError::storage("unavailable"));
            }
            let code = session.code.clone().unwrap_or_default();
            self.sessions.write().await.insert(code, session.clone());
            Ok(())
        }

        async fn get_session(&self, code: &str) -> AuthResult<Session> {
            self.sessions
                .read()
                .await
                .get(code)
                .cloned()
                .ok_or_else(|| AuthError::not_found("session"))
        }

        async fn retire(&self, code: &str) -> AuthResult<bool> {
            Ok(self.sessions.write().await.remove(code).is_some())
        }
    }

    struct NoClaims;

    #[async_trait]
    impl ClaimStore for NoClaims {
        async fn get(&self, _subject: &str, _claim: &str) -> Option<String> {
            None
        }
    }

    fn executor(sessions: Arc<MockSessions>) -> (FlowExecutor, Arc<TokenIssuer>) {
        let jwt = JwtService::new(SigningKeyPair::generate("k").unwrap(), "https://op");
        let tokens = Arc::new(TokenIssuer::new(
            jwt,
            Arc::new(NoClaims),
            &ProviderConfig::default(),
        ));
        (
            FlowExecutor::new(sessions, tokens.clone(), Duration::from_secs(600)),
            tokens,
        )
    }

    fn auth() -> Authenticated {
        Authenticated {
            issuer: "idp".to_string(),
            subject: "alice".to_string(),
            auth_time: OffsetDateTime::now_utc(),
            acr: Some("0".to_string()),
            amr: vec!["pwd".to_string()],
        }
    }

    fn request(response_type: &str, extra: &str) -> AuthRequest {
        let query = format!(
            "response_type={}&client_id=app&scope=openid&redirect_uri=https%3A%2F%2Fapp%2Fcb&state=st&nonce=n1{extra}",
            response_type.replace(' ', "%20")
        );
        AuthRequest::new(
            Method::GET,
            format!("/authorize?{query}").parse().unwrap(),
            HeaderMap::new(),
            b"",
        )
    }

    #[tokio::test]
    async fn test_authorization_code_flow_caches_session() {
        let sessions = Arc::new(MockSessions::default());
        let (executor, _) = executor(sessions.clone());

        let response = executor
            .authorization_code(&request("code", ""), &auth())
            .await
            .unwrap();

        let code = response.code.unwrap();
        assert_eq!(response.state.as_deref(), Some("st"));
        assert!(response.id_token.is_none());
        assert!(response.access_token.is_none());

        let session = sessions.get_session(&code).await.unwrap();
        assert_eq!(session.client_id, "app");
        assert_eq!(session.subject, "alice");
        assert_eq!(session.nonce.as_deref(), Some("n1"));
    }

    #[tokio::test]
    async fn test_implicit_id_token_only() {
        let sessions = Arc::new(MockSessions::default());
        let (executor, tokens) = executor(sessions.clone());

        let response = executor
            .implicit(&request("id_token", ""), &auth())
            .await
            .unwrap();

        assert!(response.code.is_none());
        assert!(response.access_token.is_none());
        let claims = tokens
            .jwt()
            .decode::<IdTokenClaims>(&response.id_token.unwrap())
            .unwrap()
            .claims;
        assert_eq!(claims.nonce.as_deref(), Some("n1"));
        assert!(claims.at_hash.is_none());
        assert!(sessions.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_implicit_with_access_token() {
        let sessions = Arc::new(MockSessions::default());
        let (executor, tokens) = executor(sessions);

        let response = executor
            .implicit(&request("id_token token", ""), &auth())
            .await
            .unwrap();

        let access_token = response.access_token.unwrap();
        assert_eq!(response.token_type.as_deref(), Some("bearer"));
        assert_eq!(response.expires_in, Some(300));

        let claims = tokens
            .jwt()
            .decode::<IdTokenClaims>(&response.id_token.unwrap())
            .unwrap()
            .claims;
        assert_eq!(claims.at_hash, Some(left_half_hash(&access_token)));
    }

    #[tokio::test]
    async fn test_implicit_malformed_claims() {
        let sessions = Arc::new(MockSessions::default());
        let (executor, _) = executor(sessions);

        let err = executor
            .implicit(&request("id_token", "&claims=%5B"), &auth())
            .await
            .unwrap_err();
        assert_eq!(err.error, ErrorCode::InvalidRequest);
        assert_eq!(err.state.as_deref(), Some("st"));
    }

    #[tokio::test]
    async fn test_hybrid_returns_code_and_tokens() {
        let sessions = Arc::new(MockSessions::default());
        let (executor, tokens) = executor(sessions.clone());

        let response = executor
            .hybrid(&request("code id_token token", ""), &auth())
            .await
            .unwrap();

        let code = response.code.clone().unwrap();
        assert!(response.access_token.is_some());
        let claims = tokens
            .jwt()
            .decode::<IdTokenClaims>(response.id_token.as_deref().unwrap())
            .unwrap()
            .claims;
        assert_eq!(claims.c_hash, Some(left_half_hash(&code)));
        assert!(sessions.get_session(&code).await.is_ok());
    }

    #[tokio::test]
    async fn test_hybrid_without_token() {
        let sessions = Arc::new(MockSessions::default());
        let (executor, _) = executor(sessions);

        let response = executor
            .execute(Flow::Hybrid, &request("code id_token", ""), &auth())
            .await
            .unwrap();
        assert!(response.code.is_some());
        assert!(response.id_token.is_some());
        assert!(response.access_token.is_none());
    }

    #[tokio::test]
    async fn test_store_failure_is_server_error() {
        let sessions = Arc::new(MockSessions {
            fail: true,
            ..Default::default()
        });
        let (executor, _) = executor(sessions);

        let err = executor
            .authorization_code(&request("code", ""), &auth())
            .await
            .unwrap_err();
        assert_eq!(err.error, ErrorCode::ServerError);
    }

    #[tokio::test]
    async fn test_unknown_flow() {
        let sessions = Arc::new(MockSessions::default());
        let (executor, _) = executor(sessions);

        let err = executor
            .execute(Flow::Unknown, &request("token", ""), &auth())
            .await
            .unwrap_err();
        assert_eq!(err.error, ErrorCode::InvalidRequest);
    }
}
