//! Token endpoint orchestration (authorization code exchange).

use std::sync::Arc;

use crate::oauth::params::AuthRequest;
use crate::oauth::response::{AuthErrorResponse, AuthResponse, AuthSuccessResponse, ErrorCode};
use crate::storage::{ClientAuthentication, ClientRegistry, SessionStore};
use crate::token::{TokenBindings, TokenIssuer};

/// The only grant type accepted at the token endpoint.
pub const AUTHORIZATION_CODE: &str = "authorization_code";

/// What the transport layer should do with a token request.
#[derive(Debug)]
pub enum TokenOutcome {
    /// The provider is not serving; send an empty response.
    NotServing,
    /// Deliver a protocol response as JSON.
    Respond(AuthResponse),
}

/// Token request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    /// Grant type, must be `authorization_code`.
    pub grant_type: String,
    /// Authorization code.
    pub code: String,
    /// Redirect URI used in the authorization request.
    pub redirect_uri: String,
    /// Client identifier.
    pub client_id: String,
}

impl TokenRequest {
    /// Reads token parameters from `request`.
    #[must_use]
    pub fn from_request(request: &AuthRequest) -> Self {
        Self {
            grant_type: request.param("grant_type").to_string(),
            code: request.param("code").to_string(),
            redirect_uri: request.param("redirect_uri").to_string(),
            client_id: request.param("client_id").to_string(),
        }
    }
}

/// Exchanges authorization codes for tokens.
pub struct TokenExchangeService {
    clients: Arc<dyn ClientRegistry>,
    sessions: Arc<dyn SessionStore>,
    tokens: Arc<TokenIssuer>,
}

impl TokenExchangeService {
    /// Creates a new token exchange service.
    #[must_use]
    pub fn new(
        clients: Arc<dyn ClientRegistry>,
        sessions: Arc<dyn SessionStore>,
        tokens: Arc<TokenIssuer>,
    ) -> Self {
        Self {
            clients,
            sessions,
            tokens,
        }
    }

    /// Exchanges the code in `request` for an ID token and access token.
    ///
    /// The code is retired only after both tokens were issued. When several
    /// requests race for one code, only the one that retires it succeeds.
    pub async fn exchange(&self, request: &AuthRequest) -> AuthResponse {
        let params = TokenRequest::from_request(request);

        // 1. Client identification and authentication
        if params.client_id.is_empty() {
            return Err(AuthErrorResponse::invalid_client("No client_id given"));
        }

        match self
            .clients
            .authenticate_client(&params.client_id, request)
            .await
        {
            ClientAuthentication::Authenticated => {}
            ClientAuthentication::NotAllowed(reason) => {
                tracing::warn!(client_id = %params.client_id, reason = %reason, "Client authentication failed");
                return Err(AuthErrorResponse::invalid_client(
                    "Client not allowed or cannot authenticate",
                ));
            }
            ClientAuthentication::MustAuthenticate => {
                tracing::debug!(client_id = %params.client_id, "Client sent no credentials");
                return Err(AuthErrorResponse::invalid_client("Authentication needed")
                    .with_status(401)
                    .with_header("WWW-Authenticate", "Basic realm=openid"));
            }
        }

        if params.grant_type != AUTHORIZATION_CODE {
            return Err(AuthErrorResponse::new(ErrorCode::UnsupportedGrantType)
                .with_description("Only authorization_code is supported"));
        }

        // 2. Session lookup, bound to the requesting client
        let session = match self.sessions.get_session(&params.code).await {
            Ok(session) if session.client_id == params.client_id => session,
            Ok(_) => {
                tracing::warn!(client_id = %params.client_id, "Code was issued to another client");
                return Err(AuthErrorResponse::invalid_grant("Authorization Code is invalid"));
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(client_id = %params.client_id, "Unknown or retired code");
                return Err(AuthErrorResponse::invalid_grant("Authorization Code is invalid"));
            }
            Err(e) => {
                tracing::error!(error = %e, "Session lookup failed");
                return Err(AuthErrorResponse::server_error("Session store unavailable"));
            }
        };

        // 3. Redirect URI must be registered and identical to the one authorized
        if params.redirect_uri != session.redirect_uri
            || !self
                .clients
                .validate_redirect_uri(&params.client_id, &params.redirect_uri)
                .await
        {
            return Err(AuthErrorResponse::invalid_grant("Redirection URI is invalid"));
        }

        // 4. Only OpenID Connect requests reach this endpoint
        if !session.has_scope("openid") {
            return Err(AuthErrorResponse::invalid_request(
                "Code was not issued to an OIDC Auth Request",
            ));
        }

        // 5. Issue tokens; the code stays valid if signing fails
        let access_token = self.tokens.new_access_token(&session).map_err(|e| {
            tracing::error!(error = %e, session_id = %session.id, "Access token signing failed");
            AuthErrorResponse::server_error("Access token not available")
        })?;

        let bindings = TokenBindings {
            access_token: Some(&access_token.token),
            code: None,
        };
        let id_token = self
            .tokens
            .new_id_token(&session, bindings)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, session_id = %session.id, "ID token signing failed");
                AuthErrorResponse::invalid_request("ID Token not available")
            })?;

        // 6. Single use: only the caller that retires the code gets the tokens
        match self.sessions.retire(&params.code).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(session_id = %session.id, "Code was redeemed concurrently");
                return Err(AuthErrorResponse::invalid_grant("Authorization Code is invalid"));
            }
            Err(e) => {
                tracing::error!(error = %e, session_id = %session.id, "Failed to retire code");
                return Err(AuthErrorResponse::server_error("Session store unavailable"));
            }
        }

        tracing::info!(
            client_id = %params.client_id,
            session_id = %session.id,
            "Authorization code exchanged"
        );

        Ok(AuthSuccessResponse {
            access_token: Some(access_token.token),
            token_type: Some(access_token.token_type),
            expires_in: Some(access_token.expires_in),
            id_token: Some(id_token),
            ..Default::default()
        })
    }
}
