//! Authorization endpoint orchestration.
//!
//! ```text
//! Validating ─► Authenticating ─┬─ Aborted ──────► login_required
//!                               ├─ Failed ───────► access_denied
//!                               ├─ Prompting ────► collaborator's page
//!                               ├─ Reauthenticate ► same request again
//!                               └─ Ok ─► Rule 4 ─► flow ─► success | error
//! ```

use std::sync::Arc;

use crate::authenticator::{AuthState, Authenticator, Prompt};
use crate::oauth::flow::{Flow, ResponseMode};
use crate::oauth::flows::FlowExecutor;
use crate::oauth::params::AuthRequest;
use crate::oauth::response::{AuthErrorResponse, AuthResponse, ErrorCode};
use crate::oauth::validation::{
    check_redirect_uri, validate_oauth_params, validate_required_params, validate_scope_param,
    validate_subject,
};
use crate::storage::ClientRegistry;
use crate::token::JwtService;

/// What the transport layer should do with an authorization request.
#[derive(Debug)]
pub enum AuthorizeOutcome {
    /// The provider is not serving; send an empty response.
    NotServing,
    /// Send the authenticator's page and nothing else.
    Prompt(Prompt),
    /// Re-issue the same request (same method) to `location`.
    Reload {
        /// Original request path and query.
        location: String,
    },
    /// Deliver a protocol response.
    Respond(AuthorizeResponse),
}

/// A protocol response plus how to deliver it.
#[derive(Debug)]
pub struct AuthorizeResponse {
    /// The success or error.
    pub result: AuthResponse,
    /// Query or fragment, fixed by the classified flow.
    pub mode: ResponseMode,
    /// Where to redirect. `None` when the redirect URI cannot be trusted;
    /// the error is then rendered directly.
    pub redirect_uri: Option<String>,
}

/// Sequences validation, end-user authentication, and flow execution.
pub struct AuthorizationService {
    clients: Arc<dyn ClientRegistry>,
    authenticator: Arc<dyn Authenticator>,
    flows: FlowExecutor,
    jwt: JwtService,
}

impl AuthorizationService {
    /// Creates a new authorization service.
    #[must_use]
    pub fn new(
        clients: Arc<dyn ClientRegistry>,
        authenticator: Arc<dyn Authenticator>,
        flows: FlowExecutor,
        jwt: JwtService,
    ) -> Self {
        Self {
            clients,
            authenticator,
            flows,
            jwt,
        }
    }

    /// Processes an authorization request.
    pub async fn authorize(&self, request: &AuthRequest) -> AuthorizeOutcome {
        let flow = Flow::classify(request.param("response_type"));

        // 1. Rules 1-3, first failure wins
        let validated = match validate_oauth_params(request).and_then(|()| validate_scope_param(request)) {
            Ok(()) => validate_required_params(request, self.clients.as_ref()).await,
            Err(err) => Err(err),
        };
        if let Err(err) = validated {
            return self.respond_error(request, flow, err).await;
        }

        // 2. End-user authentication
        let auth = match self.authenticator.auth_page(request).await {
            AuthState::Ok(auth) => auth,
            AuthState::Aborted => {
                let err = AuthErrorResponse::new(ErrorCode::LoginRequired)
                    .with_description("Authentication aborted")
                    .with_state(request.state());
                return self.respond_error(request, flow, err).await;
            }
            AuthState::Failed => {
                let err = AuthErrorResponse::access_denied("Authentication failed")
                    .with_state(request.state());
                return self.respond_error(request, flow, err).await;
            }
            AuthState::Prompting(prompt) => return AuthorizeOutcome::Prompt(prompt),
            AuthState::Reauthenticate => {
                return AuthorizeOutcome::Reload {
                    location: request.request_uri(),
                };
            }
        };

        tracing::debug!(
            client_id = %request.param("client_id"),
            idp = %auth.issuer,
            flow = %flow,
            "End-user authenticated"
        );

        // 3. Rule 4 against the authenticated subject
        if let Err(err) = validate_subject(request, &auth.subject, &self.jwt) {
            return self.respond_error(request, flow, err).await;
        }

        // 4. Flow dispatch
        let result = self.flows.execute(flow, request, &auth).await;
        if let Err(ref err) = result {
            tracing::warn!(
                client_id = %request.param("client_id"),
                flow = %flow,
                error = %err.error,
                "Flow failed"
            );
        }

        AuthorizeOutcome::Respond(AuthorizeResponse {
            result,
            mode: flow.response_mode(),
            redirect_uri: Some(request.param("redirect_uri").to_string()),
        })
    }

    /// Returns `true` if errors for `request` may be redirected to its
    /// `redirect_uri`.
    pub async fn redirect_uri_trusted(&self, request: &AuthRequest, flow: Flow) -> bool {
        let client_id = request.param("client_id");
        let redirect_uri = request.param("redirect_uri");
        if client_id.is_empty() || redirect_uri.is_empty() {
            return false;
        }

        self.clients.is_client(client_id).await
            && check_redirect_uri(redirect_uri, client_id, flow, self.clients.as_ref()).await
    }

    async fn respond_error(
        &self,
        request: &AuthRequest,
        flow: Flow,
        err: AuthErrorResponse,
    ) -> AuthorizeOutcome {
        tracing::warn!(
            client_id = %request.param("client_id"),
            error = %err,
            "Authorization request rejected"
        );

        let redirect_uri = if self.redirect_uri_trusted(request, flow).await {
            Some(request.param("redirect_uri").to_string())
        } else {
            None
        };

        AuthorizeOutcome::Respond(AuthorizeResponse {
            result: Err(err),
            mode: flow.response_mode(),
            redirect_uri,
        })
    }
}
