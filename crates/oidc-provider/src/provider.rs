//! Provider lifecycle and collaborator wiring.
//!
//! An [`OpenIdProvider`] is built with its collaborators, then started with
//! [`OpenIdProvider::serve`]. Until `serve` succeeds, and again after
//! [`OpenIdProvider::shutdown`], every request is answered with
//! [`AuthorizeOutcome::NotServing`] / [`TokenOutcome::NotServing`].
//!
//! # Example
//!
//! ```ignore
//! let provider = OpenIdProvider::builder(config)
//!     .clients(clients)
//!     .sessions(sessions)
//!     .claims(claims)
//!     .authenticator(authenticator)
//!     .build();
//!
//! provider.serve().await?;
//! let app = oidc_provider::http::router(Arc::new(provider));
//! ```

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::AuthResult;
use crate::authenticator::Authenticator;
use crate::config::{ConfigError, ProviderConfig};
use crate::error::AuthError;
use crate::oauth::authorize::{AuthorizationService, AuthorizeOutcome};
use crate::oauth::flows::FlowExecutor;
use crate::oauth::params::AuthRequest;
use crate::oauth::token::{TokenExchangeService, TokenOutcome};
use crate::storage::{ClaimStore, ClientRegistry, SessionStore};
use crate::token::{Jwks, JwtService, SigningKeyPair, TokenIssuer};

/// Lifecycle state of a provider.
pub enum ProviderState {
    /// Built but not started.
    Configured,
    /// Accepting requests.
    Serving(Services),
    /// Shut down; no longer accepting requests.
    Stopped,
}

impl ProviderState {
    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Configured => "configured",
            Self::Serving(_) => "serving",
            Self::Stopped => "stopped",
        }
    }
}

/// Services available while serving.
pub struct Services {
    authorization: AuthorizationService,
    tokens: TokenExchangeService,
    jwt: JwtService,
}

/// Builder for [`OpenIdProvider`].
pub struct OpenIdProviderBuilder {
    config: ProviderConfig,
    clients: Option<Arc<dyn ClientRegistry>>,
    sessions: Option<Arc<dyn SessionStore>>,
    claims: Option<Arc<dyn ClaimStore>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    signing_key: Option<SigningKeyPair>,
}

impl OpenIdProviderBuilder {
    /// Sets the client registry.
    #[must_use]
    pub fn clients(mut self, clients: Arc<dyn ClientRegistry>) -> Self {
        self.clients = Some(clients);
        self
    }

    /// Sets the session store.
    #[must_use]
    pub fn sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Sets the claim store.
    #[must_use]
    pub fn claims(mut self, claims: Arc<dyn ClaimStore>) -> Self {
        self.claims = Some(claims);
        self
    }

    /// Sets the end-user authenticator.
    #[must_use]
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Uses `key` instead of loading one from the signing configuration.
    #[must_use]
    pub fn signing_key(mut self, key: SigningKeyPair) -> Self {
        self.signing_key = Some(key);
        self
    }

    /// Builds the provider in the `Configured` state.
    #[must_use]
    pub fn build(self) -> OpenIdProvider {
        OpenIdProvider {
            config: self.config,
            clients: self.clients,
            sessions: self.sessions,
            claims: self.claims,
            authenticator: self.authenticator,
            signing_key: self.signing_key,
            state: ArcSwap::from_pointee(ProviderState::Configured),
        }
    }
}

/// An OpenID Connect provider.
pub struct OpenIdProvider {
    config: ProviderConfig,
    clients: Option<Arc<dyn ClientRegistry>>,
    sessions: Option<Arc<dyn SessionStore>>,
    claims: Option<Arc<dyn ClaimStore>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    signing_key: Option<SigningKeyPair>,
    state: ArcSwap<ProviderState>,
}

impl OpenIdProvider {
    /// Starts building a provider with `config`.
    #[must_use]
    pub fn builder(config: ProviderConfig) -> OpenIdProviderBuilder {
        OpenIdProviderBuilder {
            config,
            clients: None,
            sessions: None,
            claims: None,
            authenticator: None,
            signing_key: None,
        }
    }

    /// Returns the provider configuration.
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> Arc<ProviderState> {
        self.state.load_full()
    }

    /// Returns `true` while requests are being processed.
    #[must_use]
    pub fn is_serving(&self) -> bool {
        matches!(**self.state.load(), ProviderState::Serving(_))
    }

    /// Enters the `Serving` state.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the configuration is invalid, a
    /// collaborator is missing or the provider was shut down, and `Key` if
    /// the signing key cannot be loaded. The
    /// provider stays out of `Serving` on any error.
    pub async fn serve(&self) -> AuthResult<()> {
        match **self.state.load() {
            ProviderState::Serving(_) => return Ok(()),
            ProviderState::Stopped => {
                return Err(AuthError::configuration("provider was shut down"));
            }
            ProviderState::Configured => {}
        }

        match self.config.validate() {
            // an explicit key stands in for a configured key source
            Err(ConfigError::Missing(_)) if self.signing_key.is_some() => {}
            Err(e) => return Err(AuthError::configuration(e.to_string())),
            Ok(()) => {}
        }

        let clients = required(&self.clients, "client registry")?;
        let sessions = required(&self.sessions, "session store")?;
        let claims = required(&self.claims, "claim store")?;
        let authenticator = required(&self.authenticator, "authenticator")?;

        let key = self.load_signing_key().await?;
        let jwt = JwtService::new(key, self.config.issuer.clone());
        let tokens = Arc::new(TokenIssuer::new(jwt.clone(), claims, &self.config));

        let flows = FlowExecutor::new(sessions.clone(), tokens.clone(), self.config.code_lifetime);
        let services = Services {
            authorization: AuthorizationService::new(
                clients.clone(),
                authenticator,
                flows,
                jwt.clone(),
            ),
            tokens: TokenExchangeService::new(clients, sessions, tokens),
            jwt,
        };

        self.state.store(Arc::new(ProviderState::Serving(services)));
        tracing::info!(issuer = %self.config.issuer, "Provider serving");
        Ok(())
    }

    /// Stops serving. In-flight requests finish with the services they loaded.
    pub fn shutdown(&self) {
        let previous = self.state.swap(Arc::new(ProviderState::Stopped));
        tracing::info!(previous = previous.name(), "Provider stopped");
    }

    /// Handles an authorization request.
    pub async fn authorize(&self, request: &AuthRequest) -> AuthorizeOutcome {
        let state = self.state.load_full();
        let ProviderState::Serving(services) = &*state else {
            tracing::debug!(state = state.name(), "Authorization request while not serving");
            return AuthorizeOutcome::NotServing;
        };
        services.authorization.authorize(request).await
    }

    /// Handles a token request.
    pub async fn token(&self, request: &AuthRequest) -> TokenOutcome {
        let state = self.state.load_full();
        let ProviderState::Serving(services) = &*state else {
            tracing::debug!(state = state.name(), "Token request while not serving");
            return TokenOutcome::NotServing;
        };
        TokenOutcome::Respond(services.tokens.exchange(request).await)
    }

    /// Returns the public key set, or `None` when not serving.
    #[must_use]
    pub fn jwks(&self) -> Option<Jwks> {
        match &**self.state.load() {
            ProviderState::Serving(services) => Some(services.jwt.jwks()),
            _ => None,
        }
    }

    async fn load_signing_key(&self) -> AuthResult<SigningKeyPair> {
        if let Some(key) = &self.signing_key {
            return Ok(key.clone());
        }

        let signing = &self.config.signing;
        let pem = if let Some(pem) = &signing.key_pem {
            pem.clone()
        } else if let Some(path) = &signing.key_file {
            tokio::fs::read_to_string(path).await.map_err(|e| {
                AuthError::key(format!("cannot read {}: {e}", path.display()))
            })?
        } else {
            return Err(AuthError::key("no signing key configured"));
        };

        SigningKeyPair::from_pem(signing.key_id.clone(), &pem)
            .map_err(|e| AuthError::key(e.to_string()))
    }
}

fn required<T: ?Sized>(value: &Option<Arc<T>>, name: &str) -> AuthResult<Arc<T>> {
    value
        .clone()
        .ok_or_else(|| AuthError::configuration(format!("{name} not configured")))
}
