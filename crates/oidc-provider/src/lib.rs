//! # oidc-provider
//!
//! Core of an OpenID Connect / OAuth 2.0 authorization server.
//!
//! This crate provides:
//! - Authorization endpoint validation and the code, implicit, and hybrid flows
//! - Authorization code exchange at the token endpoint
//! - ES256-signed ID tokens and self-contained access tokens
//! - Collaborator traits for clients, sessions, claims, and end-user login
//! - Axum handlers for `/authorize`, `/token`, and `/jwks`
//!
//! ## Modules
//!
//! - [`config`] - Provider configuration
//! - [`oauth`] - Protocol logic for both endpoints
//! - [`token`] - Key handling and token issuance
//! - [`storage`] - Client, session, and claim store traits
//! - [`authenticator`] - End-user authentication trait
//! - [`provider`] - Lifecycle and collaborator wiring
//! - [`http`] - Axum HTTP handlers

pub mod authenticator;
pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod provider;
pub mod storage;
pub mod token;

pub use authenticator::{AuthState, Authenticated, Authenticator, Prompt};
pub use config::{ConfigError, ProviderConfig, SigningConfig};
pub use error::AuthError;
pub use http::router;
pub use oauth::{
    AuthErrorResponse, AuthRequest, AuthResponse, AuthSuccessResponse, AuthorizeOutcome,
    ClaimsRequest, ErrorCode, Flow, ResponseMode, Session, TokenOutcome,
};
pub use provider::{OpenIdProvider, OpenIdProviderBuilder, ProviderState};
pub use storage::{ApplicationType, ClaimStore, ClientAuthentication, ClientRegistry, SessionStore};
pub use token::{AccessToken, IdTokenClaims, Jwks, JwtService, SigningKeyPair};

/// Type alias for provider results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use oidc_provider::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::authenticator::{AuthState, Authenticated, Authenticator, Prompt};
    pub use crate::config::{ConfigError, ProviderConfig};
    pub use crate::error::AuthError;
    pub use crate::oauth::{AuthRequest, Session};
    pub use crate::provider::OpenIdProvider;
    pub use crate::storage::{
        ApplicationType, ClaimStore, ClientAuthentication, ClientRegistry, SessionStore,
    };
    pub use crate::token::SigningKeyPair;
}
