//! Client registry trait.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::oauth::params::AuthRequest;

/// OpenID Connect client application type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationType {
    /// Browser-based or server-side application.
    #[default]
    Web,
    /// Application installed on the end-user's device.
    Native,
}

impl ApplicationType {
    /// Returns the registration value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Native => "native",
        }
    }
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of authenticating a client at the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAuthentication {
    /// The client is who it claims to be.
    Authenticated,
    /// The client is unknown, disabled, or presented wrong credentials.
    NotAllowed(String),
    /// The client must authenticate but sent no credentials.
    MustAuthenticate,
}

/// Read access to registered clients.
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Returns `true` if `client_id` is registered.
    async fn is_client(&self, client_id: &str) -> bool;

    /// Returns the application type of `client_id`.
    async fn application_type(&self, client_id: &str) -> ApplicationType;

    /// Returns `true` if `redirect_uri` is registered for `client_id`.
    async fn validate_redirect_uri(&self, client_id: &str, redirect_uri: &str) -> bool;

    /// Authenticates `client_id` with the credentials carried by `request`
    /// (HTTP Basic or form parameters).
    async fn authenticate_client(
        &self,
        client_id: &str,
        request: &AuthRequest,
    ) -> ClientAuthentication;
}
