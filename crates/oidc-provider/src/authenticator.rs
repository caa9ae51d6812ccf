//! End-user authentication collaborator.
//!
//! The provider never renders login pages itself. It hands each
//! authorization request to an [`Authenticator`], which either reports who
//! the end-user is or produces a page to show them.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::oauth::params::AuthRequest;

/// Identity of an authenticated end-user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    /// Identity provider that authenticated the end-user.
    pub issuer: String,
    /// Subject identifier, becomes the `sub` claim.
    pub subject: String,
    /// When authentication happened.
    pub auth_time: OffsetDateTime,
    /// Authentication context class reference.
    pub acr: Option<String>,
    /// Authentication methods references.
    pub amr: Vec<String>,
}

/// A page handed back to the user agent while authentication is in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` of `body`.
    pub content_type: String,
    /// Response body.
    pub body: String,
}

impl Prompt {
    /// A `200 OK` HTML page.
    #[must_use]
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8".to_string(),
            body: body.into(),
        }
    }
}

/// Outcome of one authentication step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// The end-user is authenticated.
    Ok(Authenticated),
    /// The end-user cancelled.
    Aborted,
    /// Authentication failed.
    Failed,
    /// The user agent must be shown this page; nothing else is sent.
    Prompting(Prompt),
    /// The request must be re-issued to the same URI, e.g. after the
    /// authenticator set a cookie.
    Reauthenticate,
}

/// Drives end-user authentication for authorization requests.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Advances authentication for `request`.
    async fn auth_page(&self, request: &AuthRequest) -> AuthState;
}
