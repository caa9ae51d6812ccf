//! Session store trait.
//!
//! Sessions of the code and hybrid flows are cached between the
//! authorization endpoint and the token endpoint, keyed by their
//! authorization code.
//!
//! # Implementation Notes
//!
//! Implementations should:
//!
//! - Serialize mutations of the underlying table
//! - Report expired entries as not found
//! - Never log authorization codes

use async_trait::async_trait;

use crate::AuthResult;
use crate::oauth::session::Session;

/// Storage contract for pending authorization sessions.
///
/// # Example Implementation
///
/// ```ignore
/// use oidc_provider::storage::SessionStore;
/// use oidc_provider::oauth::Session;
/// use oidc_provider::{AuthError, AuthResult};
///
/// struct MapSessionStore {
///     sessions: tokio::sync::Mutex<std::collections::HashMap<String, Session>>,
/// }
///
/// #[async_trait::async_trait]
/// impl SessionStore for MapSessionStore {
///     async fn retire(&self, code: &str) -> AuthResult<bool> {
///         Ok(self.sessions.lock().await.remove(code).is_some())
///     }
///     // ... other methods
/// }
/// ```
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores a session under its code.
    ///
    /// Re-submitting a session for the same code and client replaces the
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Conflict` if the code is already held by a
    /// different client, `AuthError::InvalidRequest` if the session has no
    /// code, or a storage error.
    async fn cache(&self, session: &Session) -> AuthResult<()>;

    /// Looks up the session for `code`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotFound` if the code is unknown, retired, or
    /// expired.
    async fn get_session(&self, code: &str) -> AuthResult<Session>;

    /// Removes the session for `code`.
    ///
    /// Idempotent. Returns `true` only for the call that actually removed
    /// the entry.
    ///
    /// # Atomicity
    ///
    /// Concurrent calls for the same code must see exactly one `true`; the
    /// token endpoint relies on this to reject double exchanges.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn retire(&self, code: &str) -> AuthResult<bool>;
}
