//! Authorization sessions held in process memory.
//!
//! Entries live until they are retired by a token exchange or dropped by
//! [`InMemorySessionStore::cleanup_expired`].

use std::collections::HashMap;

use async_trait::async_trait;
use oidc_provider::oauth::Session;
use oidc_provider::{AuthError, AuthResult, SessionStore};
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// In-memory session store keyed by authorization code.
///
/// All mutation goes through one lock, so `retire` is atomic with respect to
/// `cache` and `get_session`: of several concurrent retirements of the same
/// code exactly one returns `true`.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired session and returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::debug!(removed, "Expired sessions removed");
        }
        removed
    }

    /// Number of stored sessions, expired ones included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn cache(&self, session: &Session) -> AuthResult<()> {
        let code = session
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| AuthError::invalid_request("session has no authorization code"))?;

        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(code) {
            if existing.client_id != session.client_id && !existing.is_expired() {
                return Err(AuthError::conflict("authorization code already in use"));
            }
        }
        sessions.insert(code.to_string(), session.clone());
        Ok(())
    }

    async fn get_session(&self, code: &str) -> AuthResult<Session> {
        let sessions = self.sessions.read().await;
        match sessions.get(code) {
            Some(session) if !session.is_expired() => Ok(session.clone()),
            _ => Err(AuthError::not_found("authorization code")),
        }
    }

    async fn retire(&self, code: &str) -> AuthResult<bool> {
        Ok(self.sessions.write().await.remove(code).is_some())
    }
}
