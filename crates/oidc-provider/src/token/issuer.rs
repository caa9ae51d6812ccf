//! Token issuance from authorization sessions.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use crate::config::ProviderConfig;
use crate::oauth::session::Session;
use crate::storage::ClaimStore;
use crate::token::access_token::{AccessToken, AccessTokenPayload};
use crate::token::jwt::{IdTokenClaims, JwtError, JwtService, left_half_hash};

/// Claims that are set by the provider and never taken from the claim store.
const PROTOCOL_CLAIMS: &[&str] = &[
    "iss", "sub", "aud", "exp", "iat", "auth_time", "nonce", "acr", "amr", "azp", "at_hash",
    "c_hash",
];

/// Artifacts issued in the same response as an ID token, bound to it by hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenBindings<'a> {
    /// Access token to bind via `at_hash`.
    pub access_token: Option<&'a str>,
    /// Authorization code to bind via `c_hash`.
    pub code: Option<&'a str>,
}

/// Issues ID tokens and access tokens with the provider key.
pub struct TokenIssuer {
    jwt: JwtService,
    claims: Arc<dyn ClaimStore>,
    id_token_lifetime: Duration,
    access_token_lifetime: Duration,
}

impl TokenIssuer {
    /// Creates an issuer using lifetimes from `config`.
    #[must_use]
    pub fn new(jwt: JwtService, claims: Arc<dyn ClaimStore>, config: &ProviderConfig) -> Self {
        Self {
            jwt,
            claims,
            id_token_lifetime: config.id_token_lifetime,
            access_token_lifetime: config.access_token_lifetime,
        }
    }

    /// The JWT service holding the signing key.
    #[must_use]
    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Builds and signs an ID token for `session`.
    ///
    /// Claims requested under `id_token` in the session's claims request are
    /// looked up in the claim store and included when found.
    ///
    /// # Errors
    ///
    /// Returns `JwtError` if signing fails.
    pub async fn new_id_token(
        &self,
        session: &Session,
        bindings: TokenBindings<'_>,
    ) -> Result<String, JwtError> {
        let now = OffsetDateTime::now_utc();

        let mut additional = serde_json::Map::new();
        if let Some(ref request) = session.claims {
            for name in request.id_token.keys() {
                if PROTOCOL_CLAIMS.contains(&name.as_str()) {
                    continue;
                }
                if let Some(value) = self.claims.get(&session.subject, name).await {
                    additional.insert(name.clone(), serde_json::Value::String(value));
                }
            }
        }

        let claims = IdTokenClaims {
            iss: self.jwt.issuer().to_string(),
            sub: session.subject.clone(),
            aud: session.client_id.clone(),
            exp: expiry(now, self.id_token_lifetime)?,
            iat: now.unix_timestamp(),
            auth_time: Some(session.auth_time.unix_timestamp()),
            nonce: session.nonce.clone(),
            acr: session.acr.clone(),
            amr: session.amr.clone(),
            at_hash: bindings.access_token.map(left_half_hash),
            c_hash: bindings.code.map(left_half_hash),
            additional,
        };

        self.jwt.encode(&claims)
    }

    /// Builds and signs an access token for `session`.
    ///
    /// # Errors
    ///
    /// Returns `JwtError` if signing fails.
    pub fn new_access_token(&self, session: &Session) -> Result<AccessToken, JwtError> {
        let now = OffsetDateTime::now_utc();
        let payload = AccessTokenPayload {
            client_id: session.client_id.clone(),
            sub: session.subject.clone(),
            scope: session.scope.clone(),
            auth_time: session.auth_time.unix_timestamp(),
            validity: expiry(now, self.access_token_lifetime)?,
        };

        AccessToken::sign(
            &payload,
            self.jwt.key().signing_key(),
            self.access_token_lifetime.as_secs(),
        )
    }
}

/// `now + lifetime` as a Unix timestamp.
fn expiry(now: OffsetDateTime, lifetime: Duration) -> Result<i64, JwtError> {
    time::Duration::try_from(lifetime)
        .ok()
        .and_then(|lifetime| now.checked_add(lifetime))
        .map(OffsetDateTime::unix_timestamp)
        .ok_or_else(|| JwtError::encoding_error("token lifetime out of range"))
}
