//! Authorization sessions.
//!
//! A session captures everything needed to issue tokens for one
//! authorization request: the client, the authenticated end-user, and the
//! request parameters that end up in the ID token.
//!
//! # Lifecycle
//!
//! 1. Built by the flow executor after the end-user authenticated
//! 2. Cached under its code (code and hybrid flows only)
//! 3. Looked up once by the token endpoint
//! 4. Retired right after tokens were issued (single use)
//!
//! Implicit flow sessions live for one request and are never cached.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::authenticator::Authenticated;
use crate::oauth::claims::{ClaimsRequest, ClaimsRequestError};
use crate::oauth::params::AuthRequest;

/// Number of random octets in an authorization code.
pub const CODE_OCTETS: usize = 32;

/// State kept between the authorization and token endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session identifier, safe to log.
    pub id: Uuid,

    /// Authorization code (one-time use). Absent for implicit flow sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Client the code was issued to.
    pub client_id: String,

    /// Redirect URI of the authorization request.
    pub redirect_uri: String,

    /// Authenticated end-user.
    pub subject: String,

    /// Identity provider that authenticated the end-user.
    #[serde(default)]
    pub issuer: String,

    /// `nonce` of the authorization request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Requested scope (space-separated).
    pub scope: String,

    /// When the end-user authenticated.
    #[serde(with = "time::serde::rfc3339")]
    pub auth_time: OffsetDateTime,

    /// `max_age` of the authorization request, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u64>,

    /// Authentication context class reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,

    /// Authentication methods references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub amr: Vec<String>,

    /// Preferred locales for returned claims, from `claim_locales` or the
    /// OpenID Connect spelling `claims_locales`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims_locales: Option<String>,

    /// Parsed `claims` request parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<ClaimsRequest>,

    /// When the session was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the code stops being exchangeable.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl Session {
    /// Builds a session from an authorization request and the end-user's
    /// authentication state.
    ///
    /// # Errors
    ///
    /// Returns `ClaimsRequestError` if the `claims` parameter is malformed.
    pub fn from_request(
        request: &AuthRequest,
        auth: &Authenticated,
        code: Option<String>,
        lifetime: Duration,
    ) -> Result<Self, ClaimsRequestError> {
        let claims = ClaimsRequest::from_param(request.param("claims"))?;
        let now = OffsetDateTime::now_utc();

        Ok(Self {
            id: Uuid::new_v4(),
            code,
            client_id: request.param("client_id").to_string(),
            redirect_uri: request.param("redirect_uri").to_string(),
            subject: auth.subject.clone(),
            issuer: auth.issuer.clone(),
            nonce: non_empty(request.param("nonce")),
            scope: request.param("scope").to_string(),
            auth_time: auth.auth_time,
            max_age: request.param("max_age").parse().ok(),
            acr: auth.acr.clone(),
            amr: auth.amr.clone(),
            claims_locales: non_empty(request.param("claim_locales"))
                .or_else(|| non_empty(request.param("claims_locales"))),
            claims,
            created_at: now,
            expires_at: now + lifetime,
        })
    }

    /// Generates a new authorization code: 32 octets from the operating
    /// system's random source, base64url-encoded without padding.
    ///
    /// # Errors
    ///
    /// Returns an error if the random source is unavailable.
    pub fn generate_code() -> Result<String, rand::Error> {
        let mut bytes = [0u8; CODE_OCTETS];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Returns `true` if the code can no longer be exchanged.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.expires_at
    }

    /// Returns `true` if `scope` contains `value` as a whole token.
    #[must_use]
    pub fn has_scope(&self, value: &str) -> bool {
        self.scope.split(' ').any(|token| token == value)
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
