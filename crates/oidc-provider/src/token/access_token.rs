//! Self-contained signed access tokens.
//!
//! Format: `<payload>;ES256;<signature>` where
//!
//! - `payload` is the base64url-encoded JSON [`AccessTokenPayload`]
//! - the signature is ECDSA P-256 over SHA-256 of `<payload>;ES256`
//!
//! The algorithm tag lies inside the signed region, so it cannot be swapped
//! without invalidating the signature. Resource servers validate tokens with
//! [`AccessToken::verify`] and the provider's public key.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::token::jwt::{ALGORITHM, JwtError};

/// Token type reported for all access tokens.
pub const TOKEN_TYPE: &str = "bearer";

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenPayload {
    /// Client the token was issued to.
    pub client_id: String,
    /// End-user the token acts for.
    pub sub: String,
    /// Granted scope (space-separated).
    pub scope: String,
    /// Time of end-user authentication (Unix timestamp).
    pub auth_time: i64,
    /// Expiration time (Unix timestamp).
    pub validity: i64,
}

/// An issued access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// The token string.
    pub token: String,
    /// Always [`TOKEN_TYPE`].
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
}

impl AccessToken {
    /// Signs `payload` with the provider key.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::EncodingError` if the payload cannot be serialized
    /// or signing fails.
    pub fn sign(
        payload: &AccessTokenPayload,
        key: &SigningKey,
        expires_in: u64,
    ) -> Result<Self, JwtError> {
        let json =
            serde_json::to_vec(payload).map_err(|e| JwtError::encoding_error(e.to_string()))?;
        let signed_region = format!("{};{ALGORITHM}", URL_SAFE_NO_PAD.encode(json));

        let signature: Signature = key
            .try_sign(signed_region.as_bytes())
            .map_err(|e| JwtError::encoding_error(e.to_string()))?;

        Ok(Self {
            token: format!(
                "{signed_region};{}",
                URL_SAFE_NO_PAD.encode(signature.to_bytes())
            ),
            token_type: TOKEN_TYPE.to_string(),
            expires_in,
        })
    }

    /// Verifies `token` and returns its payload.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::DecodingError` for a malformed token,
    /// `JwtError::UnsupportedAlgorithm` for any tag other than ES256,
    /// `JwtError::InvalidSignature`, or `JwtError::Expired`.
    pub fn verify(token: &str, key: &VerifyingKey) -> Result<AccessTokenPayload, JwtError> {
        let (signed_region, signature) = token
            .rsplit_once(';')
            .ok_or_else(|| JwtError::decoding_error("missing signature"))?;
        let (payload, alg) = signed_region
            .split_once(';')
            .ok_or_else(|| JwtError::decoding_error("missing algorithm tag"))?;

        if alg != ALGORITHM {
            return Err(JwtError::UnsupportedAlgorithm {
                alg: alg.to_string(),
            });
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .ok()
            .and_then(|bytes| Signature::from_slice(&bytes).ok())
            .ok_or(JwtError::InvalidSignature)?;
        key.verify(signed_region.as_bytes(), &signature)
            .map_err(|_| JwtError::InvalidSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| JwtError::decoding_error(e.to_string()))?;
        let payload: AccessTokenPayload =
            serde_json::from_slice(&json).map_err(|e| JwtError::decoding_error(e.to_string()))?;

        if payload.validity < OffsetDateTime::now_utc().unix_timestamp() {
            return Err(JwtError::Expired);
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::jwt::SigningKeyPair;

    fn payload(validity: i64) -> AccessTokenPayload {
        AccessTokenPayload {
            client_id: "app".to_string(),
            sub: "alice".to_string(),
            scope: "openid profile".to_string(),
            auth_time: 1_700_000_000,
            validity,
        }
    }

    fn future() -> i64 {
        OffsetDateTime::now_utc().unix_timestamp() + 300
    }

    #[test]
    fn test_sign_and_verify() {
        let key = SigningKeyPair::generate("k").unwrap();
        let token = AccessToken::sign(&payload(future()), key.signing_key(), 300).unwrap();

        assert_eq!(token.token_type, "bearer");
        assert_eq!(token.expires_in, 300);
        assert_eq!(token.token.split(';').count(), 3);
        assert_eq!(token.token.split(';').nth(1), Some("ES256"));

        let verified = AccessToken::verify(&token.token, key.verifying_key()).unwrap();
        assert_eq!(verified.client_id, "app");
        assert_eq!(verified.scope, "openid profile");
    }

    #[test]
    fn test_algorithm_tag_is_signed() {
        let key = SigningKeyPair::generate("k").unwrap();
        let token = AccessToken::sign(&payload(future()), key.signing_key(), 300).unwrap();

        let parts: Vec<&str> = token.token.split(';').collect();
        let swapped = format!("{};ES384;{}", parts[0], parts[2]);
        assert!(matches!(
            AccessToken::verify(&swapped, key.verifying_key()),
            Err(JwtError::UnsupportedAlgorithm { .. })
        ));

        // Re-signing only the payload (tag outside the signed region) must fail
        let payload_only: Signature = key.signing_key().sign(parts[0].as_bytes());
        let forged = format!(
            "{};ES256;{}",
            parts[0],
            URL_SAFE_NO_PAD.encode(payload_only.to_bytes())
        );
        assert!(matches!(
            AccessToken::verify(&forged, key.verifying_key()),
            Err(JwtError::InvalidSignature)
        ));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let key = SigningKeyPair::generate("k").unwrap();
        let token = AccessToken::sign(&payload(future()), key.signing_key(), 300).unwrap();

        let mut other = payload(future());
        other.scope = "openid admin".to_string();
        let other_json = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&other).unwrap());
        let signature = token.token.rsplit(';').next().unwrap();
        let tampered = format!("{other_json};ES256;{signature}");

        assert!(matches!(
            AccessToken::verify(&tampered, key.verifying_key()),
            Err(JwtError::InvalidSignature)
        ));
    }

    #[test]
    fn test_foreign_key_rejected() {
        let ours = SigningKeyPair::generate("k").unwrap();
        let theirs = SigningKeyPair::generate("k").unwrap();
        let token = AccessToken::sign(&payload(future()), theirs.signing_key(), 300).unwrap();
        assert!(AccessToken::verify(&token.token, ours.verifying_key()).is_err());
    }

    #[test]
    fn test_expired_rejected() {
        let key = SigningKeyPair::generate("k").unwrap();
        let token = AccessToken::sign(&payload(1_000), key.signing_key(), 300).unwrap();
        assert!(matches!(
            AccessToken::verify(&token.token, key.verifying_key()),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_malformed_rejected() {
        let key = SigningKeyPair::generate("k").unwrap();
        assert!(AccessToken::verify("", key.verifying_key()).is_err());
        assert!(AccessToken::verify("abc", key.verifying_key()).is_err());
        assert!(AccessToken::verify("abc;ES256", key.verifying_key()).is_err());
        assert!(AccessToken::verify("abc;ES256;!!", key.verifying_key()).is_err());
    }
}
