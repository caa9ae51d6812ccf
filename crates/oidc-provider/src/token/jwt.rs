//! ES256 signing keys and ID token JWTs.
//!
//! All tokens are signed with one ECDSA P-256 key that is loaded once at
//! startup and shared read-only afterwards.
//!
//! ## Example
//!
//! ```ignore
//! use oidc_provider::token::jwt::{JwtService, SigningKeyPair};
//!
//! let key_pair = SigningKeyPair::from_pem("op-key", &std::fs::read_to_string("key.pem")?)?;
//! let jwt_service = JwtService::new(key_pair, "https://op.example.com");
//!
//! let token = jwt_service.encode(&claims)?;
//! let data = jwt_service.decode::<IdTokenClaims>(&token)?;
//! ```

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode,
};
use p256::SecretKey;
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rand::rngs::OsRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// JOSE name of the only supported algorithm.
pub const ALGORITHM: &str = "ES256";

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during token operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode or sign a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a token.
    #[error("Failed to decode token: {message}")]
    DecodingError {
        /// Description of the decoding error.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token names an algorithm other than ES256.
    #[error("Unsupported algorithm: {alg}")]
    UnsupportedAlgorithm {
        /// The algorithm found in the token.
        alg: String,
    },

    /// The token claims are invalid.
    #[error("Invalid claims: {message}")]
    InvalidClaims {
        /// Description of why claims are invalid.
        message: String,
    },

    /// Invalid key format or data.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },
}

impl JwtError {
    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `DecodingError`.
    #[must_use]
    pub fn decoding_error(message: impl Into<String>) -> Self {
        Self::DecodingError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidAlgorithm => Self::UnsupportedAlgorithm {
                alg: "unexpected".to_string(),
            },
            ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_) => Self::invalid_claims(err.to_string()),
            _ => Self::decoding_error(err.to_string()),
        }
    }
}

// ============================================================================
// Claims
// ============================================================================

/// ID token claims (OpenID Connect Core §2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdTokenClaims {
    /// Issuer identifier of the provider.
    pub iss: String,

    /// Subject (end-user identifier).
    pub sub: String,

    /// Audience (client ID).
    pub aud: String,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Time of end-user authentication (Unix timestamp).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,

    /// Nonce from the authorization request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Authentication context class reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,

    /// Authentication methods references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub amr: Vec<String>,

    /// Access token hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,

    /// Authorization code hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_hash: Option<String>,

    /// End-user claims requested through the `claims` parameter.
    #[serde(flatten)]
    pub additional: serde_json::Map<String, serde_json::Value>,
}

/// Computes `at_hash` / `c_hash` for an ES256 token: the base64url-encoded
/// left half of the SHA-256 digest of `value`.
#[must_use]
pub fn left_half_hash(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}

// ============================================================================
// JWKS Types
// ============================================================================

/// JSON Web Key Set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jwks {
    /// The keys in this set.
    pub keys: Vec<Jwk>,
}

/// JSON Web Key for a P-256 public key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, always `EC`.
    pub kty: String,

    /// Key ID.
    pub kid: String,

    /// Key use, always `sig`.
    #[serde(rename = "use")]
    pub use_: String,

    /// Algorithm, always `ES256`.
    pub alg: String,

    /// Curve name, always `P-256`.
    pub crv: String,

    /// X coordinate (base64url encoded).
    pub x: String,

    /// Y coordinate (base64url encoded).
    pub y: String,
}

// ============================================================================
// Signing Key Pair
// ============================================================================

/// The provider's P-256 signing key.
#[derive(Clone)]
pub struct SigningKeyPair {
    /// Key ID.
    pub kid: String,

    secret_key: SecretKey,
    signing_key: SigningKey,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    x: Vec<u8>,
    y: Vec<u8>,
}

impl std::fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

impl SigningKeyPair {
    /// Generates a fresh key pair.
    ///
    /// # Errors
    /// Returns an error if the key cannot be converted for JWT use.
    pub fn generate(kid: impl Into<String>) -> Result<Self, JwtError> {
        Self::from_secret_key(kid.into(), SecretKey::random(&mut OsRng))
    }

    /// Loads a P-256 private key from PEM (PKCS#8 `PRIVATE KEY` or SEC1
    /// `EC PRIVATE KEY`).
    ///
    /// # Errors
    /// Returns `JwtError::InvalidKey` if the PEM is malformed or does not
    /// hold a P-256 private key.
    pub fn from_pem(kid: impl Into<String>, pem: &str) -> Result<Self, JwtError> {
        let secret_key = SecretKey::from_pkcs8_pem(pem)
            .or_else(|_| SecretKey::from_sec1_pem(pem))
            .map_err(|e| JwtError::invalid_key(format!("not a P-256 private key: {e}")))?;

        Self::from_secret_key(kid.into(), secret_key)
    }

    fn from_secret_key(kid: String, secret_key: SecretKey) -> Result<Self, JwtError> {
        let signing_key = SigningKey::from(&secret_key);
        let point = signing_key.verifying_key().to_encoded_point(false);
        let x = point
            .x()
            .ok_or_else(|| JwtError::invalid_key("Missing x coordinate"))?;
        let y = point
            .y()
            .ok_or_else(|| JwtError::invalid_key("Missing y coordinate"))?;

        // jsonwebtoken only takes PKCS#8 for EC private keys
        let private_pem = secret_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;
        let encoding_key = EncodingKey::from_ec_pem(private_pem.as_bytes())
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        let decoding_key = DecodingKey::from_ec_components(
            &URL_SAFE_NO_PAD.encode(x.as_slice()),
            &URL_SAFE_NO_PAD.encode(y.as_slice()),
        )
        .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        Ok(Self {
            kid,
            x: x.to_vec(),
            y: y.to_vec(),
            secret_key,
            signing_key,
            encoding_key,
            decoding_key,
        })
    }

    /// Exports the private key as PKCS#8 PEM.
    ///
    /// # Errors
    /// Returns an error if encoding fails.
    pub fn to_pkcs8_pem(&self) -> Result<String, JwtError> {
        self.secret_key
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| JwtError::invalid_key(e.to_string()))
    }

    /// ECDSA signing key.
    #[must_use]
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// ECDSA verifying key.
    #[must_use]
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Exports the public key as a JWK.
    #[must_use]
    pub fn to_jwk(&self) -> Jwk {
        Jwk {
            kty: "EC".to_string(),
            kid: self.kid.clone(),
            use_: "sig".to_string(),
            alg: ALGORITHM.to_string(),
            crv: "P-256".to_string(),
            x: URL_SAFE_NO_PAD.encode(&self.x),
            y: URL_SAFE_NO_PAD.encode(&self.y),
        }
    }
}

// ============================================================================
// JWT Service
// ============================================================================

/// Encodes and decodes ES256 JWTs with the provider key.
///
/// Cheap to clone; the key is shared.
#[derive(Debug, Clone)]
pub struct JwtService {
    signing_key: Arc<SigningKeyPair>,
    issuer: String,
}

impl JwtService {
    /// Creates a new JWT service.
    #[must_use]
    pub fn new(signing_key: SigningKeyPair, issuer: impl Into<String>) -> Self {
        Self {
            signing_key: Arc::new(signing_key),
            issuer: issuer.into(),
        }
    }

    /// Encodes claims into a JWT string.
    ///
    /// # Errors
    /// Returns an error if encoding fails.
    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.signing_key.kid.clone());

        encode(&header, claims, &self.signing_key.encoding_key)
            .map_err(|e| JwtError::encoding_error(e.to_string()))
    }

    /// Decodes and validates a JWT issued by this provider.
    ///
    /// # Errors
    /// Returns an error if decoding or validation fails.
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<TokenData<T>, JwtError> {
        self.decode_with(token, true)
    }

    /// Decodes a JWT without validating expiration, as needed for
    /// `id_token_hint`. The signature and issuer are still checked.
    ///
    /// # Errors
    /// Returns an error if decoding fails.
    pub fn decode_allow_expired<T: DeserializeOwned>(
        &self,
        token: &str,
    ) -> Result<TokenData<T>, JwtError> {
        self.decode_with(token, false)
    }

    fn decode_with<T: DeserializeOwned>(
        &self,
        token: &str,
        validate_exp: bool,
    ) -> Result<TokenData<T>, JwtError> {
        let mut validation = Validation::new(Algorithm::ES256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = validate_exp;
        if !validate_exp {
            validation.required_spec_claims.remove("exp");
        }
        validation.validate_aud = false; // audience is the client, checked by the caller

        decode(token, &self.signing_key.decoding_key, &validation).map_err(JwtError::from)
    }

    /// The signing key.
    #[must_use]
    pub fn key(&self) -> &SigningKeyPair {
        &self.signing_key
    }

    /// Returns the issuer identifier.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the JWKS containing the public key.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        Jwks {
            keys: vec![self.signing_key.to_jwk()],
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
