//! Token signing and issuance.
//!
//! - [`jwt`] - ES256 key handling and ID token JWTs
//! - [`access_token`] - self-contained signed access tokens
//! - [`issuer`] - builds both from an authorization session

pub mod access_token;
pub mod issuer;
pub mod jwt;

pub use access_token::{AccessToken, AccessTokenPayload, TOKEN_TYPE};
pub use issuer::{TokenBindings, TokenIssuer};
pub use jwt::{IdTokenClaims, Jwk, Jwks, JwtError, JwtService, SigningKeyPair};
