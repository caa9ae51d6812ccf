//! In-memory collaborators for `oidc-provider`.
//!
//! Everything here lives in process memory and is lost on restart. Suitable
//! for development, tests, and single-instance deployments that accept that.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use oidc_provider::{OpenIdProvider, ProviderConfig};
//! use oidc_provider_memory::{
//!     FormAuthenticator, InMemoryClaimStore, InMemoryClientRegistry, InMemorySessionStore,
//!     RegisteredClient,
//! };
//!
//! let clients = InMemoryClientRegistry::with_clients([RegisteredClient::confidential(
//!     "my-app",
//!     "secret",
//!     vec!["https://app.example.com/cb".to_string()],
//! )]);
//!
//! let provider = OpenIdProvider::builder(ProviderConfig::default())
//!     .clients(Arc::new(clients))
//!     .sessions(Arc::new(InMemorySessionStore::new()))
//!     .claims(Arc::new(InMemoryClaimStore::new()))
//!     .authenticator(Arc::new(FormAuthenticator::new()))
//!     .build();
//! ```

pub mod authenticator;
pub mod claims;
pub mod clients;
pub mod session;

pub use authenticator::FormAuthenticator;
pub use claims::InMemoryClaimStore;
pub use clients::{InMemoryClientRegistry, RegisteredClient};
pub use session::InMemorySessionStore;
