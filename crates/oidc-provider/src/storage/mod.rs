//! Collaborator traits for provider state.
//!
//! - [`SessionStore`] - pending authorization sessions, keyed by code
//! - [`ClientRegistry`] - registered relying parties
//! - [`ClaimStore`] - end-user claims
//!
//! An in-memory implementation of all three lives in the
//! `oidc-provider-memory` crate.

pub mod claims;
pub mod client;
pub mod session;

pub use claims::ClaimStore;
pub use client::{ApplicationType, ClientAuthentication, ClientRegistry};
pub use session::SessionStore;
