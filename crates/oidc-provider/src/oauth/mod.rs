//! OpenID Connect authorization server protocol logic.
//!
//! # Authorization endpoint
//!
//! - [`params`] - parameter access over GET query or POST form
//! - [`validation`] - Rules 1-4 and the redirect URI policy
//! - [`flow`] - `response_type` classification
//! - [`flows`] - authorization code, implicit, and hybrid execution
//! - [`authorize`] - the orchestrating state machine
//!
//! # Token endpoint
//!
//! - [`token`] - authorization code exchange
//!
//! # Shared types
//!
//! - [`claims`] - the `claims` request parameter
//! - [`session`] - state carried from authorization to token exchange
//! - [`response`] - success and error responses and their redirect encoding

pub mod authorize;
pub mod claims;
pub mod flow;
pub mod flows;
pub mod params;
pub mod response;
pub mod session;
pub mod token;
pub mod validation;

pub use authorize::{AuthorizationService, AuthorizeOutcome, AuthorizeResponse};
pub use claims::{ClaimRequest, ClaimSection, ClaimsRequest, ClaimsRequestError};
pub use flow::{Flow, ResponseMode};
pub use flows::FlowExecutor;
pub use params::{AuthRequest, Params, get_param};
pub use response::{AuthErrorResponse, AuthResponse, AuthSuccessResponse, ErrorCode};
pub use session::Session;
pub use token::{TokenExchangeService, TokenOutcome, TokenRequest};
pub use validation::{
    check_redirect_uri, validate_oauth_params, validate_required_params, validate_scope_param,
    validate_subject,
};
