//! Flow classification and response mode selection.

use std::fmt;

/// The OpenID Connect flow selected by a `response_type` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    /// `code`
    AuthorizationCode,
    /// `id_token`, `id_token token`
    Implicit,
    /// `code id_token`, `code token`, `code id_token token`
    Hybrid,
    /// Any other value.
    Unknown,
}

impl Flow {
    /// Classifies a `response_type` value. Matching is exact.
    #[must_use]
    pub fn classify(response_type: &str) -> Self {
        match response_type {
            "code" => Self::AuthorizationCode,
            "id_token" | "id_token token" => Self::Implicit,
            "code id_token" | "code token" | "code id_token token" => Self::Hybrid,
            _ => Self::Unknown,
        }
    }

    /// Returns `true` for any flow other than [`Flow::Unknown`].
    #[must_use]
    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Where authorization endpoint responses are encoded for this flow.
    #[must_use]
    pub fn response_mode(self) -> ResponseMode {
        match self {
            Self::AuthorizationCode | Self::Unknown => ResponseMode::Query,
            Self::Implicit | Self::Hybrid => ResponseMode::Fragment,
        }
    }

    /// Returns the flow name for logging.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::Implicit => "implicit",
            Self::Hybrid => "hybrid",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How response parameters are attached to the redirect URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseMode {
    /// `?code=...&state=...`
    Query,
    /// `#id_token=...&state=...`
    Fragment,
}

/// Returns `true` if `response_type` requests an access token from the
/// authorization endpoint.
#[must_use]
pub fn requests_access_token(response_type: &str) -> bool {
    response_type.split(' ').any(|part| part == "token")
}
