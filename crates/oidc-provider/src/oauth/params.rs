//! Request parameter access.
//!
//! OAuth 2.0 and OpenID Connect endpoints accept parameters either in the
//! query string (GET) or as an `application/x-www-form-urlencoded` body
//! (POST). [`AuthRequest`] normalizes both into one lookup so validation and
//! flow code never care which transport was used.

use std::collections::HashMap;

use axum::http::{HeaderMap, Method, Uri};

/// Decoded request parameters, first value per name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: HashMap<String, String>,
}

impl Params {
    /// Parses URL-encoded `name=value` pairs. Repeated names keep their first value.
    #[must_use]
    pub fn parse(input: &[u8]) -> Self {
        let mut values = HashMap::new();
        for (name, value) in url::form_urlencoded::parse(input) {
            values
                .entry(name.into_owned())
                .or_insert_with(|| value.into_owned());
        }
        Self { values }
    }

    /// Returns the parameter value, or `""` when absent.
    #[must_use]
    pub fn get(&self, name: &str) -> &str {
        self.values.get(name).map(String::as_str).unwrap_or("")
    }

    /// Returns `true` if the parameter is present and non-empty.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        !self.get(name).is_empty()
    }

    /// Iterates over all parameters.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = HashMap::new();
        for (name, value) in iter {
            values.entry(name.into()).or_insert_with(|| value.into());
        }
        Self { values }
    }
}

/// An inbound protocol request as seen by the provider core.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// HTTP method.
    pub method: Method,
    /// Request URI as received (path and query).
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
    params: Params,
}

impl AuthRequest {
    /// Builds a request, reading parameters from the query string for GET
    /// and from the form body for POST. Other methods carry no parameters.
    #[must_use]
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: &[u8]) -> Self {
        let params = match method {
            Method::GET => Params::parse(uri.query().unwrap_or("").as_bytes()),
            Method::POST => Params::parse(body),
            _ => Params::default(),
        };

        Self {
            method,
            uri,
            headers,
            params,
        }
    }

    /// Returns the named parameter, or `""` when absent.
    ///
    /// Absent and empty parameters are indistinguishable; callers treat
    /// both as "not provided".
    #[must_use]
    pub fn param(&self, name: &str) -> &str {
        self.params.get(name)
    }

    /// Returns the `state` parameter to echo back in responses.
    #[must_use]
    pub fn state(&self) -> &str {
        self.param("state")
    }

    /// All decoded parameters.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Returns the request path and query, used to re-issue the same request.
    #[must_use]
    pub fn request_uri(&self) -> String {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string())
    }
}

/// Returns the named parameter of `request`. See [`AuthRequest::param`].
#[must_use]
pub fn get_param<'a>(request: &'a AuthRequest, name: &str) -> &'a str {
    request.param(name)
}
