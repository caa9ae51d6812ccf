//! The `claims` request parameter (OpenID Connect Core §5.5).
//!
//! ```json
//! {
//!   "userinfo": { "email": { "essential": true }, "nickname": null },
//!   "id_token": { "sub": { "value": "248289761001" },
//!                 "acr": { "values": ["urn:mace:incommon:iap:silver"] } }
//! }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Errors that can occur while reading a `claims` parameter.
#[derive(Debug, thiserror::Error)]
pub enum ClaimsRequestError {
    /// The parameter is not a valid claims request object.
    #[error("Malformed claims request: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A level of the request that must be a JSON object is something else.
    #[error("Malformed claims request: {0} is not a JSON object")]
    NotAnObject(String),
}

/// Deserialized `claims` request parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimsRequest {
    /// Claims requested from the UserInfo endpoint.
    #[serde(
        default,
        deserialize_with = "claim_map",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub userinfo: HashMap<String, ClaimRequest>,

    /// Claims requested in the ID token.
    #[serde(
        default,
        deserialize_with = "claim_map",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub id_token: HashMap<String, ClaimRequest>,
}

/// Constraints on a single requested claim.
///
/// A `null` member in the request yields the default: no constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimRequest {
    /// The claim is required for the client to work.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub essential: bool,

    /// The claim must have exactly this value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// The claim must have one of these values, in order of preference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
}

impl ClaimRequest {
    /// Returns `true` if no value constraint is set.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.value.is_none() && self.values.is_none()
    }

    /// Returns `true` if `candidate` satisfies the `value`/`values` constraint.
    #[must_use]
    pub fn accepts(&self, candidate: &str) -> bool {
        let matches = |v: &Value| v.as_str() == Some(candidate);
        if let Some(ref value) = self.value {
            if !matches(value) {
                return false;
            }
        }
        if let Some(ref values) = self.values {
            if !values.iter().any(matches) {
                return false;
            }
        }
        true
    }
}

impl ClaimsRequest {
    /// Parses a claims request from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns `ClaimsRequestError::Malformed` if the input is not a JSON
    /// object of the expected shape.
    pub fn parse(data: &str) -> Result<Self, ClaimsRequestError> {
        let value: Value = serde_json::from_str(data)?;
        check_shape(&value)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Parses the raw `claims` parameter; an empty parameter means no request.
    ///
    /// # Errors
    ///
    /// Returns `ClaimsRequestError::Malformed` for a non-empty unparsable value.
    pub fn from_param(param: &str) -> Result<Option<Self>, ClaimsRequestError> {
        if param.is_empty() {
            return Ok(None);
        }
        Self::parse(param).map(Some)
    }

    /// Returns `true` if `claim` is requested as essential in `section`.
    #[must_use]
    pub fn is_essential(&self, section: ClaimSection, claim: &str) -> bool {
        self.section(section)
            .get(claim)
            .is_some_and(|request| request.essential)
    }

    /// Returns the claim map of `section`.
    #[must_use]
    pub fn section(&self, section: ClaimSection) -> &HashMap<String, ClaimRequest> {
        match section {
            ClaimSection::Userinfo => &self.userinfo,
            ClaimSection::IdToken => &self.id_token,
        }
    }

    /// All constraints placed on `sub`, across both sections.
    pub fn subject_constraints(&self) -> impl Iterator<Item = &ClaimRequest> {
        self.id_token
            .get("sub")
            .into_iter()
            .chain(self.userinfo.get("sub"))
            .filter(|request| !request.is_default())
    }
}

/// The two top-level members of a claims request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimSection {
    /// `userinfo`
    Userinfo,
    /// `id_token`
    IdToken,
}

/// Derived struct deserializers also accept sequences, which would read a
/// JSON array positionally. Only objects (or `null` below the top level)
/// are valid claims request members.
fn check_shape(value: &Value) -> Result<(), ClaimsRequestError> {
    let Value::Object(top) = value else {
        return Err(ClaimsRequestError::NotAnObject("claims".to_string()));
    };

    for section in ["userinfo", "id_token"] {
        match top.get(section) {
            None | Some(Value::Null) => {}
            Some(Value::Object(members)) => {
                for (name, member) in members {
                    if !matches!(member, Value::Null | Value::Object(_)) {
                        return Err(ClaimsRequestError::NotAnObject(format!("{section}.{name}")));
                    }
                }
            }
            Some(_) => return Err(ClaimsRequestError::NotAnObject(section.to_string())),
        }
    }
    Ok(())
}

fn claim_map<'de, D>(deserializer: D) -> Result<HashMap<String, ClaimRequest>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<HashMap<String, Option<ClaimRequest>>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(name, request)| (name, request.unwrap_or_default()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_essential_userinfo_claim() {
        let claims = ClaimsRequest::parse(r#"{"userinfo":{"email":{"essential":true}}}"#).unwrap();

        assert!(claims.is_essential(ClaimSection::Userinfo, "email"));
        assert!(!claims.is_essential(ClaimSection::IdToken, "email"));
        assert!(claims.id_token.is_empty());
        assert!(!claims.section(ClaimSection::IdToken).contains_key("email"));
    }

    #[test]
    fn test_null_member_is_default() {
        let claims =
            ClaimsRequest::parse(r#"{"userinfo":{"nickname":null},"id_token":null}"#).unwrap();
        let nickname = &claims.userinfo["nickname"];
        assert!(nickname.is_default());
        assert!(!nickname.essential);
        assert!(nickname.accepts("anything"));
    }

    #[test]
    fn test_value_and_values() {
        let claims = ClaimsRequest::parse(
            r#"{"id_token":{
                "sub":{"value":"248289761001"},
                "acr":{"essential":true,"values":["urn:a","urn:b"]}
            }}"#,
        )
        .unwrap();

        let sub = &claims.id_token["sub"];
        assert!(sub.accepts("248289761001"));
        assert!(!sub.accepts("someone-else"));

        let acr = &claims.id_token["acr"];
        assert!(acr.essential);
        assert!(acr.accepts("urn:b"));
        assert!(!acr.accepts("urn:c"));
    }

    #[test]
    fn test_subject_constraints() {
        let claims = ClaimsRequest::parse(
            r#"{"id_token":{"sub":{"value":"bob"}},"userinfo":{"sub":null}}"#,
        )
        .unwrap();
        let constraints: Vec<_> = claims.subject_constraints().collect();
        assert_eq!(constraints.len(), 1);
        assert!(!constraints[0].accepts("alice"));
    }

    #[test]
    fn test_malformed_is_an_error() {
        assert!(ClaimsRequest::parse("not json").is_err());
        assert!(ClaimsRequest::parse("[]").is_err());
        assert!(ClaimsRequest::parse(r#"{"id_token":{"sub":"bob"}}"#).is_err());
        assert!(ClaimsRequest::parse(r#"{"userinfo":{"email":{"essential":"yes"}}}"#).is_err());
    }

    #[test]
    fn test_arrays_are_not_read_positionally() {
        let err = ClaimsRequest::parse(r#"[{}, {"sub":{"value":"bob"}}]"#).unwrap_err();
        assert!(matches!(err, ClaimsRequestError::NotAnObject(ref at) if at == "claims"));

        let err = ClaimsRequest::parse(r#"{"id_token":[{"value":"bob"}]}"#).unwrap_err();
        assert!(matches!(err, ClaimsRequestError::NotAnObject(ref at) if at == "id_token"));

        let err = ClaimsRequest::parse(r#"{"id_token":{"sub":[false, "bob"]}}"#).unwrap_err();
        assert!(matches!(err, ClaimsRequestError::NotAnObject(ref at) if at == "id_token.sub"));

        assert!(ClaimsRequest::parse("42").is_err());
        assert!(ClaimsRequest::parse("null").is_err());
    }

    #[test]
    fn test_empty_param_means_no_request() {
        assert!(ClaimsRequest::from_param("").unwrap().is_none());
        assert!(ClaimsRequest::from_param("{}").unwrap().is_some());
        assert!(ClaimsRequest::from_param("{").is_err());
    }

    #[test]
    fn test_unknown_members_ignored() {
        let claims = ClaimsRequest::parse(r#"{"vendor_ext":{"x":1}}"#).unwrap();
        assert_eq!(claims, ClaimsRequest::default());
    }
}
