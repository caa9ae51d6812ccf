//! Claim store trait.

use async_trait::async_trait;

/// Read access to end-user claims such as `email` or `name`.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Returns the value of `claim` for `subject`, if known.
    async fn get(&self, subject: &str, claim: &str) -> Option<String>;

    /// Returns the value of `claim`, or `default` when unknown, together
    /// with whether it was found.
    async fn get_or(&self, subject: &str, claim: &str, default: &str) -> (String, bool) {
        match self.get(subject, claim).await {
            Some(value) => (value, true),
            None => (default.to_string(), false),
        }
    }
}
