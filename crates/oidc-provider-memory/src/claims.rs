use std::collections::HashMap;

use async_trait::async_trait;
use oidc_provider::ClaimStore;
use tokio::sync::RwLock;

/// Claim values per subject.
#[derive(Debug, Default)]
pub struct InMemoryClaimStore {
    claims: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl InMemoryClaimStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store from `subject -> claim -> value` entries.
    pub fn with_subjects(subjects: HashMap<String, HashMap<String, String>>) -> Self {
        Self {
            claims: RwLock::new(subjects),
        }
    }

    /// Sets one claim for `subject`.
    pub async fn insert(
        &self,
        subject: impl Into<String>,
        claim: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.claims
            .write()
            .await
            .entry(subject.into())
            .or_default()
            .insert(claim.into(), value.into());
    }
}

#[async_trait]
impl ClaimStore for InMemoryClaimStore {
    async fn get(&self, subject: &str, claim: &str) -> Option<String> {
        self.claims
            .read()
            .await
            .get(subject)
            .and_then(|claims| claims.get(claim))
            .cloned()
    }
}
