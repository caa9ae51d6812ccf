//! In-memory client registry.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use oidc_provider::{ApplicationType, AuthRequest, ClientAuthentication, ClientRegistry};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// A registered relying party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClient {
    /// Client identifier.
    pub client_id: String,
    /// Shared secret. Public clients have none.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Web or native.
    #[serde(default)]
    pub application_type: ApplicationType,
    /// Exact redirect URIs the client may use.
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

impl RegisteredClient {
    /// A confidential web client.
    pub fn confidential(
        client_id: impl Into<String>,
        secret: impl Into<String>,
        redirect_uris: Vec<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Some(secret.into()),
            application_type: ApplicationType::Web,
            redirect_uris,
            name: None,
        }
    }

    /// A public client without a secret.
    pub fn public(
        client_id: impl Into<String>,
        application_type: ApplicationType,
        redirect_uris: Vec<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            application_type,
            redirect_uris,
            name: None,
        }
    }
}

/// Client registry backed by a map of [`RegisteredClient`]s.
#[derive(Debug, Default)]
pub struct InMemoryClientRegistry {
    clients: RwLock<HashMap<String, RegisteredClient>>,
}

impl InMemoryClientRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding `clients`.
    pub fn with_clients(clients: impl IntoIterator<Item = RegisteredClient>) -> Self {
        let clients = clients
            .into_iter()
            .map(|client| (client.client_id.clone(), client))
            .collect();
        Self {
            clients: RwLock::new(clients),
        }
    }

    /// Adds or replaces a client.
    pub async fn register(&self, client: RegisteredClient) {
        tracing::debug!(client_id = %client.client_id, "Client registered");
        self.clients
            .write()
            .await
            .insert(client.client_id.clone(), client);
    }

    /// Looks up a client.
    pub async fn get(&self, client_id: &str) -> Option<RegisteredClient> {
        self.clients.read().await.get(client_id).cloned()
    }
}

#[async_trait]
impl ClientRegistry for InMemoryClientRegistry {
    async fn is_client(&self, client_id: &str) -> bool {
        self.clients.read().await.contains_key(client_id)
    }

    async fn application_type(&self, client_id: &str) -> ApplicationType {
        self.clients
            .read()
            .await
            .get(client_id)
            .map(|client| client.application_type)
            .unwrap_or_default()
    }

    async fn validate_redirect_uri(&self, client_id: &str, redirect_uri: &str) -> bool {
        self.clients
            .read()
            .await
            .get(client_id)
            .is_some_and(|client| client.redirect_uris.iter().any(|uri| uri == redirect_uri))
    }

    async fn authenticate_client(
        &self,
        client_id: &str,
        request: &AuthRequest,
    ) -> ClientAuthentication {
        let Some(client) = self.get(client_id).await else {
            return ClientAuthentication::NotAllowed("unknown client".to_string());
        };

        let presented = match basic_credentials(request) {
            Some(Ok((id, secret))) if id == client_id => Some(secret),
            Some(Ok(_)) => {
                return ClientAuthentication::NotAllowed(
                    "Basic credentials name another client".to_string(),
                );
            }
            Some(Err(reason)) => return ClientAuthentication::NotAllowed(reason),
            None => Some(request.param("client_secret").to_string()).filter(|s| !s.is_empty()),
        };

        match (&client.client_secret, presented) {
            (None, _) => ClientAuthentication::Authenticated,
            (Some(_), None) => ClientAuthentication::MustAuthenticate,
            (Some(expected), Some(given)) if *expected == given => {
                ClientAuthentication::Authenticated
            }
            (Some(_), Some(_)) => ClientAuthentication::NotAllowed("wrong secret".to_string()),
        }
    }
}

/// Reads `Authorization: Basic` credentials, if the header is present.
fn basic_credentials(request: &AuthRequest) -> Option<Result<(String, String), String>> {
    let header = request.headers.get(axum::http::header::AUTHORIZATION)?;
    let Ok(header) = header.to_str() else {
        return Some(Err("Authorization header is not valid ASCII".to_string()));
    };
    Some(parse_basic_auth(header))
}

fn parse_basic_auth(header: &str) -> Result<(String, String), String> {
    let credentials = header
        .strip_prefix("Basic ")
        .ok_or_else(|| "Authorization header must start with 'Basic '".to_string())?;

    let decoded = STANDARD
        .decode(credentials)
        .map_err(|_| "Invalid base64 encoding in Authorization header".to_string())?;

    let credentials = String::from_utf8(decoded)
        .map_err(|_| "Invalid UTF-8 in decoded credentials".to_string())?;

    let (client_id, secret) = credentials
        .split_once(':')
        .ok_or_else(|| "Credentials must be in format 'id:secret'".to_string())?;

    Ok((client_id.to_string(), secret.to_string()))
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue, Method, header};

    use super::*;

    const CB: &str = "https://app.example.com/cb";

    fn registry() -> InMemoryClientRegistry {
        InMemoryClientRegistry::with_clients([
            RegisteredClient::confidential("web", "s3cret", vec![CB.to_string()]),
            RegisteredClient::public(
                "cli",
                ApplicationType::Native,
                vec!["http://localhost:8080/cb".to_string()],
            ),
        ])
    }

    fn token_request(authorization: Option<&str>, body: &str) -> AuthRequest {
        let mut headers = HeaderMap::new();
        if let Some(value) = authorization {
            headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        AuthRequest::new(
            Method::POST,
            "/token".parse().unwrap(),
            headers,
            body.as_bytes(),
        )
    }

    fn basic(id: &str, secret: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{id}:{secret}")))
    }

    #[test]
    fn test_parse_basic_auth() {
        let (id, secret) = parse_basic_auth(&basic("web", "s3cret")).unwrap();
        assert_eq!(id, "web");
        assert_eq!(secret, "s3cret");

        assert!(parse_basic_auth("Bearer abc").is_err());
        assert!(parse_basic_auth("Basic !!!").is_err());
        assert!(parse_basic_auth(&format!("Basic {}", STANDARD.encode("nocolon"))).is_err());
    }

    #[tokio::test]
    async fn test_lookup() {
        let registry = registry();

        assert!(registry.is_client("web").await);
        assert!(!registry.is_client("nobody").await);
        assert_eq!(
            registry.application_type("cli").await,
            ApplicationType::Native
        );
        assert!(registry.validate_redirect_uri("web", CB).await);
        assert!(!registry.validate_redirect_uri("web", "https://app.example.com/other").await);
        assert!(!registry.validate_redirect_uri("cli", CB).await);
    }

    #[tokio::test]
    async fn test_confidential_client_authentication() {
        let registry = registry();

        let via_header = token_request(Some(&basic("web", "s3cret")), "");
        assert_eq!(
            registry.authenticate_client("web", &via_header).await,
            ClientAuthentication::Authenticated
        );

        let via_form = token_request(None, "client_secret=s3cret");
        assert_eq!(
            registry.authenticate_client("web", &via_form).await,
            ClientAuthentication::Authenticated
        );

        let missing = token_request(None, "");
        assert_eq!(
            registry.authenticate_client("web", &missing).await,
            ClientAuthentication::MustAuthenticate
        );

        let wrong = token_request(Some(&basic("web", "guess")), "");
        assert!(matches!(
            registry.authenticate_client("web", &wrong).await,
            ClientAuthentication::NotAllowed(_)
        ));

        let other = token_request(Some(&basic("cli", "")), "");
        assert!(matches!(
            registry.authenticate_client("web", &other).await,
            ClientAuthentication::NotAllowed(_)
        ));
    }

    #[tokio::test]
    async fn test_public_and_unknown_clients() {
        let registry = registry();
        let empty = token_request(None, "");

        assert_eq!(
            registry.authenticate_client("cli", &empty).await,
            ClientAuthentication::Authenticated
        );
        assert!(matches!(
            registry.authenticate_client("nobody", &empty).await,
            ClientAuthentication::NotAllowed(_)
        ));
    }

    #[tokio::test]
    async fn test_register_replaces() {
        let registry = InMemoryClientRegistry::new();
        registry
            .register(RegisteredClient::public("a", ApplicationType::Web, vec![]))
            .await;
        registry
            .register(RegisteredClient::public(
                "a",
                ApplicationType::Web,
                vec![CB.to_string()],
            ))
            .await;

        assert!(registry.validate_redirect_uri("a", CB).await);
    }

    #[test]
    fn test_deserialize_client() {
        let client: RegisteredClient = serde_json::from_str(
            r#"{"client_id":"x","application_type":"native","redirect_uris":["myapp:/cb"]}"#,
        )
        .unwrap();

        assert_eq!(client.application_type, ApplicationType::Native);
        assert!(client.client_secret.is_none());
    }
}
