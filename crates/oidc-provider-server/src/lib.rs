pub mod config;
pub mod observability;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use oidc_provider::{AuthResult, OpenIdProvider};
use oidc_provider_memory::{
    FormAuthenticator, InMemoryClaimStore, InMemoryClientRegistry, InMemorySessionStore,
};
use tower_http::trace::TraceLayer;

pub use config::{AppConfig, LoggingConfig, ServerConfig};
pub use observability::init_tracing;

/// A started provider and the store backing its sessions.
pub struct Assembled {
    pub provider: Arc<OpenIdProvider>,
    pub sessions: Arc<InMemorySessionStore>,
}

/// Wires the in-memory collaborators from `cfg` into a provider and starts it.
///
/// Fails if the signing key cannot be loaded; the provider never serves
/// without one.
pub async fn build_provider(cfg: &AppConfig) -> AuthResult<Assembled> {
    let clients = InMemoryClientRegistry::with_clients(cfg.clients.iter().cloned());
    let claims = InMemoryClaimStore::with_subjects(cfg.users.clone());
    let sessions = Arc::new(InMemorySessionStore::new());

    let provider = OpenIdProvider::builder(cfg.provider.clone())
        .clients(Arc::new(clients))
        .sessions(sessions.clone())
        .claims(Arc::new(claims))
        .authenticator(Arc::new(FormAuthenticator::new()))
        .build();
    provider.serve().await?;

    tracing::info!(
        clients = cfg.clients.len(),
        users = cfg.users.len(),
        "Provider assembled"
    );

    Ok(Assembled {
        provider: Arc::new(provider),
        sessions,
    })
}

/// The HTTP application around `provider`.
pub fn app_router(provider: Arc<OpenIdProvider>, cfg: &AppConfig) -> Router {
    oidc_provider::router(provider)
        .layer(DefaultBodyLimit::max(cfg.server.body_limit_bytes))
        .layer(TraceLayer::new_for_http())
}

/// Builds a serving application from `cfg`.
pub async fn build_app(cfg: &AppConfig) -> AuthResult<Router> {
    let assembled = build_provider(cfg).await?;
    Ok(app_router(assembled.provider, cfg))
}

/// Periodically drops expired authorization codes until the store is gone.
pub fn spawn_session_sweeper(
    sessions: &Arc<InMemorySessionStore>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    let sessions = Arc::downgrade(sessions);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(sessions) = sessions.upgrade() else {
                break;
            };
            sessions.cleanup_expired().await;
        }
    })
}
