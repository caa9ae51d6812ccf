use std::collections::HashMap;
use std::net::SocketAddr;

use oidc_provider::ProviderConfig;
use oidc_provider_memory::RegisteredClient;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Issuer, lifetimes, signing key, transport policy
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Relying parties registered at startup
    #[serde(default)]
    pub clients: Vec<RegisteredClient>,
    /// Claims per subject, e.g. `[users.alice] email = "alice@example.com"`
    #[serde(default)]
    pub users: HashMap<String, HashMap<String, String>>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        self.provider.validate().map_err(|e| e.to_string())?;
        crate::observability::provider_filter(&self.logging.level)?;

        for client in &self.clients {
            if client.client_id.is_empty() {
                return Err("clients[].client_id must not be empty".into());
            }
            if client.redirect_uris.is_empty() {
                return Err(format!(
                    "client '{}' must have at least one redirect URI",
                    client.client_id
                ));
            }
        }
        Ok(())
    }

    pub fn addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("invalid server address: {e}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    /// How often expired authorization codes are swept
    #[serde(default = "default_sweep_interval_secs")]
    pub session_sweep_interval_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8443
}
fn default_body_limit() -> usize {
    64 * 1024
}
fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
            session_sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File, FileFormat};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_FILE: &str = "oidc-provider.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let path = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));

        let mut builder = Config::builder();
        if path.exists() {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        // Environment variable overrides, e.g., OIDC_PROVIDER__SERVER__PORT=9443
        builder = builder.add_source(
            Environment::with_prefix("OIDC_PROVIDER")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
