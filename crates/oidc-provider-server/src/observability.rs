//! Log setup for the provider binary.
//!
//! The filter starts at `info` so that configuration errors are visible,
//! then switches to `logging.level` once the configuration is loaded.
//! `RUST_LOG`, when set, replaces both.
use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

/// Dependencies that are chatty at `debug` and below.
const QUIET_CRATES: &[&str] = &["hyper=warn", "hyper_util=warn", "h2=warn"];

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Builds the filter for a configured level, keeping transport crates quiet.
///
/// `level` may be a bare level (`debug`) or full directives
/// (`oidc_provider=trace,info`).
pub fn provider_filter(level: &str) -> Result<EnvFilter, String> {
    let mut filter =
        EnvFilter::try_new(level).map_err(|e| format!("invalid logging.level {level:?}: {e}"))?;
    for directive in QUIET_CRATES {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    Ok(filter)
}

pub fn init_tracing() {
    let filter = match std::env::var_os("RUST_LOG") {
        Some(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        None => provider_filter("info").unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let (layer, handle) = reload::Layer::new(filter);
    let _ = FILTER_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Switches to the configured level. An explicit `RUST_LOG` is left alone.
pub fn apply_logging_level(level: &str) -> Result<(), String> {
    if std::env::var_os("RUST_LOG").is_some() {
        return Ok(());
    }
    let filter = provider_filter(level)?;
    if let Some(handle) = FILTER_HANDLE.get() {
        handle
            .reload(filter)
            .map_err(|e| format!("cannot apply logging level: {e}"))?;
    }
    tracing::debug!(level, "Logging level applied");
    Ok(())
}
