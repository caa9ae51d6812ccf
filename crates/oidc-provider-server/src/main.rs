use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oidc_provider::SigningKeyPair;
use oidc_provider_server::config::loader::load_config;
use oidc_provider_server::{
    AppConfig, app_router, build_provider, observability, spawn_session_sweeper,
};

#[derive(Parser)]
#[command(name = "oidc-provider")]
#[command(about = "OpenID Connect provider", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "OIDC_PROVIDER_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the provider (default)
    Serve,

    /// Generate a P-256 signing key in PKCS#8 PEM
    GenerateKey {
        /// Output path (defaults to provider.signing.key_file)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    observability::init_tracing();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cfg = load_config(cli.config.as_deref())
        .map_err(anyhow::Error::msg)
        .context("Configuration error")?;
    observability::apply_logging_level(&cfg.logging.level).map_err(anyhow::Error::msg)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(cfg).await,
        Commands::GenerateKey { out, force } => generate_key(&cfg, out, force).await,
    }
}

async fn serve(cfg: AppConfig) -> Result<()> {
    let addr = cfg.addr().map_err(anyhow::Error::msg)?;

    let assembled = build_provider(&cfg)
        .await
        .context("Provider initialization failed")?;
    let sweeper = spawn_session_sweeper(
        &assembled.sessions,
        Duration::from_secs(cfg.server.session_sweep_interval_secs.max(1)),
    );

    let app = app_router(assembled.provider.clone(), &cfg);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot bind {addr}"))?;

    tracing::info!(%addr, issuer = %cfg.provider.issuer, "Listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    assembled.provider.shutdown();
    sweeper.abort();
    served.context("Server error")
}

async fn generate_key(cfg: &AppConfig, out: Option<PathBuf>, force: bool) -> Result<()> {
    let path = out
        .or_else(|| cfg.provider.signing.key_file.clone())
        .context("No output path: pass --out or set provider.signing.key_file")?;

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let pem = SigningKeyPair::generate(cfg.provider.signing.key_id.clone())
        .and_then(|key| key.to_pkcs8_pem())
        .context("Key generation failed")?;

    tokio::fs::write(&path, pem)
        .await
        .with_context(|| format!("Cannot write {}", path.display()))?;

    tracing::info!(path = %path.display(), kid = %cfg.provider.signing.key_id, "Signing key written");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
