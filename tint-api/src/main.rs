//! Colorization API (tint-api) - Main entry point
//!
//! Loads configuration (CLI > environment > TOML > defaults), sweeps stale
//! scratch scopes, and serves the HTTP API until Ctrl+C or SIGTERM.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tint_api::{backend, build_router, scope, AppState};
use tint_common::config::{self, BackendMode, ConfigOverrides, ServiceConfig};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for tint-api
#[derive(Parser, Debug)]
#[command(name = "tint-api")]
#[command(about = "Photo colorization HTTP service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "TINT_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "TINT_HOST")]
    host: Option<String>,

    /// Transform strategy: local or remote
    #[arg(long, env = "TINT_BACKEND_MODE")]
    backend_mode: Option<BackendMode>,

    /// Base URL of the remote colorization service
    #[arg(long, env = "TINT_BACKEND_URL")]
    backend_url: Option<String>,

    /// Root directory for per-request scratch scopes
    #[arg(long, env = "TINT_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// TOML config file (defaults to the platform config directory)
    #[arg(short, long, env = "TINT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, env = "TINT_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            backend_mode: self.backend_mode,
            backend_url: self.backend_url.clone(),
            scratch_dir: self.scratch_dir.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(config::default_config_path);
    let toml_config = match &config_path {
        Some(path) => config::load_toml_config(path)?,
        None => Default::default(),
    };
    let config = ServiceConfig::resolve(&args.overrides(), &toml_config)?;

    // Initialize tracing once the configured level is known
    let level = config.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("tint_api={level},tint_common={level},tower_http={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting tint-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) if path.exists() => info!("Configuration file: {}", path.display()),
        Some(path) => info!("No configuration file at {}, using defaults", path.display()),
        None => info!("No platform config directory, using defaults"),
    }

    let backend = backend::from_config(&config).context("Failed to initialize transform backend")?;
    info!(
        "Transform backend: {} ({})",
        backend.name(),
        config.backend_url.as_deref().unwrap_or("in-process")
    );

    let state = AppState::new(config.clone(), backend);
    let scratch = state.pipeline.scratch().clone();
    scratch
        .ensure_root()
        .with_context(|| format!("Failed to create scratch root {}", scratch.root().display()))?;
    info!("Scratch root: {}", scratch.root().display());
    let sweeper = scope::spawn_sweeper(scratch, config.stale_after, config.sweep_interval);

    let app = build_router(state);

    let addr = config.bind_address();
    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
