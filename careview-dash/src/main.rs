//! careview-dash - appointment reconciliation dashboard service
//!
//! Serves reconciled Bookings/Airtable appointment data and contact-list
//! tools as JSON for the dashboard UI.
//!
//! Configuration priority: CLI argument → environment → TOML file → defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use careview_common::config::{load_toml_config, resolve_config_path, write_toml_config};
use careview_common::TomlConfig;
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use careview_dash::{build_router, AppState};

/// Command-line arguments for careview-dash
#[derive(Parser, Debug)]
#[command(name = "careview-dash")]
#[command(about = "Appointment reconciliation dashboard service")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "CAREVIEW_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind (overrides [server] host)
    #[arg(long, env = "CAREVIEW_HOST")]
    host: Option<String>,

    /// Port to listen on (overrides [server] port)
    #[arg(short, long, env = "CAREVIEW_PORT")]
    port: Option<u16>,

    /// Write the effective configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing starts so [logging] level can apply;
    // load problems are reported once the subscriber is up
    let config_path = resolve_config_path(args.config.as_deref());
    let (mut config, load_error) = match config_path.as_deref() {
        Some(path) => match load_toml_config(path) {
            Ok(config) => (config, None),
            Err(e) => (TomlConfig::default(), Some(e)),
        },
        None => (TomlConfig::default(), None),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("careview_dash={0},careview_common={0},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting careview-dash v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match (&config_path, load_error) {
        (Some(path), None) => info!("Config file: {}", path.display()),
        (Some(path), Some(e)) => warn!("Failed to load config {}: {}. Using defaults.", path.display(), e),
        (None, _) => info!("No config file; using defaults and environment"),
    }
    config.apply_env_overrides();

    config.validate().context("Invalid configuration")?;

    if let Some(target) = args.write_config {
        write_toml_config(&config, &target)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        info!("Wrote configuration to {}", target.display());
        return Ok(());
    }

    if config.graph.access_token.is_none() {
        warn!("No Graph access token; Bookings data will be unavailable");
    }
    if config.airtable.api_key.is_none() || config.airtable.base_id.is_none() {
        warn!("Airtable not fully configured; Airtable data will be unavailable");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = AppState::from_config(config).context("Failed to build upstream clients")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("careview-dash listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
