//! gref daemon entry point.
//!
//! Loads configuration, boots the selected storage backend, serves the HTTP
//! API, and shuts down gracefully on SIGINT/SIGTERM.

mod signals;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gref_core::backend;
use gref_core::config::AppConfig;
use gref_web::WebServer;

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// Canonical identity registry daemon.
#[derive(Parser, Debug)]
#[command(
    name = "gref-daemon",
    version,
    about = "Canonical identity registry across source systems"
)]
struct Args {
    /// Path to the TOML configuration file. Defaults plus environment
    /// overrides are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the log level from the config file (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_and_resolve(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => {
            let mut config = AppConfig::default();
            config
                .resolve_env_vars()
                .context("failed to resolve environment variables in config")?;
            config
                .validate()
                .context("configuration validation failed")?;
            Ok(config)
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.server.log_level);

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .init();

    info!("========================================");
    info!("  gref daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    match &args.config {
        Some(path) => info!("Config file   : {}", path.display()),
        None => info!("Config file   : (defaults)"),
    }
    info!("Backend       : {}", config.registry.backend);
    info!("Sources       : {}", config.registry.sources.join(", "));
    info!("Object types  : {}", config.registry.object_types.join(", "));
    info!("Listen        : {}", config.server.listen);
    info!("Base URL      : {}", config.server.base_url);
    info!("Log level     : {}", log_level);
    info!("========================================");

    let mut backend = backend::from_config(&config);
    backend
        .boot()
        .await
        .with_context(|| format!("failed to boot {} backend", backend.name()))?;
    let ready = backend.ping().await.context("backend did not answer ping")?;
    info!(backend = %ready, "storage backend ready");

    let shutdown = Arc::new(tokio::sync::Notify::new());
    let server_shutdown = shutdown.clone();
    let listen_addr = config.server.listen.clone();
    let web_server = WebServer::new(config, backend);

    let mut web_handle = tokio::spawn(async move {
        let stop = async move { server_shutdown.notified().await };
        if let Err(e) = web_server.start(&listen_addr, stop).await {
            error!("web server error: {:#}", e);
        }
    });

    tokio::select! {
        _ = signals::wait_for_shutdown() => {
            info!("Shutdown signal received, stopping...");
        }
        _ = &mut web_handle => {
            anyhow::bail!("web server exited unexpectedly");
        }
    }

    // Stored permit, so the server sees it even if not yet waiting.
    shutdown.notify_one();

    match tokio::time::timeout(Duration::from_secs(10), web_handle).await {
        Ok(Ok(())) => info!("web server stopped gracefully"),
        Ok(Err(e)) => warn!("web server task error: {}", e),
        Err(_) => warn!("web server did not drain within 10s, forcing shutdown"),
    }

    info!("gref daemon stopped.");
    Ok(())
}
