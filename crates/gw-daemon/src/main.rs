//! # gw-daemon
//!
//! Serves the gw workspace API over HTTP.
//!
//! ```text
//! gw-daemon --config gw.toml
//! gw-daemon --storage-root /var/lib/gw --port 9000
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use gw_daemon::{app, AppState, DaemonConfig};
use gw_vcs::GitBackend;
use gw_workspace::Registry;

/// gw workspace service.
#[derive(Parser)]
#[command(name = "gw-daemon", about = "Multi-tenant git workspace service")]
struct Cli {
    /// Configuration file (defaults to ./gw.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding every owner's workspaces.
    #[arg(long)]
    storage_root: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("gw_daemon=info".parse()?)
                .add_directive("gw_workspace=info".parse()?)
                .add_directive("gw_vcs=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let (mut config, source) = DaemonConfig::resolve(cli.config.as_deref())?;
    if let Some(root) = cli.storage_root {
        config.storage.root = root;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    match &source {
        Some(path) => tracing::info!("Loaded configuration from {}", path.display()),
        None => tracing::info!("No configuration file, using defaults"),
    }

    std::fs::create_dir_all(&config.storage.root).with_context(|| {
        format!(
            "failed to create storage root {}",
            config.storage.root.display()
        )
    })?;
    tracing::info!("Storage root: {}", config.storage.root.display());
    tracing::info!("Primary branch: {}", config.storage.primary_branch);

    let backend = GitBackend::new(config.git.clone());
    let registry = Registry::new(config.storage.clone(), std::sync::Arc::new(backend));

    let mut router = app(AppState::new(registry));
    if config.server.permissive_cors {
        router = router.layer(CorsLayer::permissive());
    }

    let addr = config.server.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .inspect_err(|e| tracing::error!("server error: {:?}", e))?;

    tracing::info!("gw-daemon shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
}
