//! parkcast-server: REST API for parking occupancy forecasts.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

use parkcast_core::config::{load_dotenv, Config};
use parkcast_forecast::resolve_model_path;
use parkcast_server::{build_router, AppState, ModelHandle};
use parkcast_storage::Database;

/// Parking forecast API server.
#[derive(Parser, Debug)]
#[command(name = "parkcast-server", version, about)]
struct Cli {
    /// Bind host (overrides HOST).
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides PORT).
    #[arg(long)]
    port: Option<u16>,

    /// SQLite database file (overrides DATABASE_PATH).
    #[arg(long)]
    db: Option<PathBuf>,

    /// Model file (overrides MODEL_PATH).
    #[arg(long)]
    model: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=debug")),
        )
        .with_target(false)
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(db) = cli.db {
        config.database.path = db;
    }
    if cli.model.is_some() {
        config.model.path = cli.model;
    }
    config.log_summary();
    debug!(config = %config.redacted_summary(), "effective configuration");

    let db = Database::open(&config.database.path, config.database.max_connections)
        .await
        .with_context(|| format!("failed to open database {}", config.database.path.display()))?;

    let model_path = resolve_model_path(&config.model)?;
    let model = ModelHandle::open(model_path).await;

    let state = Arc::new(AppState::new(db, model, config.server.confidence_band));
    let app = build_router(state, &config.server.cors_origin);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    Ok(())
}
