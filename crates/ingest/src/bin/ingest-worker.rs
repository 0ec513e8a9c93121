//! ingest-worker: polls ParkenDD on an interval and appends readings to SQLite.
//!
//! Flags fall back to the environment (`DATABASE_PATH`, `INGEST_INTERVAL_SECS`,
//! `INGEST_CITIES`), and from there to the profiled config defaults.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::Notify;
use tracing::info;

use parkcast_core::config::{parse_list, Config};
use parkcast_ingest::{Ingestor, ParkenddClient};
use parkcast_storage::Database;

// ── CLI ─────────────────────────────────────────────────────────────

/// Parking ingestor: snapshots ParkenDD cities into the parking database.
#[derive(Parser, Debug)]
#[command(name = "ingest-worker", version, about)]
struct Cli {
    /// Path to the SQLite database file (created if missing).
    #[arg(long)]
    db: Option<PathBuf>,

    /// Polling interval in seconds.
    #[arg(long)]
    interval: Option<u64>,

    /// Comma-separated list of cities to monitor.
    #[arg(long)]
    cities: Option<String>,

    /// ParkenDD base URL.
    #[arg(long)]
    base_url: Option<String>,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    parkcast_core::config::load_dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();
    info!("Starting parking ingestor (profile: {})", config.profile_label());
    let http_timeout = config.ingest.http_timeout();
    let max_connections = config.database.max_connections;

    let db_path = cli.db.unwrap_or(config.database.path);
    let interval = cli
        .interval
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| config.ingest.interval());
    let cities = cli
        .cities
        .as_deref()
        .map(parse_list)
        .unwrap_or(config.ingest.cities);
    let base_url = cli.base_url.unwrap_or(config.ingest.base_url);

    info!("Database: {}", db_path.display());
    info!("Polling interval: {:?}", interval);
    info!("Cities: {}", cities.join(", "));

    let db = Database::open_or_create(&db_path, max_connections)
        .await
        .with_context(|| format!("failed to initialize database at {}", db_path.display()))?;

    let client = ParkenddClient::new(base_url, http_timeout)
        .context("failed to build HTTP client")?;
    let ingestor = Ingestor::new(db.clone(), Arc::new(client), cities, interval);

    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received");
            signal.notify_one();
        }
    });

    ingestor.run(shutdown).await;
    db.close().await;
    info!("ingest-worker exited cleanly");
    Ok(())
}
