//! Camino API Server
//!
//! Run with: cargo run --bin camino-api [-- --config path/to/config.toml]
//!
//! # Configuration
//!
//! Read from `--config`, else the first of
//! `~/.config/camino/config.toml`, `/etc/camino/config.toml`, `./config.toml`.
//! `CAMINO_*` environment variables override file values; `RUST_LOG`
//! overrides the log level.

use anyhow::Context;
use camino::api::{serve, AppState};
use camino::config::{Config, StoreBackend};
use camino::points::{MemoryPointStore, PointStore, SqlitePointStore};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "camino-api")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Serve journey points, live snapshots and link previews")]
struct Args {
    /// Config file (default: search the standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    camino::logging::init(&config.logging);

    tracing::info!("Starting Camino API server v{}", env!("CARGO_PKG_VERSION"));

    let store = open_store(&config)?;
    tracing::info!(backend = store.name(), journey = %config.journey.id, "Point store ready");

    let state = AppState::new(store, config)?;
    serve(state).await?;

    tracing::info!("Camino API server stopped");
    Ok(())
}

fn open_store(config: &Config) -> anyhow::Result<Arc<dyn PointStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; points are lost on shutdown");
            Ok(Arc::new(MemoryPointStore::new()))
        }
        StoreBackend::Sqlite => {
            let path = expand_home(&config.store.path);
            tracing::info!("Database: {:?}", path);

            let store = SqlitePointStore::open(&path)
                .with_context(|| format!("opening point database {:?}", path))?;
            Ok(Arc::new(store))
        }
    }
}

/// Resolve a leading `~/` against the home directory
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => Path::new(path).to_path_buf(),
    }
}
