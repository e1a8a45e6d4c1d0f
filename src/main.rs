//! survey-stats - Main entry point
//!
//! Wires configuration, the chosen store backend, the reconciliation
//! engine, and the HTTP server together. All storage is constructed here
//! and injected; there is no process-wide connection state.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::signal;
use tracing::info;

use survey_stats::engine::Engine;
use survey_stats::store::{FileStore, RecordStore, SqliteStore};
use survey_stats::{build_router, AppState};

/// Command-line arguments for survey-stats
#[derive(Parser, Debug)]
#[command(name = "survey-stats")]
#[command(about = "Weekly metering-survey statistics service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000", env = "SURVEY_STATS_PORT")]
    port: u16,

    /// Data directory for the backing store
    #[arg(short, long, env = "SURVEY_STATS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Storage backend
    #[arg(long, value_enum, default_value = "file", env = "SURVEY_STATS_BACKEND")]
    backend: Backend,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// Single JSON array file
    File,
    /// SQLite database, one row per date
    Sqlite,
}

/// Data directory resolution: CLI/env first, then the OS data dir.
fn resolve_data_dir(arg: Option<PathBuf>) -> PathBuf {
    arg.unwrap_or_else(|| {
        dirs::data_local_dir()
            .map(|d| d.join("survey-stats"))
            .unwrap_or_else(|| PathBuf::from("./survey_stats_data"))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting survey-stats v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let data_dir = resolve_data_dir(args.data_dir);
    info!("Data directory: {}", data_dir.display());

    let store: Arc<dyn RecordStore> = match args.backend {
        Backend::File => {
            let store = FileStore::open(data_dir.join("data.json"))
                .await
                .context("Failed to open file store")?;
            Arc::new(store)
        }
        Backend::Sqlite => {
            let store = SqliteStore::connect(&data_dir.join("survey.db"))
                .await
                .context("Failed to open sqlite store")?;
            Arc::new(store)
        }
    };

    let engine = Arc::new(Engine::new(store));
    let state = AppState::new(engine);
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("survey-stats listening on http://{}", addr);
    info!("Health check: http://{}/api/health", addr);

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
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
