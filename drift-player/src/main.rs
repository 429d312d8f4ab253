//! drift-player - main entry point
//!
//! Headless shuffle-radio daemon: durable play history, bidirectional
//! navigation, anti-repeat random selection, HTTP/SSE control interface.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drift_common::config::{self, Config};
use drift_common::db::{self, keys};
use drift_common::events::PlaybackState;
use drift_player::api::debounce::{Debounce, DEFAULT_DEBOUNCE_WINDOW};
use drift_player::api::{self, AppState};
use drift_player::catalog::CatalogProvider;
use drift_player::engine::SelectionEngine;
use drift_player::history::HistoryStore;
use drift_player::state::SharedState;
use drift_player::store::StoreHandle;
use drift_player::watchdog;

/// Command-line arguments for drift-player
#[derive(Parser, Debug)]
#[command(name = "drift-player")]
#[command(about = "Headless shuffle-radio daemon")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "DRIFT_PORT")]
    port: Option<u16>,

    /// Path to the SQLite database
    #[arg(short, long, env = "DRIFT_DB")]
    database: Option<PathBuf>,

    /// Catalog URL (plain text, one track URL per line)
    #[arg(short, long, env = "DRIFT_CATALOG_URL")]
    catalog_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drift_player=debug,drift_common=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let file_config = config::load_config_file();
    let config = Config::resolve(args.port, args.database, args.catalog_url, &file_config);

    info!("Starting drift-player on port {}", config.port);
    info!("Database: {}", config.database_path.display());
    info!("Catalog: {}", config.catalog_url);

    // Open storage, create schema, run the one-time legacy migration
    let pool = db::init::open_pool(&config.database_path)
        .await
        .context("Failed to open database")?;
    db::init::initialize_database(&pool)
        .await
        .context("Failed to initialize database")?;
    db::migrations::migrate_legacy_history(&pool).await;

    // Wire the engine behind the store actor
    let store = StoreHandle::spawn(pool);
    let state = Arc::new(SharedState::new());

    // A client that paused before the last shutdown stays paused
    if let Ok(Some(raw)) = store.get(keys::WAS_PLAYING).await {
        if raw == "false" {
            state.set_playback_state(PlaybackState::Paused).await;
        }
    }
    let catalog = CatalogProvider::new(
        store.clone(),
        config.catalog_url.clone(),
        state.event_tx.clone(),
    );
    let engine = Arc::new(SelectionEngine::new(
        HistoryStore::new(store.clone()),
        catalog.clone(),
    ));
    info!("Selection engine initialized");

    watchdog::start_watchdog(engine.clone(), state.clone());

    let app_state = AppState {
        engine,
        state,
        store,
        catalog,
        debounce: Arc::new(Debounce::new(DEFAULT_DEBOUNCE_WINDOW)),
        port: config.port,
    };
    let app = api::create_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

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
            .expect("Failed to install signal handler")
            .recv()
            .await;
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
