//! Offline Inventory server
//!
//! Serves the inventory API and the cached static assets.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use offline_inventory::cache::{CacheController, CacheStorage, Generation, HttpFetcher};
use offline_inventory::events::Notifier;
use offline_inventory::inventory::StoreConnector;
use offline_inventory::{create_router, spawn_cache_worker, AppState, Config};

/// Main entry point for the inventory server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the record store
/// 4. Open cache storage and start the cache worker
/// 5. Install and activate the configured cache generation
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offline_inventory=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Offline Inventory Server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: database={}, port={}, asset_origin={}, cache_version={}",
        config.database_url, config.server_port, config.asset_origin, config.cache_version
    );

    let notifier = Notifier::new();
    let connector = StoreConnector::new(config.database_url.clone(), notifier);
    let store = connector
        .handle()
        .await
        .context("Failed to open record store")?;
    info!("Record store ready, {} records", store.count().await?);

    let storage = match &config.cache_dir {
        Some(dir) => CacheStorage::open(dir)
            .with_context(|| format!("Failed to open cache dir {}", dir.display()))?,
        None => CacheStorage::in_memory(),
    };
    let origin = Url::parse(&config.asset_origin).context("Invalid ASSET_ORIGIN")?;
    let controller = CacheController::new(origin.clone(), storage, Arc::new(HttpFetcher::new()));
    let (worker, worker_handle) = spawn_cache_worker(Arc::new(controller));
    info!("Cache worker started");

    let generation = Generation::with_default_manifest(config.cache_version);
    match worker.deploy(generation.clone()).await {
        Ok(deleted) => info!(
            "Cache {} active, removed {:?}",
            generation.cache_name(),
            deleted
        ),
        Err(err) => warn!(
            "Cache {} not installed, keeping previous generation: {}",
            generation.cache_name(),
            err
        ),
    }

    let state = AppState::new(store, worker, origin, config.image);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(worker_handle))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the cache worker and allows graceful shutdown.
async fn shutdown_signal(worker_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    worker_handle.abort();
    warn!("Cache worker aborted");
}
