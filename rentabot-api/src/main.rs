//! Rent-A-Bot API server entry point.
//!
//! Loads the resource descriptor, builds the in-memory catalog, spawns the
//! two background loops and serves the Axum application until ctrl-c.

use std::sync::Arc;

use rentabot_api::jobs::{
    lock_reaper_task, scheduler_task, LockReaperConfig, SchedulerConfig,
};
use rentabot_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState};
use rentabot_core::{load_descriptor, Catalog};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing();

    let config = ApiConfig::from_env();

    let resources = match &config.descriptor_path {
        Some(path) => load_descriptor(path).map_err(|e| {
            ApiError::internal_error(format!("Failed to load resource descriptor: {}", e))
        })?,
        None => {
            tracing::warn!(
                "RENTABOT_RESOURCE_DESCRIPTOR is not set, starting with an empty catalog"
            );
            Vec::new()
        }
    };
    tracing::info!(resources = resources.len(), "Catalog initialized");

    let catalog = Arc::new(Catalog::from_resources(resources));
    let app = create_api_router(AppState::new(catalog.clone()), &config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper = tokio::spawn(lock_reaper_task(
        catalog.clone(),
        LockReaperConfig::from_env(),
        shutdown_rx.clone(),
    ));
    let scheduler = tokio::spawn(scheduler_task(
        catalog,
        SchedulerConfig::from_env(),
        shutdown_rx,
    ));

    let addr = config.bind_addr()?;
    tracing::info!(%addr, "Starting Rent-A-Bot API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    // Stop the background loops before exiting.
    let _ = shutdown_tx.send(true);
    let _ = reaper.await;
    let _ = scheduler.await;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
