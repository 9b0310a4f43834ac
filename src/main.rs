//! PTZ Tracker - multi-camera PTZ tracking daemon
//!
//! Main entry point.

use ptz_tracker::{
    calibration_store::CalibrationStore,
    ptz_manager::{ManagerConfig, PtzManager},
    ptz_transport::OnvifTransport,
    state::{AppConfig, AppState},
    web_api,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ptz_tracker=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting PTZ Tracker v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        cameras_config = %config.cameras_config.display(),
        calibration_dir = %config.calibration_dir.display(),
        health_interval_sec = config.health_interval.as_secs(),
        "Configuration loaded"
    );

    // Initialize components
    let transport = Arc::new(OnvifTransport::new());
    let store = Arc::new(CalibrationStore::new(config.calibration_dir.clone()));
    let manager_config = ManagerConfig {
        health_interval: config.health_interval,
        ..ManagerConfig::default()
    };
    let manager = Arc::new(PtzManager::new(transport, Some(store), manager_config));

    match manager.load_cameras_file(&config.cameras_config).await {
        Ok(ids) => tracing::info!(count = ids.len(), "Cameras registered"),
        Err(e) => tracing::warn!(
            path = %config.cameras_config.display(),
            error = %e,
            "Camera inventory not loaded, starting with no cameras"
        ),
    }

    let connected = manager.connect_all().await;
    let failed: Vec<&String> = connected
        .iter()
        .filter(|(_, ok)| !**ok)
        .map(|(id, _)| id)
        .collect();
    if !failed.is_empty() {
        tracing::warn!(cameras = ?failed, "Some PTZ cameras failed to connect");
    }

    if config.auto_start_tracking {
        let started = manager.start_all_tracking().await;
        tracing::info!(
            started = started.values().filter(|s| **s).count(),
            total = started.len(),
            "Auto-start tracking"
        );
    }

    manager.start_monitor().await;

    // Build router
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, manager.clone());
    let app = web_api::create_router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    // Start server
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    manager.shutdown().await;
    Ok(())
}
