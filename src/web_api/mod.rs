//! WebAPI - REST API Endpoints
//!
//! ## Responsibilities
//!
//! - Detection ingestion over HTTP
//! - Camera lifecycle and calibration endpoints
//! - Health, stats and export introspection

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::HealthResponse;
use crate::ptz_transport::PtzTransport;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check<T: PtzTransport>(State(state): State<AppState<T>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_sec: state.started_at.elapsed().as_secs(),
        registered_cameras: state.manager.camera_ids().await.len(),
    };

    Json(response)
}
