//! API Routes

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::camera_controller::{CameraConfig, CameraStats, DetailedStatus, LastError};
use crate::coordinate_converter::WorkingArea;
use crate::error::{Error, Result};
use crate::models::{ApiResponse, FrameSize, Position};
use crate::ptz_manager::{ExportedConfiguration, HealthReport, ManagerStats};
use crate::ptz_transport::PtzTransport;
use crate::state::AppState;

/// Create API router
pub fn create_router<T: PtzTransport>(state: AppState<T>) -> Router {
    Router::new()
        // Health & Status
        .route("/healthz", get(super::health_check::<T>))
        .route("/api/ptz/health", get(ptz_health::<T>))
        .route("/api/ptz/stats", get(ptz_stats::<T>))
        .route("/api/ptz/export", get(export_configuration::<T>))
        // Registry
        .route("/api/ptz/cameras", post(register_camera::<T>))
        .route("/api/ptz/cameras/connect", post(connect_all::<T>))
        // Per camera
        .route("/api/ptz/cameras/:id/stats", get(camera_stats::<T>))
        .route("/api/ptz/cameras/:id/status", get(camera_status::<T>))
        .route("/api/ptz/cameras/:id/connect", post(connect_camera::<T>))
        .route("/api/ptz/cameras/:id/disconnect", post(disconnect_camera::<T>))
        .route("/api/ptz/cameras/:id/start", post(start_tracking::<T>))
        .route("/api/ptz/cameras/:id/stop", post(stop_tracking::<T>))
        .route("/api/ptz/cameras/:id/home", post(home::<T>))
        .route("/api/ptz/cameras/:id/detections", post(ingest_detections::<T>))
        // Calibration
        .route("/api/ptz/cameras/:id/fov", put(calibrate_fov::<T>))
        .route("/api/ptz/cameras/:id/working-area", put(set_working_area::<T>))
        .with_state(state)
}

// ========================================
// Request/response bodies
// ========================================

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub camera_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,
}

#[derive(Debug, Serialize)]
pub struct TrackingResponse {
    pub tracking: bool,
}

/// Home request; any component present sets the home position,
/// an empty body moves the camera home
#[derive(Debug, Default, Deserialize)]
pub struct HomeRequest {
    pub pan: Option<f64>,
    pub tilt: Option<f64>,
    pub zoom: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub home_position: Position,
    pub moved: bool,
}

/// Detection batch from an upstream detector
#[derive(Debug, Deserialize)]
pub struct DetectionBatch {
    #[serde(default)]
    pub frame: Option<FrameSize>,
    pub detections: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub received: usize,
    pub accepted: usize,
}

#[derive(Debug, Deserialize)]
pub struct FovRequest {
    pub horizontal: f64,
    pub vertical: f64,
}

// ========================================
// Handlers
// ========================================

async fn ptz_health<T: PtzTransport>(
    State(state): State<AppState<T>>,
) -> Json<ApiResponse<HealthReport>> {
    Json(ApiResponse::success(state.manager.health().await))
}

async fn ptz_stats<T: PtzTransport>(
    State(state): State<AppState<T>>,
) -> Json<ApiResponse<ManagerStats>> {
    Json(ApiResponse::success(state.manager.all_stats().await))
}

async fn export_configuration<T: PtzTransport>(
    State(state): State<AppState<T>>,
) -> Json<ApiResponse<ExportedConfiguration>> {
    Json(ApiResponse::success(
        state.manager.export_configuration().await,
    ))
}

async fn register_camera<T: PtzTransport>(
    State(state): State<AppState<T>>,
    Json(config): Json<CameraConfig>,
) -> Result<Json<ApiResponse<RegisterResponse>>> {
    if config.ip.trim().is_empty() {
        return Err(Error::Validation("ip is required".to_string()));
    }
    let camera_id = state.manager.register(config).await;
    Ok(Json(ApiResponse::success(RegisterResponse { camera_id })))
}

async fn connect_all<T: PtzTransport>(
    State(state): State<AppState<T>>,
) -> Json<ApiResponse<BTreeMap<String, bool>>> {
    Json(ApiResponse::success(state.manager.connect_all().await))
}

async fn camera_stats<T: PtzTransport>(
    State(state): State<AppState<T>>,
    Path(camera_id): Path<String>,
) -> Result<Json<ApiResponse<CameraStats>>> {
    let stats = state.manager.camera_stats(&camera_id).await?;
    Ok(Json(ApiResponse::success(stats)))
}

async fn camera_status<T: PtzTransport>(
    State(state): State<AppState<T>>,
    Path(camera_id): Path<String>,
) -> Result<Json<ApiResponse<DetailedStatus>>> {
    let status = state.manager.detailed_status(&camera_id).await?;
    Ok(Json(ApiResponse::success(status)))
}

async fn connect_camera<T: PtzTransport>(
    State(state): State<AppState<T>>,
    Path(camera_id): Path<String>,
) -> Result<Json<ApiResponse<ConnectResponse>>> {
    let connected = state.manager.connect(&camera_id).await?;
    let last_error = if connected {
        None
    } else {
        state.manager.controller(&camera_id).await?.last_error().await
    };
    Ok(Json(ApiResponse::success(ConnectResponse {
        connected,
        last_error,
    })))
}

async fn disconnect_camera<T: PtzTransport>(
    State(state): State<AppState<T>>,
    Path(camera_id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    state.manager.disconnect(&camera_id).await?;
    Ok(Json(ApiResponse::success(())))
}

async fn start_tracking<T: PtzTransport>(
    State(state): State<AppState<T>>,
    Path(camera_id): Path<String>,
) -> Result<Json<ApiResponse<TrackingResponse>>> {
    let tracking = state.manager.start_tracking(&camera_id).await?;
    Ok(Json(ApiResponse::success(TrackingResponse { tracking })))
}

async fn stop_tracking<T: PtzTransport>(
    State(state): State<AppState<T>>,
    Path(camera_id): Path<String>,
) -> Result<Json<ApiResponse<TrackingResponse>>> {
    state.manager.stop_tracking(&camera_id).await?;
    Ok(Json(ApiResponse::success(TrackingResponse { tracking: false })))
}

async fn home<T: PtzTransport>(
    State(state): State<AppState<T>>,
    Path(camera_id): Path<String>,
    request: Option<Json<HomeRequest>>,
) -> Result<Json<ApiResponse<HomeResponse>>> {
    let controller = state.manager.controller(&camera_id).await?;
    let request = request.map(|Json(r)| r).unwrap_or_default();

    if request.pan.is_some() || request.tilt.is_some() || request.zoom.is_some() {
        let home_position = controller
            .set_home_position(request.pan, request.tilt, request.zoom)
            .await;
        return Ok(Json(ApiResponse::success(HomeResponse {
            home_position,
            moved: false,
        })));
    }

    controller.return_to_home().await?;
    Ok(Json(ApiResponse::success(HomeResponse {
        home_position: controller.home_position().await,
        moved: true,
    })))
}

async fn ingest_detections<T: PtzTransport>(
    State(state): State<AppState<T>>,
    Path(camera_id): Path<String>,
    Json(batch): Json<DetectionBatch>,
) -> Result<Json<ApiResponse<IngestResponse>>> {
    // unknown cameras are a 404 here, not a silent false
    state.manager.controller(&camera_id).await?;

    let frame = batch.frame.unwrap_or_default();
    let mut accepted = 0;
    for raw in &batch.detections {
        if state.manager.add_detection(&camera_id, raw, frame).await {
            accepted += 1;
        }
    }

    Ok(Json(ApiResponse::success(IngestResponse {
        received: batch.detections.len(),
        accepted,
    })))
}

async fn calibrate_fov<T: PtzTransport>(
    State(state): State<AppState<T>>,
    Path(camera_id): Path<String>,
    Json(request): Json<FovRequest>,
) -> Result<Json<ApiResponse<()>>> {
    let controller = state.manager.controller(&camera_id).await?;
    controller
        .calibrate_field_of_view(request.horizontal, request.vertical)
        .await?;
    Ok(Json(ApiResponse::success(())))
}

async fn set_working_area<T: PtzTransport>(
    State(state): State<AppState<T>>,
    Path(camera_id): Path<String>,
    Json(area): Json<WorkingArea>,
) -> Result<Json<ApiResponse<()>>> {
    let controller = state.manager.controller(&camera_id).await?;
    controller.set_working_area(area).await?;
    Ok(Json(ApiResponse::success(())))
}
