mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use common::MockTransport;
use ptz_tracker::ptz_manager::{ManagerConfig, PtzManager};
use ptz_tracker::state::{AppConfig, AppState};
use ptz_tracker::web_api::create_router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> (Router, Arc<PtzManager<MockTransport>>) {
    let transport = Arc::new(MockTransport::new());
    let manager = Arc::new(PtzManager::new(transport, None, ManagerConfig::default()));
    let state = AppState::new(AppConfig::default(), manager.clone());
    (create_router(state), manager)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_healthz_counts_cameras() {
    let (app, manager) = app();
    manager.register(common::camera("10.0.0.5")).await;

    let (status, body) = send(&app, Method::GET, "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["registered_cameras"], 1);
}

#[tokio::test]
async fn test_register_and_read_stats() {
    let (app, _) = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/ptz/cameras",
        Some(json!({"id": "gate", "ip": "10.0.0.5", "password": "pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["camera_id"], "gate");

    let (status, body) = send(&app, Method::GET, "/api/ptz/cameras/gate/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"], "disconnected");
    assert_eq!(body["data"]["detections_received"], 0);
}

#[tokio::test]
async fn test_unknown_camera_is_404() {
    let (app, _) = app();

    let (status, body) = send(&app, Method::GET, "/api/ptz/cameras/ghost/stats", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "NOT_FOUND");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/ptz/cameras/ghost/detections",
        Some(json!({"detections": []})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_detections_ignored_until_tracking() {
    let (app, manager) = app();
    manager.register(common::camera("10.0.0.5")).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/ptz/cameras/10.0.0.5/detections",
        Some(json!({
            "frame": {"width": 1280, "height": 720},
            "detections": [common::fresh_far_detection()]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["received"], 1);
    assert_eq!(body["data"]["accepted"], 0);
}

#[tokio::test]
async fn test_invalid_fov_is_400() {
    let (app, manager) = app();
    manager.register(common::camera("10.0.0.5")).await;

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/ptz/cameras/10.0.0.5/fov",
        Some(json!({"horizontal": -5.0, "vertical": 40.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_home_requires_connection() {
    let (app, manager) = app();
    manager.register(common::camera("10.0.0.5")).await;

    let (status, _) = send(&app, Method::POST, "/api/ptz/cameras/10.0.0.5/home", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/ptz/cameras/10.0.0.5/home",
        Some(json!({"pan": 0.25})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["home_position"]["pan"], 0.25);
    assert_eq!(body["data"]["moved"], false);
}

#[tokio::test]
async fn test_health_report_shape() {
    let (app, manager) = app();
    manager.register(common::camera("10.0.0.5")).await;

    let (status, body) = send(&app, Method::GET, "/api/ptz/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["overall_status"], "critical");
    assert_eq!(
        body["data"]["cameras_status"]["10.0.0.5"]["status"],
        "disconnected"
    );
}
