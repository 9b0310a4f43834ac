//! PTZ manager type definitions

use crate::camera_controller::{CameraConfig, CameraStats};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Per-camera health classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Disconnected,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraHealth {
    pub status: HealthStatus,
    pub issues: Vec<String>,
}

/// Advisory health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall_status: OverallStatus,
    pub issues: Vec<String>,
    pub cameras_status: BTreeMap<String, CameraHealth>,
    pub recommendations: Vec<String>,
    pub checked_at: f64,
}

/// Manager tuning
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Health sweep period
    pub health_interval: Duration,
    /// Seconds without detections before a connected camera is inactive
    pub inactivity_timeout: f64,
    /// Connection attempts above which an issue is reported
    pub max_connection_attempts: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            health_interval: Duration::from_secs(60),
            inactivity_timeout: 300.0,
            max_connection_attempts: 3,
        }
    }
}

/// Camera inventory file
///
/// `{"cameras": [...], "global_settings": {...}}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamerasFile {
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,
    #[serde(default)]
    pub global_settings: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManagerSummary {
    pub registered_cameras: usize,
    pub active_cameras: usize,
    pub tracking_cameras: usize,
    /// Detections accepted across all cameras
    pub total_detections: u64,
    pub uptime_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManagerStats {
    pub manager_stats: ManagerSummary,
    pub cameras: BTreeMap<String, CameraStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportInfo {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub total_cameras: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedCamera {
    pub camera_id: String,
    #[serde(flatten)]
    pub config: CameraConfig,
    pub stats_snapshot: CameraStats,
}

/// Snapshot of the running configuration (credentials omitted)
#[derive(Debug, Clone, Serialize)]
pub struct ExportedConfiguration {
    pub export_info: ExportInfo,
    pub global_settings: serde_json::Map<String, serde_json::Value>,
    pub cameras: Vec<ExportedCamera>,
}
