//! Application state
//!
//! Holds the manager and configuration shared by the HTTP handlers

use crate::ptz_manager::PtzManager;
use crate::ptz_transport::{OnvifTransport, PtzTransport};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Camera inventory (JSON, `cameras` + `global_settings`)
    pub cameras_config: PathBuf,
    /// Directory of per-camera calibration records
    pub calibration_dir: PathBuf,
    /// Server port
    pub port: u16,
    /// Server host
    pub host: String,
    /// Health sweep period
    pub health_interval: Duration,
    /// Start tracking on every connected camera at boot
    pub auto_start_tracking: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cameras_config: std::env::var("PTZ_CAMERAS_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("ptz_cameras.json")),
            calibration_dir: std::env::var("PTZ_CALIBRATION_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("calibration")),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8090),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            health_interval: std::env::var("PTZ_HEALTH_INTERVAL_SEC")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(60)),
            auto_start_tracking: std::env::var("PTZ_AUTO_START")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }
}

/// Application state shared across handlers
pub struct AppState<T: PtzTransport = OnvifTransport> {
    /// Application config
    pub config: Arc<AppConfig>,
    /// Camera registry and health monitor
    pub manager: Arc<PtzManager<T>>,
    pub started_at: Instant,
}

impl<T: PtzTransport> AppState<T> {
    pub fn new(config: AppConfig, manager: Arc<PtzManager<T>>) -> Self {
        Self {
            config: Arc::new(config),
            manager,
            started_at: Instant::now(),
        }
    }
}

impl<T: PtzTransport> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            manager: self.manager.clone(),
            started_at: self.started_at,
        }
    }
}
