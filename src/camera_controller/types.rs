//! Camera controller type definitions

use crate::confirmation_tracker::{ConfirmationConfig, TrackerSnapshot};
use crate::coordinate_converter::{Calibration, MovementStats};
use crate::models::{Detection, FrameSize, Position};
use crate::ptz_transport::CameraEndpoint;
use serde::{Deserialize, Serialize};

fn default_port() -> u16 {
    80
}

fn default_username() -> String {
    "admin".to_string()
}

/// Static camera identity and tuning
///
/// Immutable for the controller's lifetime; a change needs re-registration.
/// Field aliases accept the legacy camera inventory format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub ip: String,
    #[serde(default = "default_port", alias = "puerto")]
    pub port: u16,
    #[serde(default = "default_username", alias = "usuario")]
    pub username: String,
    #[serde(default, alias = "contrasena", skip_serializing)]
    pub password: String,
    #[serde(default, alias = "nombre", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "config_personalizada")]
    pub tracking: TrackingConfig,
}

impl CameraConfig {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            id: None,
            ip: ip.into(),
            port: default_port(),
            username: default_username(),
            password: String::new(),
            name: None,
            tracking: TrackingConfig::default(),
        }
    }

    /// Registration identity: `id`, else `ip`
    pub fn camera_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.ip)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.camera_id())
    }

    pub fn endpoint(&self) -> CameraEndpoint {
        CameraEndpoint {
            host: self.ip.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// How a tracking camera is driven
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStrategy {
    /// FOV conversion + AbsoluteMove
    #[default]
    Absolute,
    /// 4-corner area conversion + ContinuousMove
    Area,
}

/// How the recorded position follows the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PositionSync {
    /// Trust successful moves, never read back
    #[default]
    Optimistic,
    /// Re-read GetStatus every `interval` seconds while tracking
    Reconcile { interval: f64 },
}

/// Per-camera tracking tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub confirmation_frames: usize,
    /// seconds
    pub confirmation_timeout: f64,
    /// pixels from frame centre below which a move is skipped
    pub min_movement_threshold: f64,
    /// seconds between moves
    pub movement_cooldown: f64,
    /// pixels from frame centre treated as centred
    pub position_tolerance: f64,
    pub camera_delay: f64,
    pub movement_prediction: bool,
    pub min_confidence: f64,
    pub max_position_jump: f64,
    pub stability_frames: u32,
    pub fast_speed: f64,
    pub normal_speed: f64,
    pub precise_speed: f64,
    pub auto_zoom: bool,
    pub return_home_on_stop: bool,
    pub target_lost_timeout: f64,
    pub max_faults: u32,
    pub control_interval_ms: u64,
    pub heartbeat_interval: f64,
    pub position_sync: PositionSync,
    pub strategy: TrackingStrategy,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            confirmation_frames: 3,
            confirmation_timeout: 2.0,
            min_movement_threshold: 50.0,
            movement_cooldown: 1.5,
            position_tolerance: 30.0,
            camera_delay: 0.8,
            movement_prediction: true,
            min_confidence: 0.6,
            max_position_jump: 200.0,
            stability_frames: 2,
            fast_speed: 0.8,
            normal_speed: 0.4,
            precise_speed: 0.2,
            auto_zoom: true,
            return_home_on_stop: true,
            target_lost_timeout: 5.0,
            max_faults: 10,
            control_interval_ms: 100,
            heartbeat_interval: 30.0,
            position_sync: PositionSync::default(),
            strategy: TrackingStrategy::default(),
        }
    }
}

impl TrackingConfig {
    pub fn confirmation(&self) -> ConfirmationConfig {
        ConfirmationConfig {
            confirmation_frames: self.confirmation_frames,
            confirmation_timeout: self.confirmation_timeout,
            min_confidence: self.min_confidence,
            max_position_jump: self.max_position_jump,
            stability_frames: self.stability_frames,
            movement_prediction: self.movement_prediction,
            camera_delay: self.camera_delay,
        }
    }

    /// Speed tier by the larger pan/tilt delta
    pub fn speed_for(&self, max_delta: f64) -> f64 {
        if max_delta > 0.3 {
            self.fast_speed
        } else if max_delta > 0.1 {
            self.normal_speed
        } else {
            self.precise_speed
        }
    }
}

/// Controller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraState {
    Disconnected,
    Connecting,
    Idle,
    Tracking,
    /// Cycle halted after too many faults; needs an explicit reconnect
    Faulted,
}

impl CameraState {
    pub fn is_connected(&self) -> bool {
        matches!(self, CameraState::Idle | CameraState::Tracking)
    }
}

impl std::fmt::Display for CameraState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CameraState::Disconnected => "disconnected",
            CameraState::Connecting => "connecting",
            CameraState::Idle => "idle",
            CameraState::Tracking => "tracking",
            CameraState::Faulted => "faulted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connectivity,
    Authorization,
    Protocol,
    Fault,
}

/// Most recent failure recorded by a controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastError {
    pub kind: ErrorKind,
    pub message: String,
    pub at: f64,
}

/// Monotonic counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraCounters {
    pub detections_received: u64,
    pub detections_processed: u64,
    pub detections_filtered: u64,
    pub detections_confirmed: u64,
    pub movements_executed: u64,
    pub movements_skipped: u64,
    pub movements_failed: u64,
    pub connection_attempts: u64,
    pub successful_connections: u64,
    pub faults: u64,
}

impl CameraCounters {
    /// Clear per-session counters; connection history survives
    pub fn reset_session(&mut self) {
        self.detections_received = 0;
        self.detections_processed = 0;
        self.detections_filtered = 0;
        self.detections_confirmed = 0;
        self.movements_executed = 0;
        self.movements_skipped = 0;
        self.movements_failed = 0;
    }
}

/// Point-in-time statistics with derived rates
#[derive(Debug, Clone, Serialize)]
pub struct CameraStats {
    pub camera_id: String,
    pub name: String,
    pub ip: String,
    pub state: CameraState,
    pub is_connected: bool,
    pub is_tracking: bool,
    pub has_target: bool,
    #[serde(flatten)]
    pub counters: CameraCounters,
    pub uptime_seconds: f64,
    /// detections received per second
    pub detection_rate: f64,
    /// confirmed / received, percent
    pub confirmation_rate: f64,
    /// moves per second
    pub movement_rate: f64,
    pub processing_ratio: f64,
    pub filtering_ratio: f64,
    pub current_position: Position,
    pub home_position: Position,
    pub frame_size: FrameSize,
    /// Area strategy: last computed device-raw zoom target
    pub zoom_target: Option<f64>,
    pub connected_at: Option<f64>,
    pub last_detection_at: Option<f64>,
    pub last_error: Option<LastError>,
    pub movement_statistics: MovementStats,
    pub tracker: TrackerSnapshot,
}

/// Stats plus a live device read
#[derive(Debug, Clone, Serialize)]
pub struct DetailedStatus {
    pub camera_id: String,
    pub endpoint: CameraEndpoint,
    pub profile_token: Option<String>,
    pub strategy: TrackingStrategy,
    pub target: Option<Detection>,
    pub expected_position: Position,
    pub actual_position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_position_error: Option<String>,
    pub tracking: TrackingConfig,
    pub calibration: Calibration,
    pub stats: CameraStats,
}

/// Health-relevant view of one controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthProbe {
    pub state: CameraState,
    pub connected_at: Option<f64>,
    pub last_detection_at: Option<f64>,
    pub connection_attempts: u64,
}

/// Result of one control cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Camera not tracking
    Inactive,
    NoTarget,
    TargetLost,
    Cooldown,
    Centered,
    /// Offset under the movement threshold
    Skipped,
    Moved,
    /// Area strategy: target inside the dead zone
    Holding,
    /// Area strategy: continuous move stopped
    Stopped,
    Failed,
    /// Fault threshold exceeded; cycle halted
    Halted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_config_legacy_aliases() {
        let cfg: CameraConfig = serde_json::from_str(
            r#"{"ip":"19.10.10.217","puerto":8000,"usuario":"op","contrasena":"pw",
                "nombre":"Gate","config_personalizada":{"movement_cooldown":2.5}}"#,
        )
        .unwrap();

        assert_eq!(cfg.camera_id(), "19.10.10.217");
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.username, "op");
        assert_eq!(cfg.password, "pw");
        assert_eq!(cfg.display_name(), "Gate");
        assert_eq!(cfg.tracking.movement_cooldown, 2.5);
        assert_eq!(cfg.tracking.min_movement_threshold, 50.0);
    }

    #[test]
    fn test_camera_config_defaults_and_identity() {
        let cfg: CameraConfig =
            serde_json::from_str(r#"{"id":"ptz_main","ip":"10.0.0.2"}"#).unwrap();
        assert_eq!(cfg.camera_id(), "ptz_main");
        assert_eq!(cfg.port, 80);
        assert_eq!(cfg.tracking.strategy, TrackingStrategy::Absolute);
        assert_eq!(cfg.tracking.position_sync, PositionSync::Optimistic);
        assert!(!serde_json::to_string(&cfg).unwrap().contains("password"));
    }

    #[test]
    fn test_position_sync_reconcile_parses() {
        let cfg: TrackingConfig = serde_json::from_str(
            r#"{"strategy":"area","position_sync":{"mode":"reconcile","interval":2.0}}"#,
        )
        .unwrap();
        assert_eq!(cfg.strategy, TrackingStrategy::Area);
        assert_eq!(cfg.position_sync, PositionSync::Reconcile { interval: 2.0 });
    }

    #[test]
    fn test_speed_tiers() {
        let cfg = TrackingConfig::default();
        assert_eq!(cfg.speed_for(0.5), 0.8);
        assert_eq!(cfg.speed_for(0.2), 0.4);
        assert_eq!(cfg.speed_for(0.1), 0.2);
    }
}
