//! Confirmation tracker type definitions

use serde::{Deserialize, Serialize};

/// Detection history capacity (most recent N)
pub const HISTORY_CAPACITY: usize = 10;

/// Confirmation thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    /// Consecutive detections evaluated per stability window
    pub confirmation_frames: usize,
    /// Max time span (s) of one window
    pub confirmation_timeout: f64,
    pub min_confidence: f64,
    /// Max centroid jump (px) between consecutive detections
    pub max_position_jump: f64,
    /// Consecutive stable windows required to confirm
    pub stability_frames: u32,
    pub movement_prediction: bool,
    /// End-to-end latency (s) compensated by prediction
    pub camera_delay: f64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            confirmation_frames: 3,
            confirmation_timeout: 2.0,
            min_confidence: 0.6,
            max_position_jump: 200.0,
            stability_frames: 2,
            movement_prediction: true,
            camera_delay: 0.8,
        }
    }
}

/// Read-only view of tracker state
#[derive(Debug, Clone, Serialize)]
pub struct TrackerSnapshot {
    pub stable_count: u32,
    pub history_len: usize,
    pub has_confirmed_target: bool,
    pub last_confirmed_at: Option<f64>,
}
