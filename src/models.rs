//! Shared models and types
//!
//! Detection / Position records shared by the tracker, the converters,
//! the control loops and the HTTP layer.

use serde::{Deserialize, Serialize};

/// Current wall-clock time in seconds (Unix epoch, sub-second precision)
pub fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_sec: u64,
    pub registered_cameras: usize,
}

/// A single object detection in pixel space
///
/// Immutable once created. `x`/`y` is the top-left corner of the box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
    /// Seconds on the Unix clock
    pub timestamp: f64,
    pub class_name: String,
    pub track_id: Option<String>,
}

impl Detection {
    pub fn new(x: f64, y: f64, width: f64, height: f64, confidence: f64, timestamp: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence,
            timestamp,
            class_name: "object".to_string(),
            track_id: None,
        }
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    pub fn center(&self) -> (f64, f64) {
        (self.center_x(), self.center_y())
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Euclidean distance between centroids
    pub fn distance_to(&self, other: &Detection) -> f64 {
        let dx = self.center_x() - other.center_x();
        let dy = self.center_y() - other.center_y();
        (dx * dx + dy * dy).sqrt()
    }
}

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

/// Absolute PTZ position
///
/// pan/tilt conventionally in [-1, 1], zoom in [0, 1]. Positions produced by
/// the area converter carry device-raw zoom and are never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub pan: f64,
    pub tilt: f64,
    pub zoom: f64,
    #[serde(default = "now_secs")]
    pub timestamp: f64,
}

impl Position {
    pub fn new(pan: f64, tilt: f64, zoom: f64) -> Self {
        Self {
            pan,
            tilt,
            zoom,
            timestamp: now_secs(),
        }
    }

    /// Distance in PTZ space, zoom weighted down to 10%
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dp = self.pan - other.pan;
        let dt = self.tilt - other.tilt;
        let dz = self.zoom - other.zoom;
        (dp * dp + dt * dt + dz * dz * 0.1).sqrt()
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.5)
    }
}
