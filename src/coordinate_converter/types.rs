//! Calibration records for both conversion strategies

use crate::models::{FrameSize, Position};
use serde::{Deserialize, Serialize};

/// Closed numeric range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

fn unit_symmetric() -> Range {
    Range::new(-1.0, 1.0)
}

fn unit() -> Range {
    Range::new(0.0, 1.0)
}

fn default_target_object_ratio() -> f64 {
    0.25
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldOfView {
    pub horizontal_degrees: f64,
    pub vertical_degrees: f64,
}

impl Default for FieldOfView {
    fn default() -> Self {
        Self {
            horizontal_degrees: 60.0,
            vertical_degrees: 45.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CenterOffset {
    pub pan: f64,
    pub tilt: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementScaling {
    pub pan_factor: f64,
    pub tilt_factor: f64,
    pub zoom_factor: f64,
}

impl Default for MovementScaling {
    fn default() -> Self {
        Self {
            pan_factor: 1.0,
            tilt_factor: 1.0,
            zoom_factor: 1.0,
        }
    }
}

/// Per-axis speed ceilings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedLimits {
    pub max_pan_speed: f64,
    pub max_tilt_speed: f64,
    pub max_zoom_speed: f64,
}

impl Default for SpeedLimits {
    fn default() -> Self {
        Self {
            max_pan_speed: 0.8,
            max_tilt_speed: 0.8,
            max_zoom_speed: 0.5,
        }
    }
}

/// Field-of-view calibration
///
/// Every field is optional in a stored record; missing ones take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FovCalibration {
    #[serde(default = "unit_symmetric")]
    pub pan_range: Range,
    #[serde(default = "unit_symmetric")]
    pub tilt_range: Range,
    #[serde(default = "unit")]
    pub zoom_range: Range,
    #[serde(default)]
    pub field_of_view: FieldOfView,
    #[serde(default)]
    pub center_offset: CenterOffset,
    #[serde(default)]
    pub movement_scaling: MovementScaling,
    #[serde(default)]
    pub limits: SpeedLimits,
    #[serde(default = "default_target_object_ratio")]
    pub target_object_ratio: f64,
}

impl Default for FovCalibration {
    fn default() -> Self {
        Self {
            pan_range: unit_symmetric(),
            tilt_range: unit_symmetric(),
            zoom_range: unit(),
            field_of_view: FieldOfView::default(),
            center_offset: CenterOffset::default(),
            movement_scaling: MovementScaling::default(),
            limits: SpeedLimits::default(),
            target_object_ratio: default_target_object_ratio(),
        }
    }
}

/// Calibrated device position at one corner of the working area
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Corner {
    pub pan: f64,
    pub tilt: f64,
    pub zoom: f64,
}

impl Corner {
    pub const fn new(pan: f64, tilt: f64, zoom: f64) -> Self {
        Self { pan, tilt, zoom }
    }

    fn is_finite(&self) -> bool {
        self.pan.is_finite() && self.tilt.is_finite() && self.zoom.is_finite()
    }
}

impl From<Corner> for Position {
    fn from(c: Corner) -> Self {
        Position::new(c.pan, c.tilt, c.zoom)
    }
}

/// Four sampled device positions bounding the usable field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkingArea {
    pub top_left: Corner,
    pub top_right: Corner,
    pub bottom_left: Corner,
    pub bottom_right: Corner,
}

impl WorkingArea {
    pub fn is_finite(&self) -> bool {
        [
            self.top_left,
            self.top_right,
            self.bottom_left,
            self.bottom_right,
        ]
        .iter()
        .all(Corner::is_finite)
    }
}

/// Area tracking tuning knobs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaSettings {
    /// Dead zone as a fraction of frame width
    pub dead_zone_x: f64,
    /// Dead zone as a fraction of frame height
    pub dead_zone_y: f64,
    pub max_movement_speed: f64,
    /// Weight of the new speed in the exponential smoothing
    pub movement_smoothing: f64,
}

impl Default for AreaSettings {
    fn default() -> Self {
        Self {
            dead_zone_x: 0.05,
            dead_zone_y: 0.05,
            max_movement_speed: 0.3,
            movement_smoothing: 0.7,
        }
    }
}

impl AreaSettings {
    /// Dead zones in `[0, 1)`, speed ceiling above zero, smoothing in `[0, 1]`
    pub fn is_valid(&self) -> bool {
        let fraction = |v: f64| v.is_finite() && (0.0..1.0).contains(&v);
        fraction(self.dead_zone_x)
            && fraction(self.dead_zone_y)
            && self.max_movement_speed.is_finite()
            && self.max_movement_speed > 0.0
            && self.movement_smoothing.is_finite()
            && (0.0..=1.0).contains(&self.movement_smoothing)
    }
}

fn default_area_frame() -> FrameSize {
    FrameSize::new(1280, 720)
}

/// Four-corner area calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaCalibration {
    #[serde(default)]
    pub working_area: Option<WorkingArea>,
    #[serde(default = "default_area_frame")]
    pub frame_size: FrameSize,
    #[serde(default)]
    pub settings: AreaSettings,
}

impl Default for AreaCalibration {
    fn default() -> Self {
        Self {
            working_area: None,
            frame_size: default_area_frame(),
            settings: AreaSettings::default(),
        }
    }
}

/// Stored calibration, one per camera identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Calibration {
    Fov(FovCalibration),
    Area(AreaCalibration),
}

impl Default for Calibration {
    fn default() -> Self {
        Calibration::Fov(FovCalibration::default())
    }
}

/// One computed absolute move (FOV strategy)
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MovementRecord {
    pub timestamp: f64,
    pub pan_increment: f64,
    pub tilt_increment: f64,
    pub from: Position,
    pub to: Position,
}

/// Statistics over the most recent moves
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MovementStats {
    pub total_movements: usize,
    pub recent_movements: usize,
    pub avg_pan_increment: f64,
    pub avg_tilt_increment: f64,
    pub max_pan_increment: f64,
    pub max_tilt_increment: f64,
}
