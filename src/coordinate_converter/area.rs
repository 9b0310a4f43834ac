//! Four-corner area converter
//!
//! Bilinear interpolation over four sampled device positions. Zoom values
//! are device-raw and never clamped.

use super::types::{AreaCalibration, AreaSettings, Corner, WorkingArea};
use crate::models::{FrameSize, Position};

/// Gain from PTZ-space delta to continuous-move speed
const SPEED_GAIN: f64 = 2.0;

/// Continuous-move command computed for one cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingMovement {
    pub pan_speed: f64,
    pub tilt_speed: f64,
    pub zoom_target: Option<f64>,
}

impl TrackingMovement {
    pub const IDLE: Self = Self {
        pan_speed: 0.0,
        tilt_speed: 0.0,
        zoom_target: None,
    };

    pub fn is_idle(&self) -> bool {
        self.pan_speed == 0.0 && self.tilt_speed == 0.0
    }
}

#[derive(Debug, Clone)]
pub struct AreaConverter {
    calibration: AreaCalibration,
    last_pan_speed: f64,
    last_tilt_speed: f64,
}

impl AreaConverter {
    /// Invalid tuning knobs are replaced by defaults
    pub fn new(mut calibration: AreaCalibration) -> Self {
        if !calibration.settings.is_valid() {
            tracing::warn!(settings = ?calibration.settings, "Invalid area settings, using defaults");
            calibration.settings = AreaSettings::default();
        }
        Self {
            calibration,
            last_pan_speed: 0.0,
            last_tilt_speed: 0.0,
        }
    }

    pub fn calibration(&self) -> &AreaCalibration {
        &self.calibration
    }

    pub fn settings(&self) -> &AreaSettings {
        &self.calibration.settings
    }

    pub fn frame_size(&self) -> FrameSize {
        self.calibration.frame_size
    }

    pub fn set_frame_size(&mut self, frame: FrameSize) {
        self.calibration.frame_size = frame;
    }

    /// Replace the working area; rejected when any corner is non-finite
    pub fn set_working_area(&mut self, area: WorkingArea) -> bool {
        if !area.is_finite() {
            return false;
        }
        if !self.calibration.settings.is_valid() {
            tracing::warn!(settings = ?self.calibration.settings, "Invalid area settings, using defaults");
            self.calibration.settings = AreaSettings::default();
        }
        self.calibration.working_area = Some(area);
        true
    }

    /// Bilinear mapping of a pixel inside the frame
    pub fn pixel_to_ptz(&self, x: f64, y: f64) -> Option<Position> {
        let area = self.calibration.working_area.as_ref()?;
        let frame = self.calibration.frame_size;
        if frame.width == 0 || frame.height == 0 {
            return None;
        }

        let nx = x / frame.width as f64;
        let ny = y / frame.height as f64;
        if !(0.0..=1.0).contains(&nx) || !(0.0..=1.0).contains(&ny) {
            return None;
        }

        let left = lerp_corner(&area.top_left, &area.bottom_left, ny);
        let right = lerp_corner(&area.top_right, &area.bottom_right, ny);
        let p = lerp_corner(&left, &right, nx);

        Some(Position::new(p.pan, p.tilt, p.zoom))
    }

    /// Continuous-move speeds that bring the object toward frame centre
    ///
    /// Stateful: the returned speeds become the smoothing baseline for the
    /// next call. Dead-zone hits leave the baseline untouched.
    pub fn tracking_movement(&mut self, object_x: f64, object_y: f64) -> TrackingMovement {
        let Some(area) = self.calibration.working_area else {
            return TrackingMovement::IDLE;
        };

        let frame = self.calibration.frame_size;
        let settings = self.calibration.settings;
        let center_x = (frame.width / 2) as f64;
        let center_y = (frame.height / 2) as f64;

        let dx = object_x - center_x;
        let dy = object_y - center_y;
        if dx.abs() < frame.width as f64 * settings.dead_zone_x
            && dy.abs() < frame.height as f64 * settings.dead_zone_y
        {
            return TrackingMovement::IDLE;
        }

        let (Some(object), Some(center)) = (
            self.pixel_to_ptz(object_x, object_y),
            self.pixel_to_ptz(center_x, center_y),
        ) else {
            return TrackingMovement::IDLE;
        };

        let max = settings.max_movement_speed.abs();
        let pan_speed = ((center.pan - object.pan) * SPEED_GAIN).max(-max).min(max);
        let tilt_speed = ((center.tilt - object.tilt) * SPEED_GAIN).max(-max).min(max);

        let s = settings.movement_smoothing;
        let pan_speed = self.last_pan_speed * (1.0 - s) + pan_speed * s;
        let tilt_speed = self.last_tilt_speed * (1.0 - s) + tilt_speed * s;
        self.last_pan_speed = pan_speed;
        self.last_tilt_speed = tilt_speed;

        TrackingMovement {
            pan_speed,
            tilt_speed,
            zoom_target: Some(zoom_at(&area, &object)),
        }
    }

    /// Forget the smoothing baseline (new tracking session)
    pub fn reset_smoothing(&mut self) {
        self.last_pan_speed = 0.0;
        self.last_tilt_speed = 0.0;
    }
}

impl Default for AreaConverter {
    fn default() -> Self {
        Self::new(AreaCalibration::default())
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + t * (b - a)
}

fn lerp_corner(a: &Corner, b: &Corner, t: f64) -> Corner {
    Corner::new(
        lerp(a.pan, b.pan, t),
        lerp(a.tilt, b.tilt, t),
        lerp(a.zoom, b.zoom, t),
    )
}

/// Corner-zoom interpolation at a mapped position
fn zoom_at(area: &WorkingArea, p: &Position) -> f64 {
    let pan_span = area.top_right.pan - area.top_left.pan;
    let tilt_span = area.top_left.tilt - area.bottom_left.tilt;

    let x_ratio = if pan_span != 0.0 {
        (p.pan - area.top_left.pan) / pan_span
    } else {
        0.5
    };
    let y_ratio = if tilt_span != 0.0 {
        (area.top_left.tilt - p.tilt) / tilt_span
    } else {
        0.5
    };

    let top = lerp(area.top_left.zoom, area.top_right.zoom, x_ratio);
    let bottom = lerp(area.bottom_left.zoom, area.bottom_right.zoom, x_ratio);
    lerp(top, bottom, y_ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symmetric_area(zoom: f64) -> WorkingArea {
        WorkingArea {
            top_left: Corner::new(-0.5, 0.5, zoom),
            top_right: Corner::new(0.5, 0.5, zoom),
            bottom_left: Corner::new(-0.5, -0.5, zoom),
            bottom_right: Corner::new(0.5, -0.5, zoom),
        }
    }

    fn converter(area: WorkingArea) -> AreaConverter {
        let mut conv = AreaConverter::default();
        assert!(conv.set_working_area(area));
        conv
    }

    #[test]
    fn test_no_working_area_maps_nothing() {
        let mut conv = AreaConverter::default();
        assert!(conv.pixel_to_ptz(10.0, 10.0).is_none());
        assert_eq!(conv.tracking_movement(0.0, 0.0), TrackingMovement::IDLE);
    }

    #[test]
    fn test_corners_map_exactly() {
        let area = WorkingArea {
            top_left: Corner::new(-0.8, 0.6, 0.1),
            top_right: Corner::new(0.7, 0.5, 0.2),
            bottom_left: Corner::new(-0.6, -0.4, 0.3),
            bottom_right: Corner::new(0.9, -0.3, 0.4),
        };
        let conv = converter(area);

        let cases = [
            ((0.0, 0.0), area.top_left),
            ((1280.0, 0.0), area.top_right),
            ((0.0, 720.0), area.bottom_left),
            ((1280.0, 720.0), area.bottom_right),
        ];
        for ((x, y), corner) in cases {
            let p = conv.pixel_to_ptz(x, y).unwrap();
            assert!((p.pan - corner.pan).abs() < 1e-12);
            assert!((p.tilt - corner.tilt).abs() < 1e-12);
            assert!((p.zoom - corner.zoom).abs() < 1e-12);
        }
    }

    #[test]
    fn test_center_of_symmetric_area() {
        let conv = converter(symmetric_area(0.3));
        let p = conv.pixel_to_ptz(640.0, 360.0).unwrap();

        assert!(p.pan.abs() < 1e-12);
        assert!(p.tilt.abs() < 1e-12);
        assert!((p.zoom - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_outside_frame_maps_nothing() {
        let conv = converter(symmetric_area(0.3));
        assert!(conv.pixel_to_ptz(-1.0, 10.0).is_none());
        assert!(conv.pixel_to_ptz(10.0, 721.0).is_none());
    }

    #[test]
    fn test_non_finite_corner_rejected() {
        let mut conv = AreaConverter::default();
        let mut area = symmetric_area(0.3);
        area.bottom_right.pan = f64::NAN;

        assert!(!conv.set_working_area(area));
        assert!(conv.calibration().working_area.is_none());
    }

    #[test]
    fn test_dead_zone_is_idle_and_idempotent() {
        let mut conv = converter(symmetric_area(0.3));

        assert_eq!(conv.tracking_movement(640.0, 360.0), TrackingMovement::IDLE);
        assert_eq!(conv.tracking_movement(660.0, 370.0), TrackingMovement::IDLE);
        assert_eq!(conv.tracking_movement(660.0, 370.0), TrackingMovement::IDLE);
    }

    #[test]
    fn test_speed_clamped_and_smoothed() {
        let mut conv = converter(symmetric_area(0.3));

        // object at the right edge: delta pan = -0.5, raw speed clamps to -0.3
        let first = conv.tracking_movement(1280.0, 360.0);
        assert!((first.pan_speed - (-0.3 * 0.7)).abs() < 1e-12);
        assert!(first.tilt_speed.abs() < 1e-12);

        let second = conv.tracking_movement(1280.0, 360.0);
        let expected = -0.21 * 0.3 + -0.3 * 0.7;
        assert!((second.pan_speed - expected).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_settings_fall_back_to_defaults() {
        let mut settings = AreaSettings::default();
        settings.max_movement_speed = -0.3;
        let mut conv = AreaConverter::new(AreaCalibration {
            working_area: Some(symmetric_area(0.3)),
            settings,
            ..AreaCalibration::default()
        });
        assert_eq!(conv.calibration().settings, AreaSettings::default());

        let m = conv.tracking_movement(1280.0, 360.0);
        assert!((m.pan_speed - (-0.3 * 0.7)).abs() < 1e-12);

        settings.movement_smoothing = f64::NAN;
        assert!(!settings.is_valid());
    }

    #[test]
    fn test_zoom_target_is_device_raw() {
        let area = WorkingArea {
            top_left: Corner::new(-0.5, 0.5, 2.0),
            top_right: Corner::new(0.5, 0.5, 4.0),
            bottom_left: Corner::new(-0.5, -0.5, 2.0),
            bottom_right: Corner::new(0.5, -0.5, 4.0),
        };
        let mut conv = converter(area);

        let m = conv.tracking_movement(1280.0, 360.0);
        assert!((m.zoom_target.unwrap() - 4.0).abs() < 1e-12);
    }
}
