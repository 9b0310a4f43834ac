//! Field-of-view converter
//!
//! Maps a detection's offset from frame centre to an absolute PTZ target,
//! treating the declared FOV as a fraction of a full 360° turn.

use super::types::{FovCalibration, MovementRecord, MovementStats};
use crate::models::{now_secs, Detection, FrameSize, Position};
use std::collections::VecDeque;

/// Movement history capacity
pub const MOVEMENT_HISTORY_CAPACITY: usize = 20;

/// Moves considered by [`FovConverter::movement_statistics`]
const RECENT_WINDOW: usize = 10;

/// Share of current zoom that shrinks angular travel
const ZOOM_TRAVEL_DAMPING: f64 = 0.7;

/// Damping applied to the raw zoom correction
const ZOOM_SMOOTHING: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct FovConverter {
    calibration: FovCalibration,
    history: VecDeque<MovementRecord>,
}

impl FovConverter {
    pub fn new(calibration: FovCalibration) -> Self {
        Self {
            calibration,
            history: VecDeque::with_capacity(MOVEMENT_HISTORY_CAPACITY),
        }
    }

    pub fn calibration(&self) -> &FovCalibration {
        &self.calibration
    }

    pub fn set_field_of_view(&mut self, horizontal_degrees: f64, vertical_degrees: f64) {
        self.calibration.field_of_view.horizontal_degrees = horizontal_degrees;
        self.calibration.field_of_view.vertical_degrees = vertical_degrees;
    }

    /// Absolute target that brings `detection` to the frame centre
    pub fn pixel_to_ptz(
        &mut self,
        detection: &Detection,
        frame: FrameSize,
        current: &Position,
    ) -> Position {
        let (cx, cy) = frame.center();
        let nx = (detection.center_x() - cx) / cx;
        let ny = (detection.center_y() - cy) / cy;

        let cal = &self.calibration;
        let fov = cal.field_of_view;
        // image y grows downward, tilt grows upward
        let mut pan_inc = nx * (fov.horizontal_degrees / 360.0);
        let mut tilt_inc = -ny * (fov.vertical_degrees / 360.0);

        pan_inc *= cal.movement_scaling.pan_factor;
        tilt_inc *= cal.movement_scaling.tilt_factor;

        let zoom_factor = 1.0 - current.zoom * ZOOM_TRAVEL_DAMPING;
        pan_inc *= zoom_factor;
        tilt_inc *= zoom_factor;

        let pan = cal
            .pan_range
            .clamp(current.pan + pan_inc + cal.center_offset.pan);
        let tilt = cal
            .tilt_range
            .clamp(current.tilt + tilt_inc + cal.center_offset.tilt);
        let zoom = self.optimal_zoom(detection, frame, current.zoom);

        let target = Position::new(pan, tilt, zoom);

        if self.history.len() >= MOVEMENT_HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(MovementRecord {
            timestamp: now_secs(),
            pan_increment: pan_inc,
            tilt_increment: tilt_inc,
            from: *current,
            to: target,
        });

        target
    }

    /// Zoom that moves the object's largest relative dimension toward
    /// `target_object_ratio`
    pub fn optimal_zoom(&self, detection: &Detection, frame: FrameSize, current_zoom: f64) -> f64 {
        let ratio_w = detection.width / frame.width as f64;
        let ratio_h = detection.height / frame.height as f64;
        let ratio = ratio_w.max(ratio_h);

        if ratio > 0.0 {
            let correction = (self.calibration.target_object_ratio / ratio - 1.0) * ZOOM_SMOOTHING;
            self.calibration
                .zoom_range
                .clamp(current_zoom * (1.0 + correction))
        } else {
            current_zoom
        }
    }

    pub fn movement_statistics(&self) -> MovementStats {
        if self.history.is_empty() {
            return MovementStats::default();
        }

        let skip = self.history.len().saturating_sub(RECENT_WINDOW);
        let recent: Vec<&MovementRecord> = self.history.iter().skip(skip).collect();
        let n = recent.len() as f64;

        MovementStats {
            total_movements: self.history.len(),
            recent_movements: recent.len(),
            avg_pan_increment: recent.iter().map(|m| m.pan_increment).sum::<f64>() / n,
            avg_tilt_increment: recent.iter().map(|m| m.tilt_increment).sum::<f64>() / n,
            max_pan_increment: recent
                .iter()
                .map(|m| m.pan_increment.abs())
                .fold(0.0, f64::max),
            max_tilt_increment: recent
                .iter()
                .map(|m| m.tilt_increment.abs())
                .fold(0.0, f64::max),
        }
    }
}

impl Default for FovConverter {
    fn default() -> Self {
        Self::new(FovCalibration::default())
    }
}
