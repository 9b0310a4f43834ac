//! Detection Confirmation Tracker
//!
//! Rejects noisy per-frame detections and confirms a stable target.
//!
//! ## Confirmation rule
//!
//! The last `confirmation_frames` detections form a window. A window is
//! stable when every confidence reaches `min_confidence`, no consecutive
//! centroid jump exceeds `max_position_jump` and the window spans at most
//! `confirmation_timeout` seconds. `stability_frames` consecutive stable
//! windows confirm the target; any unstable window resets the count.

mod types;

pub use types::*;

use crate::models::{now_secs, Detection};
use std::collections::VecDeque;

/// Per-camera confirmation tracker (single writer: the owning controller)
#[derive(Debug)]
pub struct ConfirmationTracker {
    config: ConfirmationConfig,
    history: VecDeque<Detection>,
    stable_count: u32,
    confirmed_target: Option<Detection>,
    last_confirmed_at: Option<f64>,
}

impl ConfirmationTracker {
    pub fn new(config: ConfirmationConfig) -> Self {
        Self {
            config,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            stable_count: 0,
            confirmed_target: None,
            last_confirmed_at: None,
        }
    }

    pub fn config(&self) -> &ConfirmationConfig {
        &self.config
    }

    /// Add a detection received now; returns true when it confirms the target
    pub fn add_detection(&mut self, detection: Detection) -> bool {
        self.add_detection_at(detection, now_secs())
    }

    /// Add a detection received at `received_at` (Unix seconds)
    ///
    /// Detection timestamps only drive the window span and velocity; the
    /// confirmation time is the receive time, so detectors may stamp frames
    /// on their own clock.
    pub fn add_detection_at(&mut self, detection: Detection, received_at: f64) -> bool {
        if self.history.len() >= HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(detection);

        let frames = self.config.confirmation_frames;
        if self.history.len() < frames {
            return false;
        }

        if self.window_is_stable(self.history.len() - frames) {
            self.stable_count += 1;

            if self.stable_count >= self.config.stability_frames {
                self.confirmed_target = self.history.back().cloned();
                self.last_confirmed_at = Some(received_at);
                return true;
            }
        } else {
            self.stable_count = 0;
        }

        false
    }

    /// Stability of the window `history[start..]`
    fn window_is_stable(&self, start: usize) -> bool {
        let window: Vec<&Detection> = self.history.iter().skip(start).collect();
        if window.len() < 2 {
            return false;
        }

        if window
            .iter()
            .any(|d| d.confidence < self.config.min_confidence)
        {
            return false;
        }

        if window
            .windows(2)
            .any(|pair| pair[1].distance_to(pair[0]) > self.config.max_position_jump)
        {
            return false;
        }

        let span = window[window.len() - 1].timestamp - window[0].timestamp;
        span <= self.config.confirmation_timeout
    }

    /// Latency-compensated target position
    ///
    /// Extrapolates the most recent detection by `camera_delay` using the
    /// velocity of the last (up to) three detections. Falls back to the
    /// confirmed target when prediction is off or velocity is undefined.
    pub fn predicted_position(&self) -> Option<Detection> {
        if !self.config.movement_prediction || self.history.len() < 2 {
            return self.confirmed_target.clone();
        }

        let skip = self.history.len().saturating_sub(3);
        let recent: Vec<&Detection> = self.history.iter().skip(skip).collect();
        let first = recent[0];
        let last = recent[recent.len() - 1];

        let dt = last.timestamp - first.timestamp;
        if dt <= 0.0 {
            return self.confirmed_target.clone();
        }

        let vx = (last.center_x() - first.center_x()) / dt;
        let vy = (last.center_y() - first.center_y()) / dt;
        let ahead = self.config.camera_delay;

        Some(Detection {
            x: last.x + vx * ahead,
            y: last.y + vy * ahead,
            width: last.width,
            height: last.height,
            confidence: last.confidence,
            timestamp: last.timestamp + ahead,
            class_name: last.class_name.clone(),
            track_id: last.track_id.clone(),
        })
    }

    /// True when no target is confirmed or the last confirmation is stale
    pub fn is_target_lost(&self, timeout: f64) -> bool {
        self.is_target_lost_at(now_secs(), timeout)
    }

    pub fn is_target_lost_at(&self, now: f64, timeout: f64) -> bool {
        match (&self.confirmed_target, self.last_confirmed_at) {
            (Some(_), Some(at)) => now - at > timeout,
            _ => true,
        }
    }

    pub fn confirmed_target(&self) -> Option<&Detection> {
        self.confirmed_target.as_ref()
    }

    pub fn stable_count(&self) -> u32 {
        self.stable_count
    }

    pub fn clear_target(&mut self) {
        self.confirmed_target = None;
    }

    /// Drop history and confirmation state (new tracking session)
    pub fn reset(&mut self) {
        self.history.clear();
        self.stable_count = 0;
        self.confirmed_target = None;
        self.last_confirmed_at = None;
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            stable_count: self.stable_count,
            history_len: self.history.len(),
            has_confirmed_target: self.confirmed_target.is_some(),
            last_confirmed_at: self.last_confirmed_at,
        }
    }
}

impl Default for ConfirmationTracker {
    fn default() -> Self {
        Self::new(ConfirmationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f64, y: f64, confidence: f64, t: f64) -> Detection {
        Detection::new(x, y, 50.0, 50.0, confidence, t)
    }

    #[test]
    fn test_three_frame_scenario_confirms_on_third() {
        let mut tracker = ConfirmationTracker::new(ConfirmationConfig {
            confirmation_frames: 3,
            stability_frames: 1,
            ..Default::default()
        });

        assert!(!tracker.add_detection(det(100.0, 100.0, 0.9, 10.0)));
        assert!(!tracker.add_detection(det(105.0, 100.0, 0.9, 10.2)));
        assert!(tracker.add_detection(det(110.0, 100.0, 0.9, 10.4)));

        let target = tracker.confirmed_target().unwrap();
        assert_eq!(target.x, 110.0);
        assert_eq!(target.timestamp, 10.4);
    }

    #[test]
    fn test_first_confirmation_after_stability_frames_windows() {
        let mut tracker = ConfirmationTracker::default();
        let results: Vec<bool> = (0..4)
            .map(|i| tracker.add_detection(det(100.0 + i as f64, 100.0, 0.8, i as f64 * 0.1)))
            .collect();

        // windows become evaluable at the 3rd detection; 2 stable windows needed
        assert_eq!(results, vec![false, false, false, true]);
    }

    #[test]
    fn test_low_confidence_resets_stable_count() {
        let mut tracker = ConfirmationTracker::new(ConfirmationConfig {
            stability_frames: 5,
            ..Default::default()
        });
        for i in 0..4 {
            tracker.add_detection(det(100.0, 100.0, 0.9, i as f64 * 0.1));
        }
        assert_eq!(tracker.stable_count(), 2);

        tracker.add_detection(det(100.0, 100.0, 0.3, 0.5));
        assert_eq!(tracker.stable_count(), 0);
    }

    #[test]
    fn test_position_jump_is_unstable() {
        let mut tracker = ConfirmationTracker::new(ConfirmationConfig {
            stability_frames: 1,
            ..Default::default()
        });
        tracker.add_detection(det(100.0, 100.0, 0.9, 0.0));
        tracker.add_detection(det(100.0, 100.0, 0.9, 0.1));
        assert!(!tracker.add_detection(det(600.0, 100.0, 0.9, 0.2)));
        assert_eq!(tracker.stable_count(), 0);
    }

    #[test]
    fn test_slow_window_is_unstable() {
        let mut tracker = ConfirmationTracker::new(ConfirmationConfig {
            stability_frames: 1,
            ..Default::default()
        });
        tracker.add_detection(det(100.0, 100.0, 0.9, 0.0));
        tracker.add_detection(det(100.0, 100.0, 0.9, 1.5));
        assert!(!tracker.add_detection(det(100.0, 100.0, 0.9, 3.0)));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut tracker = ConfirmationTracker::default();
        for i in 0..25 {
            tracker.add_detection(det(100.0, 100.0, 0.9, i as f64 * 0.05));
        }
        assert_eq!(tracker.snapshot().history_len, HISTORY_CAPACITY);
    }

    #[test]
    fn test_prediction_extrapolates_by_camera_delay() {
        let mut tracker = ConfirmationTracker::default();
        tracker.add_detection(det(100.0, 100.0, 0.9, 0.0));
        tracker.add_detection(det(110.0, 100.0, 0.9, 0.5));
        tracker.add_detection(det(120.0, 100.0, 0.9, 1.0));

        // 20 px/s over 0.8 s
        let predicted = tracker.predicted_position().unwrap();
        assert!((predicted.x - 136.0).abs() < 1e-9);
        assert!((predicted.y - 100.0).abs() < 1e-9);
        assert!((predicted.timestamp - 1.8).abs() < 1e-9);
    }

    #[test]
    fn test_prediction_disabled_returns_confirmed() {
        let mut tracker = ConfirmationTracker::new(ConfirmationConfig {
            movement_prediction: false,
            stability_frames: 1,
            ..Default::default()
        });
        tracker.add_detection(det(100.0, 100.0, 0.9, 0.0));
        tracker.add_detection(det(110.0, 100.0, 0.9, 0.5));
        tracker.add_detection(det(120.0, 100.0, 0.9, 1.0));

        assert_eq!(tracker.predicted_position().unwrap().x, 120.0);
    }

    #[test]
    fn test_target_lost() {
        let mut tracker = ConfirmationTracker::new(ConfirmationConfig {
            stability_frames: 1,
            ..Default::default()
        });
        assert!(tracker.is_target_lost_at(0.0, 5.0));

        for i in 0..3 {
            tracker.add_detection_at(det(100.0, 100.0, 0.9, i as f64 * 0.1), 100.0 + i as f64 * 0.1);
        }
        assert!(!tracker.is_target_lost_at(104.0, 5.0));
        assert!(tracker.is_target_lost_at(106.0, 5.0));

        tracker.clear_target();
        assert!(tracker.is_target_lost_at(100.3, 5.0));
    }

    #[test]
    fn test_stream_relative_timestamps_not_lost() {
        let mut tracker = ConfirmationTracker::new(ConfirmationConfig {
            stability_frames: 1,
            ..Default::default()
        });

        // frame PTS far from the Unix clock
        let mut confirmed = false;
        for i in 0..3 {
            confirmed = tracker.add_detection(det(100.0, 100.0, 0.9, 12.0 + i as f64 * 0.1));
        }

        assert!(confirmed);
        assert!(!tracker.is_target_lost(5.0));
        assert_eq!(tracker.confirmed_target().unwrap().timestamp, 12.2);
    }
}
