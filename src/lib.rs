//! PTZ Tracker Library
//!
//! Drives network PTZ cameras to keep detected objects in view.
//!
//! ## Architecture (8 Components)
//!
//! 1. ConfirmationTracker - Multi-frame target confirmation and prediction
//! 2. CoordinateConverter - Pixel to PTZ conversion (FOV and 4-corner area)
//! 3. CalibrationStore - Per-camera calibration persistence
//! 4. PtzTransport - Device command contract (ONVIF implementation)
//! 5. CameraController - Per-camera control loop
//! 6. PtzManager - Camera registry, ingestion and health sweep
//! 7. CameraStatusTracker - Health transition detection
//! 8. WebAPI - REST API endpoints
//!
//! ## Design Principles
//!
//! - One controller per camera, one state lock per controller
//! - No lock held across a device call
//! - Transport behind a trait so control logic runs against mocks

pub mod calibration_store;
pub mod camera_controller;
pub mod camera_status_tracker;
pub mod confirmation_tracker;
pub mod coordinate_converter;
pub mod error;
pub mod models;
pub mod ptz_manager;
pub mod ptz_transport;
pub mod state;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
