//! Camera Controller - per-camera PTZ control loop
//!
//! ## Lifecycle
//!
//! `Disconnected -> Connecting -> Idle -> Tracking -> Idle`, any state back
//! to `Disconnected` on explicit disconnect. Too many transport faults while
//! tracking move the camera to `Faulted` until it is reconnected.
//!
//! ## Strategies
//!
//! - `absolute`: FOV conversion + AbsoluteMove with cooldown and speed tiers
//! - `area`: 4-corner conversion + ContinuousMove, stopped in the dead zone

mod service;
mod types;

pub use service::CameraController;
pub use types::*;
