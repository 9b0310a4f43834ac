//! Pixel to PTZ coordinate conversion
//!
//! Two strategies share the calibration records in [`types`]:
//! - [`FovConverter`]: incremental absolute moves from a declared field of view
//! - [`AreaConverter`]: bilinear mapping inside a 4-corner working area,
//!   producing continuous-move speeds

mod area;
mod fov;
mod types;

pub use area::{AreaConverter, TrackingMovement};
pub use fov::{FovConverter, MOVEMENT_HISTORY_CAPACITY};
pub use types::*;
