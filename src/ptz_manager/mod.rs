//! PTZ Manager
//!
//! ## Responsibilities
//!
//! - Camera registry keyed by identity (`id`, else `ip`)
//! - Detection ingestion (decode + routing to the camera's controller)
//! - Bulk lifecycle (connect/start/stop/disconnect all)
//! - Periodic advisory health sweep
//! - Configuration export

mod decode;
mod health;
mod service;
mod types;

pub use decode::*;
pub use health::{build_report, classify_camera};
pub use service::PtzManager;
pub use types::*;
