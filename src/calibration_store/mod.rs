//! CalibrationStore - per-camera calibration persistence
//!
//! ## Responsibilities
//!
//! - Load a camera's calibration at connect time
//! - Persist it on every explicit save (FOV change, working-area change)
//! - Keep an in-memory copy for status/export reads
//!
//! Loading never fails: a missing record yields defaults, a corrupt record
//! yields defaults plus a warning.

mod repository;

pub use repository::{CalibrationRepository, StoredCalibration};

use crate::coordinate_converter::{AreaCalibration, AreaSettings, Calibration, FovCalibration};
use crate::error::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

pub struct CalibrationStore {
    repo: CalibrationRepository,
    cache: RwLock<HashMap<String, Calibration>>,
}

impl CalibrationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            repo: CalibrationRepository::new(dir),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        self.repo.dir()
    }

    /// Stored calibration, or `None` when absent or unreadable
    pub async fn load(&self, camera_id: &str) -> Option<Calibration> {
        match self.repo.read(camera_id).await {
            Ok(Some(record)) => {
                tracing::info!(camera_id = %camera_id, "Calibration loaded");
                self.cache
                    .write()
                    .await
                    .insert(camera_id.to_string(), record.calibration.clone());
                Some(record.calibration)
            }
            Ok(None) => {
                tracing::info!(camera_id = %camera_id, "No stored calibration, using defaults");
                None
            }
            Err(e) => {
                tracing::warn!(
                    camera_id = %camera_id,
                    error = %e,
                    "Calibration unreadable, using defaults"
                );
                None
            }
        }
    }

    /// FOV calibration for a camera; defaults unless an FOV record is stored
    pub async fn load_fov(&self, camera_id: &str) -> FovCalibration {
        match self.load(camera_id).await {
            Some(Calibration::Fov(cal)) => cal,
            Some(Calibration::Area(_)) => {
                tracing::warn!(
                    camera_id = %camera_id,
                    "Stored calibration is area-based, using FOV defaults"
                );
                FovCalibration::default()
            }
            None => FovCalibration::default(),
        }
    }

    /// Area calibration for a camera; defaults unless an area record is stored.
    /// Out-of-range tuning settings are replaced by their defaults.
    pub async fn load_area(&self, camera_id: &str) -> AreaCalibration {
        match self.load(camera_id).await {
            Some(Calibration::Area(mut cal)) => {
                if !cal.settings.is_valid() {
                    tracing::warn!(
                        camera_id = %camera_id,
                        settings = ?cal.settings,
                        "Stored area settings out of range, using defaults"
                    );
                    cal.settings = AreaSettings::default();
                }
                cal
            }
            Some(Calibration::Fov(_)) => {
                tracing::warn!(
                    camera_id = %camera_id,
                    "Stored calibration is FOV-based, using area defaults"
                );
                AreaCalibration::default()
            }
            None => AreaCalibration::default(),
        }
    }

    pub async fn save(&self, camera_id: &str, calibration: &Calibration) -> Result<()> {
        self.repo.write(camera_id, calibration).await?;
        self.cache
            .write()
            .await
            .insert(camera_id.to_string(), calibration.clone());

        tracing::info!(
            camera_id = %camera_id,
            path = %self.repo.path_for(camera_id).display(),
            "Calibration saved"
        );
        Ok(())
    }

    /// Last loaded or saved calibration (no disk access)
    pub async fn cached(&self, camera_id: &str) -> Option<Calibration> {
        self.cache.read().await.get(camera_id).cloned()
    }
}
