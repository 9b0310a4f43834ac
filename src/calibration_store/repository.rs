//! Calibration file repository
//!
//! One JSON document per camera identity under the store directory.

use crate::coordinate_converter::Calibration;
use crate::error::{Error, Result};
use crate::models::now_secs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCalibration {
    pub camera_id: String,
    #[serde(default)]
    pub saved_at: f64,
    #[serde(flatten)]
    pub calibration: Calibration,
}

#[derive(Debug, Clone)]
pub struct CalibrationRepository {
    dir: PathBuf,
}

impl CalibrationRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a camera identity (`192.168.1.10` -> `calibration_192_2e168_2e1_2e10.json`)
    ///
    /// `_` is doubled and every other byte outside `[A-Za-z0-9-]` becomes
    /// `_xx` hex, so distinct identities never share a file.
    pub fn path_for(&self, camera_id: &str) -> PathBuf {
        let mut encoded = String::with_capacity(camera_id.len());
        for b in camera_id.bytes() {
            match b {
                b'_' => encoded.push_str("__"),
                b if b.is_ascii_alphanumeric() || b == b'-' => encoded.push(b as char),
                b => encoded.push_str(&format!("_{:02x}", b)),
            }
        }
        self.dir.join(format!("calibration_{}.json", encoded))
    }

    /// Read a record; `Ok(None)` when none was ever saved
    pub async fn read(&self, camera_id: &str) -> Result<Option<StoredCalibration>> {
        let path = self.path_for(camera_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record = serde_json::from_slice(&bytes).map_err(|e| {
            Error::Calibration(format!("{}: {}", path.display(), e))
        })?;
        Ok(Some(record))
    }

    /// Write a record atomically (temp file then rename)
    pub async fn write(&self, camera_id: &str, calibration: &Calibration) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let record = StoredCalibration {
            camera_id: camera_id.to_string(),
            saved_at: now_secs(),
            calibration: calibration.clone(),
        };
        let json = serde_json::to_vec_pretty(&record)?;

        let path = self.path_for(camera_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        Ok(())
    }
}
