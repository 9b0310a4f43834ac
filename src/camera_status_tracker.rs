//! Camera Status Tracker
//!
//! Remembers each camera's last health classification so the periodic
//! sweep logs transitions only, not every unhealthy reading.

use crate::ptz_manager::HealthStatus;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Health transition event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraStatusEvent {
    /// Camera became (or changed between) unhealthy states
    Lost(HealthStatus),
    /// Camera returned to healthy
    Recovered,
}

/// Tracks per-camera health and detects transitions
pub struct CameraStatusTracker {
    statuses: RwLock<HashMap<String, HealthStatus>>,
}

impl CameraStatusTracker {
    pub fn new() -> Self {
        Self {
            statuses: RwLock::new(HashMap::new()),
        }
    }

    /// Record a classification and return the transition, if any
    ///
    /// A first reading that is already unhealthy counts as lost.
    pub async fn update_status(
        &self,
        camera_id: &str,
        status: HealthStatus,
    ) -> Option<CameraStatusEvent> {
        let mut statuses = self.statuses.write().await;
        let prev = statuses.insert(camera_id.to_string(), status);

        match (prev, status) {
            (None, HealthStatus::Healthy) => None,
            (Some(p), s) if p == s => None,
            (Some(_), HealthStatus::Healthy) => {
                tracing::info!(camera_id = %camera_id, "Camera health recovered");
                Some(CameraStatusEvent::Recovered)
            }
            (None, s) => {
                tracing::warn!(camera_id = %camera_id, status = ?s, "Camera unhealthy at first check");
                Some(CameraStatusEvent::Lost(s))
            }
            (Some(p), s) => {
                tracing::warn!(camera_id = %camera_id, from = ?p, to = ?s, "Camera health degraded");
                Some(CameraStatusEvent::Lost(s))
            }
        }
    }

    pub async fn get_status(&self, camera_id: &str) -> Option<HealthStatus> {
        self.statuses.read().await.get(camera_id).copied()
    }

    /// Cameras whose last reading was unhealthy
    pub async fn get_unhealthy_cameras(&self) -> Vec<String> {
        let statuses = self.statuses.read().await;
        let mut ids: Vec<String> = statuses
            .iter()
            .filter(|(_, s)| **s != HealthStatus::Healthy)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub async fn remove(&self, camera_id: &str) {
        self.statuses.write().await.remove(camera_id);
    }
}

impl Default for CameraStatusTracker {
    fn default() -> Self {
        Self::new()
    }
}
