//! Multi-camera registry and health sweep

use super::decode::decode_detection;
use super::health::{build_report, classify_camera};
use super::types::*;
use crate::calibration_store::CalibrationStore;
use crate::camera_controller::{CameraConfig, CameraController, CameraStats, DetailedStatus};
use crate::camera_status_tracker::CameraStatusTracker;
use crate::error::{Error, Result};
use crate::models::{now_secs, FrameSize};
use crate::ptz_transport::PtzTransport;
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

const MONITOR_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Issues shown in a single sweep warning
const SWEEP_ISSUE_PREVIEW: usize = 3;

struct MonitorTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns every camera controller and the health monitor
pub struct PtzManager<T: PtzTransport> {
    transport: Arc<T>,
    store: Option<Arc<CalibrationStore>>,
    config: ManagerConfig,
    cameras: RwLock<HashMap<String, Arc<CameraController<T>>>>,
    /// Lifecycle ops hold it shared; the sweep holds it exclusively
    lifecycle: RwLock<()>,
    status_tracker: CameraStatusTracker,
    global_settings: RwLock<serde_json::Map<String, serde_json::Value>>,
    total_detections: AtomicU64,
    started_at: f64,
    monitor: Mutex<Option<MonitorTask>>,
}

impl<T: PtzTransport> PtzManager<T> {
    pub fn new(transport: Arc<T>, store: Option<Arc<CalibrationStore>>, config: ManagerConfig) -> Self {
        Self {
            transport,
            store,
            config,
            cameras: RwLock::new(HashMap::new()),
            lifecycle: RwLock::new(()),
            status_tracker: CameraStatusTracker::new(),
            global_settings: RwLock::new(serde_json::Map::new()),
            total_detections: AtomicU64::new(0),
            started_at: now_secs(),
            monitor: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Register a camera; an existing identity keeps its controller
    pub async fn register(&self, config: CameraConfig) -> String {
        let _guard = self.lifecycle.read().await;
        let id = config.camera_id().to_string();

        let mut cameras = self.cameras.write().await;
        if cameras.contains_key(&id) {
            tracing::debug!(camera_id = %id, "Camera already registered");
            return id;
        }

        tracing::info!(
            camera_id = %id,
            name = %config.display_name(),
            ip = %config.ip,
            strategy = ?config.tracking.strategy,
            "PTZ camera registered"
        );
        let controller = CameraController::new(config, self.transport.clone(), self.store.clone());
        cameras.insert(id.clone(), Arc::new(controller));
        id
    }

    /// Register every camera of an inventory
    pub async fn load_configuration(&self, file: CamerasFile) -> Vec<String> {
        {
            let mut settings = self.global_settings.write().await;
            settings.extend(file.global_settings);
        }

        let mut ids = Vec::with_capacity(file.cameras.len());
        for camera in file.cameras {
            ids.push(self.register(camera).await);
        }
        tracing::info!(count = ids.len(), "Camera configuration loaded");
        ids
    }

    pub async fn load_cameras_file(&self, path: &Path) -> Result<Vec<String>> {
        let raw = tokio::fs::read_to_string(path).await?;
        let file: CamerasFile = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(self.load_configuration(file).await)
    }

    pub async fn get(&self, camera_id: &str) -> Option<Arc<CameraController<T>>> {
        self.cameras.read().await.get(camera_id).cloned()
    }

    /// Like `get`, but unknown identities are an error
    pub async fn controller(&self, camera_id: &str) -> Result<Arc<CameraController<T>>> {
        self.get(camera_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("camera {}", camera_id)))
    }

    pub async fn camera_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.cameras.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn controllers(&self) -> Vec<Arc<CameraController<T>>> {
        let mut list: Vec<_> = self.cameras.read().await.values().cloned().collect();
        list.sort_by(|a, b| a.id().cmp(b.id()));
        list
    }

    pub async fn connect(&self, camera_id: &str) -> Result<bool> {
        let controller = self.controller(camera_id).await?;
        let _guard = self.lifecycle.read().await;
        Ok(controller.connect().await)
    }

    /// Connect every registered camera concurrently
    pub async fn connect_all(&self) -> BTreeMap<String, bool> {
        let _guard = self.lifecycle.read().await;
        let controllers = self.controllers().await;

        let results = join_all(controllers.iter().map(|c| async move {
            (c.id().to_string(), c.connect().await)
        }))
        .await;

        let connected = results.iter().filter(|(_, ok)| *ok).count();
        tracing::info!(
            connected = connected,
            total = results.len(),
            "Connect-all finished"
        );
        results.into_iter().collect()
    }

    /// Start tracking, connecting first when needed
    pub async fn start_tracking(&self, camera_id: &str) -> Result<bool> {
        let controller = self.controller(camera_id).await?;
        let _guard = self.lifecycle.read().await;

        if !controller.is_connected().await && !controller.connect().await {
            tracing::warn!(camera_id = %camera_id, "Tracking not started: connect failed");
            return Ok(false);
        }
        Ok(controller.start_tracking().await)
    }

    pub async fn start_all_tracking(&self) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();
        for id in self.camera_ids().await {
            let started = self.start_tracking(&id).await.unwrap_or(false);
            results.insert(id, started);
        }
        results
    }

    pub async fn stop_tracking(&self, camera_id: &str) -> Result<bool> {
        let controller = self.controller(camera_id).await?;
        Ok(controller.stop_tracking().await)
    }

    pub async fn stop_all_tracking(&self) {
        let controllers = self.controllers().await;
        join_all(controllers.iter().map(|c| c.stop_tracking())).await;
    }

    /// Route one raw detection record to its camera
    ///
    /// Unknown or non-tracking cameras return false. Undecodable records
    /// are counted as filtered by the controller.
    pub async fn add_detection(
        &self,
        camera_id: &str,
        raw: &serde_json::Value,
        frame: FrameSize,
    ) -> bool {
        let Some(controller) = self.get(camera_id).await else {
            tracing::debug!(camera_id = %camera_id, "Detection for unknown camera");
            return false;
        };

        let accepted = controller
            .add_detection(decode_detection(raw, now_secs()), frame)
            .await;
        if accepted {
            self.total_detections.fetch_add(1, Ordering::Relaxed);
        }
        accepted
    }

    pub async fn disconnect(&self, camera_id: &str) -> Result<()> {
        let controller = self.controller(camera_id).await?;
        let _guard = self.lifecycle.read().await;
        controller.disconnect().await;
        Ok(())
    }

    pub async fn disconnect_all(&self) {
        let _guard = self.lifecycle.read().await;
        let controllers = self.controllers().await;
        join_all(controllers.iter().map(|c| c.disconnect())).await;
        tracing::info!(count = controllers.len(), "All PTZ cameras disconnected");
    }

    pub async fn health(&self) -> HealthReport {
        let now = now_secs();
        let mut cameras = BTreeMap::new();
        for controller in self.controllers().await {
            let probe = controller.health_probe().await;
            cameras.insert(
                controller.id().to_string(),
                classify_camera(&probe, now, &self.config),
            );
        }
        build_report(cameras, now)
    }

    pub async fn camera_stats(&self, camera_id: &str) -> Result<CameraStats> {
        Ok(self.controller(camera_id).await?.stats().await)
    }

    pub async fn detailed_status(&self, camera_id: &str) -> Result<DetailedStatus> {
        Ok(self.controller(camera_id).await?.detailed_status().await)
    }

    pub async fn all_stats(&self) -> ManagerStats {
        let mut cameras = BTreeMap::new();
        for controller in self.controllers().await {
            cameras.insert(controller.id().to_string(), controller.stats().await);
        }

        let manager_stats = ManagerSummary {
            registered_cameras: cameras.len(),
            active_cameras: cameras.values().filter(|s| s.is_connected).count(),
            tracking_cameras: cameras.values().filter(|s| s.is_tracking).count(),
            total_detections: self.total_detections.load(Ordering::Relaxed),
            uptime_seconds: (now_secs() - self.started_at).max(0.0),
        };
        ManagerStats {
            manager_stats,
            cameras,
        }
    }

    /// Running configuration with a stats snapshot per camera
    pub async fn export_configuration(&self) -> ExportedConfiguration {
        let mut cameras = Vec::new();
        for controller in self.controllers().await {
            cameras.push(ExportedCamera {
                camera_id: controller.id().to_string(),
                config: controller.config().clone(),
                stats_snapshot: controller.stats().await,
            });
        }

        ExportedConfiguration {
            export_info: ExportInfo {
                timestamp: chrono::Utc::now(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                total_cameras: cameras.len(),
            },
            global_settings: self.global_settings.read().await.clone(),
            cameras,
        }
    }

    pub async fn export_to_file(&self, path: &Path) -> Result<()> {
        let export = self.export_configuration().await;
        let json = serde_json::to_string_pretty(&export)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, json).await?;
        tracing::info!(path = %path.display(), "Configuration exported");
        Ok(())
    }

    /// One health pass: classify, log transitions, warn on issues
    pub async fn sweep(&self) -> HealthReport {
        let _guard = self.lifecycle.write().await;
        let report = self.health().await;

        for (id, health) in &report.cameras_status {
            self.status_tracker.update_status(id, health.status).await;
        }

        if !report.issues.is_empty() {
            let preview: Vec<&str> = report
                .issues
                .iter()
                .take(SWEEP_ISSUE_PREVIEW)
                .map(String::as_str)
                .collect();
            tracing::warn!(
                overall = ?report.overall_status,
                issue_count = report.issues.len(),
                issues = ?preview,
                "PTZ health issues detected"
            );
        } else {
            tracing::debug!(cameras = report.cameras_status.len(), "PTZ health check ok");
        }
        report
    }

    /// Spawn the periodic health sweep
    ///
    /// The task holds a weak reference and ends once the manager is dropped.
    pub async fn start_monitor(self: &Arc<Self>) {
        let mut monitor = self.monitor.lock().await;
        if monitor.is_some() {
            return;
        }

        let (tx, mut rx) = watch::channel(false);
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.config.health_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let Some(manager) = weak.upgrade() else {
                            break;
                        };
                        manager.sweep().await;
                    }
                }
            }
            tracing::debug!("Health monitor stopped");
        });

        *monitor = Some(MonitorTask {
            shutdown: tx,
            handle,
        });
        tracing::info!(interval_sec = period.as_secs_f64(), "Health monitor started");
    }

    async fn stop_monitor(&self) {
        let Some(MonitorTask { shutdown, mut handle }) = self.monitor.lock().await.take() else {
            return;
        };
        let _ = shutdown.send(true);
        if tokio::time::timeout(MONITOR_JOIN_TIMEOUT, &mut handle)
            .await
            .is_err()
        {
            tracing::warn!("Health monitor did not stop in time, aborting");
            handle.abort();
        }
    }

    /// Stop tracking everywhere, disconnect, then stop the monitor
    pub async fn shutdown(&self) {
        tracing::info!("PTZ manager shutting down");
        self.stop_all_tracking().await;
        self.disconnect_all().await;
        self.stop_monitor().await;
        tracing::info!("PTZ manager stopped");
    }
}
