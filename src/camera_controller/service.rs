//! Per-camera control loop
//!
//! One controller per registered camera. All mutable camera state lives
//! behind a single FIFO mutex; network calls are made with the lock
//! released, using session/profile values cloned out first.

use super::types::*;
use crate::calibration_store::CalibrationStore;
use crate::confirmation_tracker::ConfirmationTracker;
use crate::coordinate_converter::{
    AreaConverter, Calibration, FovConverter, SpeedLimits, TrackingMovement, WorkingArea,
};
use crate::error::{Error, Result};
use crate::models::{now_secs, Detection, FrameSize, Position};
use crate::ptz_manager::DetectionDecodeError;
use crate::ptz_transport::{PtzSpeed, PtzTransport, PtzVelocity, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// TCP reachability timeout
const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Verification nudge (pan units) and its speed
const VERIFY_NUDGE: f64 = 0.02;
const VERIFY_SPEED: f64 = 0.1;
const VERIFY_SETTLE: Duration = Duration::from_millis(1000);
const VERIFY_RETURN_SETTLE: Duration = Duration::from_millis(500);

/// Speed used for home returns
const HOME_SPEED: f64 = 0.3;

/// Bound on joining the control task at stop
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Mutable per-camera state
struct ControllerState<S> {
    state: CameraState,
    session: Option<S>,
    profile: Option<String>,
    current_position: Position,
    home_position: Position,
    tracker: ConfirmationTracker,
    fov: FovConverter,
    area: AreaConverter,
    frame: FrameSize,
    target: Option<Detection>,
    last_move_at: Option<Instant>,
    last_reconcile_at: Option<Instant>,
    area_moving: bool,
    last_zoom_target: Option<f64>,
    counters: CameraCounters,
    cycle_faults: u32,
    last_error: Option<LastError>,
    connected_at: Option<f64>,
    last_detection_at: Option<f64>,
    session_started_at: f64,
}

impl<S> ControllerState<S> {
    fn new(config: &CameraConfig) -> Self {
        Self {
            state: CameraState::Disconnected,
            session: None,
            profile: None,
            current_position: Position::default(),
            home_position: Position::default(),
            tracker: ConfirmationTracker::new(config.tracking.confirmation()),
            fov: FovConverter::default(),
            area: AreaConverter::default(),
            frame: FrameSize::default(),
            target: None,
            last_move_at: None,
            last_reconcile_at: None,
            area_moving: false,
            last_zoom_target: None,
            counters: CameraCounters::default(),
            cycle_faults: 0,
            last_error: None,
            connected_at: None,
            last_detection_at: None,
            session_started_at: now_secs(),
        }
    }

    fn record_error(&mut self, kind: ErrorKind, message: String) {
        self.last_error = Some(LastError {
            kind,
            message,
            at: now_secs(),
        });
    }

    fn record_transport_error(&mut self, e: &TransportError) {
        let kind = match e {
            TransportError::Connectivity(_) => ErrorKind::Connectivity,
            TransportError::Authorization(_) => ErrorKind::Authorization,
            TransportError::Protocol(_) => ErrorKind::Protocol,
        };
        self.record_error(kind, e.to_string());
    }

    fn link(&self) -> Option<(S, String)>
    where
        S: Clone,
    {
        Some((self.session.clone()?, self.profile.clone()?))
    }

    fn calibration(&self, strategy: TrackingStrategy) -> Calibration {
        match strategy {
            TrackingStrategy::Absolute => Calibration::Fov(self.fov.calibration().clone()),
            TrackingStrategy::Area => Calibration::Area(self.area.calibration().clone()),
        }
    }
}

/// State shared between the controller handle and its control task
struct Shared<T: PtzTransport> {
    id: String,
    config: CameraConfig,
    transport: Arc<T>,
    store: Option<Arc<CalibrationStore>>,
    inner: Mutex<ControllerState<T::Session>>,
}

struct TrackingTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Control loop for one PTZ camera
pub struct CameraController<T: PtzTransport> {
    shared: Arc<Shared<T>>,
    task: Mutex<Option<TrackingTask>>,
}

impl<T: PtzTransport> CameraController<T> {
    pub fn new(
        config: CameraConfig,
        transport: Arc<T>,
        store: Option<Arc<CalibrationStore>>,
    ) -> Self {
        let inner = Mutex::new(ControllerState::new(&config));
        Self {
            shared: Arc::new(Shared {
                id: config.camera_id().to_string(),
                config,
                transport,
                store,
                inner,
            }),
            task: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn config(&self) -> &CameraConfig {
        &self.shared.config
    }

    pub async fn state(&self) -> CameraState {
        self.shared.inner.lock().await.state
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await.is_connected()
    }

    pub async fn is_tracking(&self) -> bool {
        self.state().await == CameraState::Tracking
    }

    pub async fn last_error(&self) -> Option<LastError> {
        self.shared.inner.lock().await.last_error.clone()
    }

    pub async fn current_position(&self) -> Position {
        self.shared.inner.lock().await.current_position
    }

    pub async fn home_position(&self) -> Position {
        self.shared.inner.lock().await.home_position
    }

    /// Connect, read position and verify write access
    ///
    /// Returns false on any failing step; the state falls back to
    /// `Disconnected` with `last_error` set and the call may be retried.
    pub async fn connect(&self) -> bool {
        let shared = &self.shared;
        {
            let mut st = shared.inner.lock().await;
            match st.state {
                CameraState::Idle | CameraState::Tracking => return true,
                CameraState::Connecting => {
                    tracing::warn!(camera_id = %shared.id, "Connect already in progress");
                    return false;
                }
                CameraState::Disconnected | CameraState::Faulted => {}
            }
            st.state = CameraState::Connecting;
            st.counters.connection_attempts += 1;
        }
        // a faulted camera may still hold its finished task
        self.reap_task().await;

        tracing::info!(
            camera_id = %shared.id,
            host = %shared.config.ip,
            port = shared.config.port,
            "Connecting to PTZ camera"
        );

        match shared.establish().await {
            Ok(()) => {
                let mut st = shared.inner.lock().await;
                st.state = CameraState::Idle;
                st.counters.successful_connections += 1;
                st.cycle_faults = 0;
                st.connected_at = Some(now_secs());
                tracing::info!(
                    camera_id = %shared.id,
                    pan = st.current_position.pan,
                    tilt = st.current_position.tilt,
                    zoom = st.current_position.zoom,
                    "PTZ camera connected"
                );
                true
            }
            Err(e) => {
                let mut st = shared.inner.lock().await;
                st.state = CameraState::Disconnected;
                st.session = None;
                st.profile = None;
                st.record_transport_error(&e);
                if matches!(e, TransportError::Authorization(_)) {
                    tracing::error!(camera_id = %shared.id, error = %e, "PTZ credentials rejected");
                } else {
                    tracing::warn!(camera_id = %shared.id, error = %e, "PTZ connect failed");
                }
                false
            }
        }
    }

    /// Begin a tracking session and spawn the control task
    pub async fn start_tracking(&self) -> bool {
        let mut task = self.task.lock().await;
        {
            let mut st = self.shared.inner.lock().await;
            match st.state {
                CameraState::Tracking => {
                    tracing::warn!(camera_id = %self.shared.id, "Tracking already active");
                    return true;
                }
                CameraState::Idle => {}
                other => {
                    tracing::error!(
                        camera_id = %self.shared.id,
                        state = %other,
                        "Cannot start tracking: camera not connected"
                    );
                    return false;
                }
            }

            st.state = CameraState::Tracking;
            st.counters.reset_session();
            st.session_started_at = now_secs();
            st.tracker.reset();
            st.area.reset_smoothing();
            st.target = None;
            st.last_move_at = None;
            st.last_reconcile_at = None;
            st.area_moving = false;
        }

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(control_loop(self.shared.clone(), rx));
        *task = Some(TrackingTask {
            shutdown: tx,
            handle,
        });

        tracing::info!(
            camera_id = %self.shared.id,
            strategy = ?self.shared.config.tracking.strategy,
            "Tracking started"
        );
        true
    }

    /// Stop the control task, then optionally return home
    pub async fn stop_tracking(&self) -> bool {
        let was_tracking = {
            let task = self.task.lock().await;
            task.is_some()
        };
        self.join_task().await;

        let (link, area_moving, home) = {
            let mut st = self.shared.inner.lock().await;
            if st.state == CameraState::Tracking {
                st.state = CameraState::Idle;
            }
            if !st.state.is_connected() {
                return was_tracking;
            }
            st.target = None;
            let moving = std::mem::take(&mut st.area_moving);
            (st.link(), moving, st.home_position)
        };

        if was_tracking {
            tracing::info!(camera_id = %self.shared.id, "Tracking stopped");
        }

        let Some((session, profile)) = link else {
            return was_tracking;
        };

        if area_moving {
            if let Err(e) = self.shared.transport.stop(&session, &profile).await {
                tracing::warn!(camera_id = %self.shared.id, error = %e, "Stop command failed");
            }
        }

        if was_tracking && self.shared.config.tracking.return_home_on_stop {
            self.shared.move_home(&session, &profile, home).await;
        }
        was_tracking
    }

    /// Signal the control task and wait for it (bounded)
    async fn join_task(&self) {
        let Some(TrackingTask { shutdown, mut handle }) = self.task.lock().await.take() else {
            return;
        };
        let _ = shutdown.send(true);

        match tokio::time::timeout(STOP_JOIN_TIMEOUT, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(camera_id = %self.shared.id, error = %e, "Control task ended abnormally");
            }
            Err(_) => {
                tracing::warn!(camera_id = %self.shared.id, "Control task did not stop in time, aborting");
                handle.abort();
            }
        }
    }

    /// Drop a task that already finished on its own (fault halt)
    async fn reap_task(&self) {
        let mut task = self.task.lock().await;
        if let Some(t) = task.take() {
            let _ = t.shutdown.send(true);
            t.handle.abort();
        }
    }

    /// Ingest one decoded (or undecodable) detection
    ///
    /// Returns true when the detection was accepted by the tracker.
    pub async fn add_detection(
        &self,
        decoded: std::result::Result<Detection, DetectionDecodeError>,
        frame: FrameSize,
    ) -> bool {
        let mut st = self.shared.inner.lock().await;
        if st.state != CameraState::Tracking {
            return false;
        }
        st.counters.detections_received += 1;

        let detection = match decoded {
            Ok(d) => d,
            Err(e) => {
                st.counters.detections_filtered += 1;
                tracing::debug!(camera_id = %self.shared.id, error = %e, "Detection filtered");
                return false;
            }
        };

        if detection.confidence < self.shared.config.tracking.min_confidence {
            st.counters.detections_filtered += 1;
            return false;
        }

        if frame.width > 0 && frame.height > 0 {
            st.frame = frame;
        }
        st.counters.detections_processed += 1;
        // receive time, not the detector's frame clock
        let received_at = now_secs();
        st.last_detection_at = Some(received_at);

        if st.tracker.add_detection_at(detection.clone(), received_at) {
            st.counters.detections_confirmed += 1;
            tracing::info!(
                camera_id = %self.shared.id,
                class = %detection.class_name,
                cx = detection.center_x(),
                cy = detection.center_y(),
                confidence = detection.confidence,
                "Target confirmed"
            );
            st.target = Some(detection);
        }
        true
    }

    /// Run one control cycle now
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.shared.run_cycle().await
    }

    /// Move to the recorded home position
    pub async fn return_to_home(&self) -> Result<()> {
        let (link, home) = {
            let st = self.shared.inner.lock().await;
            (st.link(), st.home_position)
        };
        let (session, profile) = link.ok_or_else(|| self.not_connected())?;

        if self.shared.move_home(&session, &profile, home).await {
            Ok(())
        } else {
            Err(Error::Protocol(format!("{}: home move failed", self.shared.id)))
        }
    }

    /// Override home position components
    pub async fn set_home_position(
        &self,
        pan: Option<f64>,
        tilt: Option<f64>,
        zoom: Option<f64>,
    ) -> Position {
        let mut st = self.shared.inner.lock().await;
        if let Some(p) = pan {
            st.home_position.pan = p;
        }
        if let Some(t) = tilt {
            st.home_position.tilt = t;
        }
        if let Some(z) = zoom {
            st.home_position.zoom = z;
        }
        tracing::info!(
            camera_id = %self.shared.id,
            pan = st.home_position.pan,
            tilt = st.home_position.tilt,
            zoom = st.home_position.zoom,
            "Home position set"
        );
        st.home_position
    }

    /// Update the field of view and persist the FOV calibration
    pub async fn calibrate_field_of_view(&self, horizontal: f64, vertical: f64) -> Result<()> {
        if !(horizontal > 0.0 && horizontal <= 360.0 && vertical > 0.0 && vertical <= 360.0) {
            return Err(Error::Validation(format!(
                "field of view out of range: {}x{}",
                horizontal, vertical
            )));
        }

        let calibration = {
            let mut st = self.shared.inner.lock().await;
            st.fov.set_field_of_view(horizontal, vertical);
            Calibration::Fov(st.fov.calibration().clone())
        };
        tracing::info!(
            camera_id = %self.shared.id,
            horizontal = horizontal,
            vertical = vertical,
            "Field of view calibrated"
        );
        self.shared.persist(&calibration).await
    }

    /// Replace the working area and persist the area calibration
    pub async fn set_working_area(&self, area: WorkingArea) -> Result<()> {
        let calibration = {
            let mut st = self.shared.inner.lock().await;
            if !st.area.set_working_area(area) {
                return Err(Error::Validation(
                    "working area corners must be finite".to_string(),
                ));
            }
            Calibration::Area(st.area.calibration().clone())
        };
        tracing::info!(camera_id = %self.shared.id, "Working area set");
        self.shared.persist(&calibration).await
    }

    pub async fn stats(&self) -> CameraStats {
        let st = self.shared.inner.lock().await;
        self.shared.stats_locked(&st)
    }

    pub async fn health_probe(&self) -> HealthProbe {
        let st = self.shared.inner.lock().await;
        HealthProbe {
            state: st.state,
            connected_at: st.connected_at,
            last_detection_at: st.last_detection_at,
            connection_attempts: st.counters.connection_attempts,
        }
    }

    /// Stats plus expected vs. device-reported position
    pub async fn detailed_status(&self) -> DetailedStatus {
        let link = self.shared.inner.lock().await.link();

        let (actual_position, actual_position_error) = match &link {
            Some((session, profile)) => {
                match self.shared.transport.get_status(session, profile).await {
                    Ok(p) => (p, None),
                    Err(e) => (None, Some(e.to_string())),
                }
            }
            None => (None, None),
        };

        let st = self.shared.inner.lock().await;
        let strategy = self.shared.config.tracking.strategy;
        DetailedStatus {
            camera_id: self.shared.id.clone(),
            endpoint: self.shared.config.endpoint(),
            profile_token: st.profile.clone(),
            strategy,
            target: st.target.clone(),
            expected_position: st.current_position,
            actual_position,
            actual_position_error,
            tracking: self.shared.config.tracking.clone(),
            calibration: st.calibration(strategy),
            stats: self.shared.stats_locked(&st),
        }
    }

    /// Stop tracking and drop the device session
    pub async fn disconnect(&self) {
        self.stop_tracking().await;
        self.reap_task().await;

        let mut st = self.shared.inner.lock().await;
        let was = st.state;
        st.state = CameraState::Disconnected;
        st.session = None;
        st.profile = None;
        st.connected_at = None;
        st.target = None;
        if was != CameraState::Disconnected {
            tracing::info!(camera_id = %self.shared.id, "PTZ camera disconnected");
        }
    }

    fn not_connected(&self) -> Error {
        Error::Conflict(format!("camera {} is not connected", self.shared.id))
    }
}

impl<T: PtzTransport> Shared<T> {
    /// Steps 1-5 of the connect sequence
    async fn establish(&self) -> std::result::Result<(), TransportError> {
        let endpoint = self.config.endpoint();

        self.transport
            .check_reachable(&endpoint, REACHABILITY_TIMEOUT)
            .await?;
        let session = self.transport.connect(&endpoint).await?;
        let profile = self.transport.get_media_profile(&session).await?;

        let current = match self.transport.get_status(&session, &profile).await {
            Ok(Some(p)) => p,
            Ok(None) => Position::default(),
            Err(e) => {
                tracing::warn!(camera_id = %self.id, error = %e, "Status read failed, assuming default position");
                Position::default()
            }
        };

        self.verify_movement(&session, &profile, &current).await?;

        let loaded = match &self.store {
            Some(store) => Some(match self.config.tracking.strategy {
                TrackingStrategy::Absolute => Calibration::Fov(store.load_fov(&self.id).await),
                TrackingStrategy::Area => Calibration::Area(store.load_area(&self.id).await),
            }),
            None => None,
        };

        let mut st = self.inner.lock().await;
        st.session = Some(session);
        st.profile = Some(profile);
        st.current_position = current;
        st.home_position = current;
        match loaded {
            Some(Calibration::Fov(cal)) => st.fov = FovConverter::new(cal),
            Some(Calibration::Area(cal)) => st.area = AreaConverter::new(cal),
            None => {}
        }
        Ok(())
    }

    /// Small pan nudge and back, proving write access
    async fn verify_movement(
        &self,
        session: &T::Session,
        profile: &str,
        current: &Position,
    ) -> std::result::Result<(), TransportError> {
        let nudge = if current.pan + VERIFY_NUDGE > 1.0 {
            -VERIFY_NUDGE
        } else {
            VERIFY_NUDGE
        };
        let probe = Position::new(current.pan + nudge, current.tilt, current.zoom);
        let speed = PtzSpeed::uniform(VERIFY_SPEED);

        self.transport
            .absolute_move(session, profile, &probe, speed)
            .await?;
        tokio::time::sleep(VERIFY_SETTLE).await;
        self.transport
            .absolute_move(session, profile, current, speed)
            .await?;
        tokio::time::sleep(VERIFY_RETURN_SETTLE).await;

        tracing::debug!(camera_id = %self.id, "Verification move succeeded");
        Ok(())
    }

    async fn move_home(&self, session: &T::Session, profile: &str, home: Position) -> bool {
        let limits = self.inner.lock().await.fov.calibration().limits;
        let speed = limited_speed(HOME_SPEED, &limits);

        match self
            .transport
            .absolute_move(session, profile, &home, speed)
            .await
        {
            Ok(()) => {
                self.inner.lock().await.current_position = home;
                tracing::info!(camera_id = %self.id, "Returned to home position");
                true
            }
            Err(e) => {
                let mut st = self.inner.lock().await;
                st.record_transport_error(&e);
                tracing::warn!(camera_id = %self.id, error = %e, "Home move failed");
                false
            }
        }
    }

    async fn persist(&self, calibration: &Calibration) -> Result<()> {
        match &self.store {
            Some(store) => store.save(&self.id, calibration).await,
            None => Ok(()),
        }
    }

    async fn run_cycle(&self) -> CycleOutcome {
        let tracking = &self.config.tracking;

        let (link, reconcile_due) = {
            let mut st = self.inner.lock().await;
            if st.state != CameraState::Tracking {
                return CycleOutcome::Inactive;
            }

            if st.target.is_some() && st.tracker.is_target_lost(tracking.target_lost_timeout) {
                st.target = None;
                st.tracker.clear_target();
                tracing::info!(camera_id = %self.id, "Target lost");
                if !st.area_moving {
                    return CycleOutcome::TargetLost;
                }
            }

            let due = match tracking.position_sync {
                PositionSync::Optimistic => false,
                PositionSync::Reconcile { interval } => st
                    .last_reconcile_at
                    .map_or(true, |at| at.elapsed().as_secs_f64() >= interval),
            };
            (st.link(), due)
        };

        let Some((session, profile)) = link else {
            return CycleOutcome::Inactive;
        };

        if reconcile_due {
            match self.transport.get_status(&session, &profile).await {
                Ok(reported) => {
                    let mut st = self.inner.lock().await;
                    st.last_reconcile_at = Some(Instant::now());
                    if let Some(p) = reported {
                        st.current_position = p;
                    }
                }
                Err(e) => return self.fault(e).await,
            }
        }

        match tracking.strategy {
            TrackingStrategy::Absolute => self.absolute_cycle(&session, &profile).await,
            TrackingStrategy::Area => self.area_cycle(&session, &profile).await,
        }
    }

    async fn absolute_cycle(&self, session: &T::Session, profile: &str) -> CycleOutcome {
        let tracking = &self.config.tracking;
        let now = Instant::now();

        let (target, speed) = {
            let mut st = self.inner.lock().await;
            if st.target.is_none() {
                return CycleOutcome::NoTarget;
            }

            if let Some(at) = st.last_move_at {
                if now.duration_since(at).as_secs_f64() < tracking.movement_cooldown {
                    return CycleOutcome::Cooldown;
                }
            }

            let aim = if tracking.movement_prediction {
                st.tracker.predicted_position()
            } else {
                st.target.clone()
            };
            let Some(aim) = aim else {
                return CycleOutcome::NoTarget;
            };

            let (fx, fy) = st.frame.center();
            let distance = ((aim.center_x() - fx).powi(2) + (aim.center_y() - fy).powi(2)).sqrt();
            if distance < tracking.position_tolerance {
                tracing::debug!(camera_id = %self.id, distance = distance, "Target centred");
                return CycleOutcome::Centered;
            }
            if distance < tracking.min_movement_threshold {
                st.counters.movements_skipped += 1;
                return CycleOutcome::Skipped;
            }

            let current = st.current_position;
            let frame = st.frame;
            let mut target = st.fov.pixel_to_ptz(&aim, frame, &current);
            if !tracking.auto_zoom {
                target.zoom = current.zoom;
            }

            let max_delta = (target.pan - current.pan)
                .abs()
                .max((target.tilt - current.tilt).abs());
            let speed = limited_speed(tracking.speed_for(max_delta), &st.fov.calibration().limits);

            tracing::info!(
                camera_id = %self.id,
                from_pan = current.pan,
                from_tilt = current.tilt,
                to_pan = target.pan,
                to_tilt = target.tilt,
                speed = speed.pan,
                distance = distance,
                "Moving toward target"
            );
            (target, speed)
        };

        match self
            .transport
            .absolute_move(session, profile, &target, speed)
            .await
        {
            Ok(()) => {
                let mut st = self.inner.lock().await;
                st.current_position = target;
                st.last_move_at = Some(now);
                st.counters.movements_executed += 1;
                CycleOutcome::Moved
            }
            Err(e) => self.fault(e).await,
        }
    }

    async fn area_cycle(&self, session: &T::Session, profile: &str) -> CycleOutcome {
        let (movement, was_moving) = {
            let mut st = self.inner.lock().await;
            let was_moving = st.area_moving;

            let movement = match st.target.clone() {
                Some(target) => {
                    // scale the centroid into the calibrated frame
                    let cal_frame = st.area.frame_size();
                    let (cx, cy) = target.center();
                    let sx = cal_frame.width as f64 / st.frame.width.max(1) as f64;
                    let sy = cal_frame.height as f64 / st.frame.height.max(1) as f64;
                    st.area.tracking_movement(cx * sx, cy * sy)
                }
                None => TrackingMovement::IDLE,
            };

            if movement.is_idle() && !was_moving {
                return if st.target.is_some() {
                    CycleOutcome::Holding
                } else {
                    CycleOutcome::NoTarget
                };
            }
            if movement.zoom_target.is_some() {
                st.last_zoom_target = movement.zoom_target;
            }
            (movement, was_moving)
        };

        if movement.is_idle() {
            return match self.transport.stop(session, profile).await {
                Ok(()) => {
                    let mut st = self.inner.lock().await;
                    st.area_moving = false;
                    CycleOutcome::Stopped
                }
                Err(e) => self.fault(e).await,
            };
        }

        let velocity = PtzVelocity {
            pan: movement.pan_speed,
            tilt: movement.tilt_speed,
            zoom: 0.0,
        };
        match self
            .transport
            .continuous_move(session, profile, velocity)
            .await
        {
            Ok(()) => {
                let mut st = self.inner.lock().await;
                st.area_moving = true;
                if !was_moving {
                    st.counters.movements_executed += 1;
                }
                CycleOutcome::Moved
            }
            Err(e) => self.fault(e).await,
        }
    }

    /// Record a transport failure inside the cycle
    async fn fault(&self, e: TransportError) -> CycleOutcome {
        let mut st = self.inner.lock().await;
        st.counters.faults += 1;
        st.counters.movements_failed += 1;
        st.cycle_faults += 1;
        st.record_transport_error(&e);

        let max = self.config.tracking.max_faults;
        if st.cycle_faults > max {
            st.state = CameraState::Faulted;
            let message = format!("{} faults this session, last: {}", st.cycle_faults, e);
            st.record_error(ErrorKind::Fault, message);
            tracing::error!(
                camera_id = %self.id,
                faults = st.cycle_faults,
                "Too many faults, control cycle halted"
            );
            return CycleOutcome::Halted;
        }

        tracing::warn!(
            camera_id = %self.id,
            error = %e,
            faults = st.cycle_faults,
            "PTZ command failed"
        );
        CycleOutcome::Failed
    }

    async fn log_heartbeat(&self) {
        let st = self.inner.lock().await;
        tracing::info!(
            camera_id = %self.id,
            uptime_sec = now_secs() - st.session_started_at,
            detections = st.counters.detections_received,
            confirmed = st.counters.detections_confirmed,
            moves = st.counters.movements_executed,
            faults = st.cycle_faults,
            "Tracking heartbeat"
        );
    }

    fn stats_locked(&self, st: &ControllerState<T::Session>) -> CameraStats {
        let c = &st.counters;
        let uptime = (now_secs() - st.session_started_at).max(0.0);
        let per_sec = uptime.max(1.0);
        let received = c.detections_received.max(1) as f64;

        CameraStats {
            camera_id: self.id.clone(),
            name: self.config.display_name().to_string(),
            ip: self.config.ip.clone(),
            state: st.state,
            is_connected: st.state.is_connected(),
            is_tracking: st.state == CameraState::Tracking,
            has_target: st.target.is_some(),
            counters: c.clone(),
            uptime_seconds: uptime,
            detection_rate: c.detections_received as f64 / per_sec,
            confirmation_rate: c.detections_confirmed as f64 / received * 100.0,
            movement_rate: c.movements_executed as f64 / per_sec,
            processing_ratio: c.detections_processed as f64 / received,
            filtering_ratio: c.detections_filtered as f64 / received,
            current_position: st.current_position,
            home_position: st.home_position,
            frame_size: st.frame,
            zoom_target: st.last_zoom_target,
            connected_at: st.connected_at,
            last_detection_at: st.last_detection_at,
            last_error: st.last_error.clone(),
            movement_statistics: st.fov.movement_statistics(),
            tracker: st.tracker.snapshot(),
        }
    }
}

/// Apply calibration speed ceilings; zoom runs at half speed
fn limited_speed(speed: f64, limits: &SpeedLimits) -> PtzSpeed {
    PtzSpeed {
        pan: speed.min(limits.max_pan_speed),
        tilt: speed.min(limits.max_tilt_speed),
        zoom: (speed * 0.5).min(limits.max_zoom_speed),
    }
}

async fn control_loop<T: PtzTransport>(shared: Arc<Shared<T>>, mut shutdown: watch::Receiver<bool>) {
    let tracking = &shared.config.tracking;
    let mut ticker = tokio::time::interval(Duration::from_millis(tracking.control_interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let heartbeat_period = Duration::from_secs_f64(tracking.heartbeat_interval.max(1.0));
    let mut heartbeat = tokio::time::interval_at(Instant::now() + heartbeat_period, heartbeat_period);

    tracing::debug!(camera_id = %shared.id, "Control loop running");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = heartbeat.tick() => shared.log_heartbeat().await,
            _ = ticker.tick() => {
                match shared.run_cycle().await {
                    CycleOutcome::Halted | CycleOutcome::Inactive => break,
                    _ => {}
                }
            }
        }
    }

    tracing::debug!(camera_id = %shared.id, "Control loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limited_speed() {
        let limits = SpeedLimits::default();
        let s = limited_speed(0.8, &limits);
        assert_eq!(s.pan, 0.8);
        assert_eq!(s.tilt, 0.8);
        assert_eq!(s.zoom, 0.4);

        let tight = SpeedLimits {
            max_pan_speed: 0.5,
            max_tilt_speed: 0.3,
            max_zoom_speed: 0.1,
        };
        let s = limited_speed(0.8, &tight);
        assert_eq!((s.pan, s.tilt, s.zoom), (0.5, 0.3, 0.1));
    }
}
