//! Shared fixtures for integration tests

#![allow(dead_code)]

use ptz_tracker::camera_controller::{CameraConfig, TrackingConfig};
use ptz_tracker::models::{now_secs, Position};
use ptz_tracker::ptz_transport::{
    CameraEndpoint, PtzSpeed, PtzTransport, PtzVelocity, TransportError, TransportResult,
};
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;

/// Device command as seen by the mock
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Reach(String),
    Connect(String),
    Profile,
    Status,
    Absolute(Position, PtzSpeed),
    Continuous(PtzVelocity),
    Stop,
}

#[derive(Default)]
struct Faults {
    unreachable: bool,
    connect: Option<TransportError>,
    moves: Option<TransportError>,
    status: Option<TransportError>,
}

/// In-memory transport recording every command
pub struct MockTransport {
    calls: Mutex<Vec<Call>>,
    faults: Mutex<Faults>,
    reported: Mutex<Option<Position>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            faults: Mutex::new(Faults::default()),
            reported: Mutex::new(Some(Position::new(0.1, -0.2, 0.3))),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn absolute_moves(&self) -> Vec<(Position, PtzSpeed)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Absolute(p, s) => Some((p, s)),
                _ => None,
            })
            .collect()
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.faults.lock().unwrap().unreachable = unreachable;
    }

    pub fn fail_connect(&self, error: Option<TransportError>) {
        self.faults.lock().unwrap().connect = error;
    }

    pub fn fail_moves(&self, error: Option<TransportError>) {
        self.faults.lock().unwrap().moves = error;
    }

    pub fn fail_status(&self, error: Option<TransportError>) {
        self.faults.lock().unwrap().status = error;
    }

    pub fn set_reported(&self, position: Option<Position>) {
        *self.reported.lock().unwrap() = position;
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn move_result(&self) -> TransportResult<()> {
        match &self.faults.lock().unwrap().moves {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

impl PtzTransport for MockTransport {
    type Session = u32;

    async fn check_reachable(
        &self,
        endpoint: &CameraEndpoint,
        _timeout: Duration,
    ) -> TransportResult<()> {
        self.record(Call::Reach(endpoint.host.clone()));
        if self.faults.lock().unwrap().unreachable {
            return Err(TransportError::Connectivity(format!(
                "{}: connection refused",
                endpoint.socket_addr()
            )));
        }
        Ok(())
    }

    async fn connect(&self, endpoint: &CameraEndpoint) -> TransportResult<u32> {
        self.record(Call::Connect(endpoint.host.clone()));
        match &self.faults.lock().unwrap().connect {
            Some(e) => Err(e.clone()),
            None => Ok(7),
        }
    }

    async fn get_media_profile(&self, _session: &u32) -> TransportResult<String> {
        self.record(Call::Profile);
        Ok("Profile_1".to_string())
    }

    async fn get_status(&self, _session: &u32, _profile: &str) -> TransportResult<Option<Position>> {
        self.record(Call::Status);
        if let Some(e) = &self.faults.lock().unwrap().status {
            return Err(e.clone());
        }
        Ok(*self.reported.lock().unwrap())
    }

    async fn absolute_move(
        &self,
        _session: &u32,
        _profile: &str,
        target: &Position,
        speed: PtzSpeed,
    ) -> TransportResult<()> {
        self.record(Call::Absolute(*target, speed));
        self.move_result()
    }

    async fn continuous_move(
        &self,
        _session: &u32,
        _profile: &str,
        velocity: PtzVelocity,
    ) -> TransportResult<()> {
        self.record(Call::Continuous(velocity));
        self.move_result()
    }

    async fn stop(&self, _session: &u32, _profile: &str) -> TransportResult<()> {
        self.record(Call::Stop);
        self.move_result()
    }
}

/// Camera config with a control interval long enough that tests drive
/// cycles by hand
pub fn camera(ip: &str) -> CameraConfig {
    let mut config = CameraConfig::new(ip);
    config.password = "secret".to_string();
    config.tracking = TrackingConfig {
        control_interval_ms: 600_000,
        heartbeat_interval: 600.0,
        ..TrackingConfig::default()
    };
    config
}

/// Top-left detection record far from the centre of a 1920x1080 frame
pub fn far_detection(timestamp: f64) -> Value {
    json!({
        "x": 1500.0, "y": 100.0, "width": 100.0, "height": 100.0,
        "confidence": 0.9, "class": "person", "timestamp": timestamp
    })
}

pub fn fresh_far_detection() -> Value {
    far_detection(now_secs())
}

/// Let freshly spawned control tasks run their first tick
pub async fn settle() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}
