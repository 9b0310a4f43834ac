//! PTZ device transport
//!
//! The control loop only talks to devices through [`PtzTransport`]. The
//! production implementation is [`OnvifTransport`] (SOAP over HTTP with
//! WS-Security); tests plug in an in-memory mock.

mod onvif;
pub mod xml;

pub use onvif::{OnvifSession, OnvifTransport};

use crate::models::Position;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;

/// Transport failure classes
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// Unreachable, refused, or timed out (retryable)
    #[error("connectivity: {0}")]
    Connectivity(String),

    /// Credentials rejected
    #[error("authorization: {0}")]
    Authorization(String),

    /// Unexpected or malformed device response
    #[error("protocol: {0}")]
    Protocol(String),
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Network address and credentials of one device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraEndpoint {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
}

impl CameraEndpoint {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// ONVIF device service URL
    pub fn device_service_url(&self) -> String {
        format!("http://{}:{}/onvif/device_service", self.host, self.port)
    }
}

/// Per-axis speed for absolute moves, in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PtzSpeed {
    pub pan: f64,
    pub tilt: f64,
    pub zoom: f64,
}

impl PtzSpeed {
    pub fn uniform(speed: f64) -> Self {
        Self {
            pan: speed,
            tilt: speed,
            zoom: speed,
        }
    }
}

/// Signed velocity for continuous moves, in `[-1, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PtzVelocity {
    pub pan: f64,
    pub tilt: f64,
    pub zoom: f64,
}

/// Device control contract
///
/// Implementations must be cheap to share across camera tasks; sessions are
/// cloned into each call site.
pub trait PtzTransport: Send + Sync + 'static {
    type Session: Clone + Send + Sync + 'static;

    /// TCP handshake with the device within `timeout`
    fn check_reachable(
        &self,
        endpoint: &CameraEndpoint,
        timeout: Duration,
    ) -> impl Future<Output = TransportResult<()>> + Send {
        let addr = endpoint.socket_addr();
        async move {
            match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(TransportError::Connectivity(format!("{}: {}", addr, e))),
                Err(_) => Err(TransportError::Connectivity(format!(
                    "{}: timed out after {:?}",
                    addr, timeout
                ))),
            }
        }
    }

    fn connect(
        &self,
        endpoint: &CameraEndpoint,
    ) -> impl Future<Output = TransportResult<Self::Session>> + Send;

    /// Token of the media profile used for PTZ commands
    fn get_media_profile(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = TransportResult<String>> + Send;

    /// Current position; `None` when the device does not report one
    fn get_status(
        &self,
        session: &Self::Session,
        profile: &str,
    ) -> impl Future<Output = TransportResult<Option<Position>>> + Send;

    fn absolute_move(
        &self,
        session: &Self::Session,
        profile: &str,
        target: &Position,
        speed: PtzSpeed,
    ) -> impl Future<Output = TransportResult<()>> + Send;

    fn continuous_move(
        &self,
        session: &Self::Session,
        profile: &str,
        velocity: PtzVelocity,
    ) -> impl Future<Output = TransportResult<()>> + Send;

    fn stop(
        &self,
        session: &Self::Session,
        profile: &str,
    ) -> impl Future<Output = TransportResult<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        let ep = CameraEndpoint {
            host: "192.168.1.64".to_string(),
            port: 8080,
            username: "admin".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(ep.socket_addr(), "192.168.1.64:8080");
        assert_eq!(
            ep.device_service_url(),
            "http://192.168.1.64:8080/onvif/device_service"
        );
        assert!(!serde_json::to_string(&ep).unwrap().contains("secret"));
    }
}
