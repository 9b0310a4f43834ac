//! ONVIF PTZ transport
//!
//! SOAP 1.2 over HTTP with a WS-Security UsernameToken digest on every
//! request. Service addresses come from GetCapabilities; devices that do not
//! advertise them fall back to the conventional `/onvif/*_service` paths.

use super::{xml, CameraEndpoint, PtzSpeed, PtzTransport, PtzVelocity, TransportError, TransportResult};
use crate::models::Position;
use base64::Engine;
use reqwest::{Client, StatusCode};
use sha1::{Digest, Sha1};
use std::time::Duration;

/// Per-request HTTP timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Authenticated handle to one device
#[derive(Clone)]
pub struct OnvifSession {
    device_url: String,
    media_url: String,
    ptz_url: String,
    username: String,
    password: String,
    client: Client,
}

impl std::fmt::Debug for OnvifSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnvifSession")
            .field("device_url", &self.device_url)
            .field("ptz_url", &self.ptz_url)
            .field("username", &self.username)
            .finish()
    }
}

impl OnvifSession {
    fn new(endpoint: &CameraEndpoint, client: Client) -> Self {
        let device_url = endpoint.device_service_url();
        Self {
            media_url: sibling_service_url(&device_url, "media_service"),
            ptz_url: sibling_service_url(&device_url, "ptz_service"),
            device_url,
            username: endpoint.username.clone(),
            password: endpoint.password.clone(),
            client,
        }
    }

    /// WS-Security UsernameToken header
    ///
    /// Digest = Base64(SHA1(nonce + created + password))
    fn security_header(&self) -> String {
        let nonce: [u8; 16] = rand::random();
        let nonce_b64 = base64::engine::general_purpose::STANDARD.encode(nonce);
        let created = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

        let mut hasher = Sha1::new();
        hasher.update(nonce);
        hasher.update(created.as_bytes());
        hasher.update(self.password.as_bytes());
        let digest_b64 = base64::engine::general_purpose::STANDARD.encode(hasher.finalize());

        format!(
            r#"<s:Header>
    <Security xmlns="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd" s:mustUnderstand="true">
      <UsernameToken>
        <Username>{}</Username>
        <Password Type="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest">{}</Password>
        <Nonce EncodingType="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary">{}</Nonce>
        <Created xmlns="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">{}</Created>
      </UsernameToken>
    </Security>
  </s:Header>"#,
            xml::escape(&self.username),
            digest_b64,
            nonce_b64,
            created
        )
    }

    fn envelope(&self, body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"
            xmlns:tds="http://www.onvif.org/ver10/device/wsdl"
            xmlns:trt="http://www.onvif.org/ver10/media/wsdl"
            xmlns:tptz="http://www.onvif.org/ver20/ptz/wsdl"
            xmlns:tt="http://www.onvif.org/ver10/schema">
  {}
  <s:Body>
    {}
  </s:Body>
</s:Envelope>"#,
            self.security_header(),
            body
        )
    }

    /// POST one SOAP action and return the response body
    async fn call(&self, url: &str, action: &str, body: &str) -> TransportResult<String> {
        tracing::debug!(url = %url, action = %action, "Sending ONVIF request");

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/soap+xml; charset=utf-8")
            .body(self.envelope(body))
            .send()
            .await
            .map_err(|e| TransportError::Connectivity(format!("{} request failed: {}", action, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Connectivity(format!("{} read failed: {}", action, e)))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TransportError::Authorization(format!(
                "{} rejected with status {}",
                action, status
            )));
        }

        if let Some(reason) = xml::soap_fault(&text) {
            if xml::is_auth_fault(&text) {
                return Err(TransportError::Authorization(format!("{}: {}", action, reason)));
            }
            return Err(TransportError::Protocol(format!("{} fault: {}", action, reason)));
        }

        if !status.is_success() {
            tracing::warn!(status = %status, action = %action, "ONVIF request failed");
            return Err(TransportError::Protocol(format!(
                "{} failed with status {}",
                action, status
            )));
        }

        Ok(text)
    }
}

/// Replace the last path segment of a service URL
fn sibling_service_url(device_url: &str, service: &str) -> String {
    if device_url.contains("/onvif/device_service") {
        return device_url.replace("/onvif/device_service", &format!("/onvif/{}", service));
    }
    let base = device_url.trim_end_matches('/');
    match base.rfind('/') {
        Some(pos) if pos > "http://".len() => format!("{}/{}", &base[..pos], service),
        _ => format!("{}/onvif/{}", base, service),
    }
}

/// Production transport
#[derive(Clone)]
pub struct OnvifTransport {
    client: Client,
}

impl OnvifTransport {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for OnvifTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl PtzTransport for OnvifTransport {
    type Session = OnvifSession;

    async fn connect(&self, endpoint: &CameraEndpoint) -> TransportResult<OnvifSession> {
        let mut session = OnvifSession::new(endpoint, self.client.clone());

        // authenticated call: validates credentials and discovers service URLs
        let caps = session
            .call(
                &session.device_url,
                "GetCapabilities",
                "<tds:GetCapabilities><tds:Category>All</tds:Category></tds:GetCapabilities>",
            )
            .await?;

        if let Some(url) = xml::capability_xaddr(&caps, "Media") {
            session.media_url = url;
        }
        if let Some(url) = xml::capability_xaddr(&caps, "PTZ") {
            session.ptz_url = url;
        }

        tracing::info!(
            host = %endpoint.host,
            ptz_url = %session.ptz_url,
            "ONVIF session established"
        );
        Ok(session)
    }

    async fn get_media_profile(&self, session: &OnvifSession) -> TransportResult<String> {
        let body = session
            .call(&session.media_url, "GetProfiles", "<trt:GetProfiles/>")
            .await?;

        xml::first_profile_token(&body)
            .ok_or_else(|| TransportError::Protocol("GetProfiles returned no profile".to_string()))
    }

    async fn get_status(
        &self,
        session: &OnvifSession,
        profile: &str,
    ) -> TransportResult<Option<Position>> {
        let body = format!(
            "<tptz:GetStatus><tptz:ProfileToken>{}</tptz:ProfileToken></tptz:GetStatus>",
            profile
        );
        let text = session.call(&session.ptz_url, "GetStatus", &body).await?;
        Ok(xml::parse_ptz_status(&text))
    }

    async fn absolute_move(
        &self,
        session: &OnvifSession,
        profile: &str,
        target: &Position,
        speed: PtzSpeed,
    ) -> TransportResult<()> {
        let body = format!(
            r#"<tptz:AbsoluteMove>
      <tptz:ProfileToken>{}</tptz:ProfileToken>
      <tptz:Position>
        <tt:PanTilt x="{:.4}" y="{:.4}"/>
        <tt:Zoom x="{:.4}"/>
      </tptz:Position>
      <tptz:Speed>
        <tt:PanTilt x="{:.2}" y="{:.2}"/>
        <tt:Zoom x="{:.2}"/>
      </tptz:Speed>
    </tptz:AbsoluteMove>"#,
            profile, target.pan, target.tilt, target.zoom, speed.pan, speed.tilt, speed.zoom
        );
        session.call(&session.ptz_url, "AbsoluteMove", &body).await?;
        Ok(())
    }

    async fn continuous_move(
        &self,
        session: &OnvifSession,
        profile: &str,
        velocity: PtzVelocity,
    ) -> TransportResult<()> {
        let body = format!(
            r#"<tptz:ContinuousMove>
      <tptz:ProfileToken>{}</tptz:ProfileToken>
      <tptz:Velocity>
        <tt:PanTilt x="{:.2}" y="{:.2}"/>
        <tt:Zoom x="{:.2}"/>
      </tptz:Velocity>
    </tptz:ContinuousMove>"#,
            profile, velocity.pan, velocity.tilt, velocity.zoom
        );
        session.call(&session.ptz_url, "ContinuousMove", &body).await?;
        Ok(())
    }

    async fn stop(&self, session: &OnvifSession, profile: &str) -> TransportResult<()> {
        let body = format!(
            r#"<tptz:Stop>
      <tptz:ProfileToken>{}</tptz:ProfileToken>
      <tptz:PanTilt>true</tptz:PanTilt>
      <tptz:Zoom>true</tptz:Zoom>
    </tptz:Stop>"#,
            profile
        );
        session.call(&session.ptz_url, "Stop", &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> CameraEndpoint {
        CameraEndpoint {
            host: "192.168.1.100".to_string(),
            port: 2020,
            username: "admin".to_string(),
            password: "testpass".to_string(),
        }
    }

    #[test]
    fn test_default_service_urls() {
        let session = OnvifSession::new(&endpoint(), Client::new());
        assert_eq!(session.ptz_url, "http://192.168.1.100:2020/onvif/ptz_service");
        assert_eq!(session.media_url, "http://192.168.1.100:2020/onvif/media_service");
    }

    #[test]
    fn test_sibling_service_url_fallback() {
        assert_eq!(
            sibling_service_url("http://10.0.0.5/cgi/device", "ptz_service"),
            "http://10.0.0.5/cgi/ptz_service"
        );
        assert_eq!(
            sibling_service_url("http://10.0.0.5", "ptz_service"),
            "http://10.0.0.5/onvif/ptz_service"
        );
    }

    #[test]
    fn test_security_header_generation() {
        let session = OnvifSession::new(&endpoint(), Client::new());
        let header = session.security_header();
        assert!(header.contains("<Username>admin</Username>"));
        assert!(header.contains("PasswordDigest"));
        assert!(header.contains("<Created"));
        assert!(!header.contains("testpass"));
    }

    #[test]
    fn test_security_header_escapes_username() {
        let mut ep = endpoint();
        ep.username = "a&b<c>".to_string();
        let session = OnvifSession::new(&ep, Client::new());
        let header = session.security_header();
        assert!(header.contains("<Username>a&amp;b&lt;c&gt;</Username>"));
    }

    #[test]
    fn test_session_debug_hides_password() {
        let session = OnvifSession::new(&endpoint(), Client::new());
        assert!(!format!("{:?}", session).contains("testpass"));
    }
}
