//! Health classification
//!
//! Pure functions over controller probes; the manager's sweep feeds them.

use super::types::{CameraHealth, HealthReport, HealthStatus, ManagerConfig, OverallStatus};
use crate::camera_controller::HealthProbe;
use std::collections::BTreeMap;

pub fn classify_camera(probe: &HealthProbe, now: f64, config: &ManagerConfig) -> CameraHealth {
    let mut health = CameraHealth {
        status: HealthStatus::Healthy,
        issues: Vec::new(),
    };

    if !probe.state.is_connected() {
        health.status = HealthStatus::Disconnected;
        health.issues.push("Camera not connected".to_string());
    } else {
        // a fresh connection gets the full window before counting as idle
        let since = match (probe.last_detection_at, probe.connected_at) {
            (Some(d), Some(c)) => Some(d.max(c)),
            (d, c) => d.or(c),
        };
        if let Some(since) = since {
            let idle = now - since;
            if idle > config.inactivity_timeout {
                health.status = HealthStatus::Inactive;
                health
                    .issues
                    .push(format!("No detections for {:.1} minutes", idle / 60.0));
            }
        }
    }

    if probe.connection_attempts > config.max_connection_attempts {
        health.issues.push(format!(
            "Multiple connection attempts: {}",
            probe.connection_attempts
        ));
    }

    health
}

pub fn build_report(cameras: BTreeMap<String, CameraHealth>, now: f64) -> HealthReport {
    let mut issues = Vec::new();
    for (id, health) in &cameras {
        if health.status != HealthStatus::Healthy {
            issues.extend(health.issues.iter().map(|i| format!("{}: {}", id, i)));
        }
    }

    let unhealthy = cameras
        .values()
        .filter(|h| h.status != HealthStatus::Healthy)
        .count();
    let inactive = cameras
        .values()
        .filter(|h| h.status == HealthStatus::Inactive)
        .count();

    let overall_status = if unhealthy == 0 {
        OverallStatus::Healthy
    } else if (unhealthy as f64) < cameras.len() as f64 / 2.0 {
        OverallStatus::Degraded
    } else {
        OverallStatus::Critical
    };

    let mut recommendations = Vec::new();
    if unhealthy > 0 {
        recommendations.push("Check camera connectivity and credentials".to_string());
    }
    if inactive > 0 {
        recommendations.push("Verify detection system is sending data to PTZ".to_string());
    }

    HealthReport {
        overall_status,
        issues,
        cameras_status: cameras,
        recommendations,
        checked_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera_controller::CameraState;

    fn probe(state: CameraState, connected_at: Option<f64>, last: Option<f64>) -> HealthProbe {
        HealthProbe {
            state,
            connected_at,
            last_detection_at: last,
            connection_attempts: 1,
        }
    }

    fn healthy() -> CameraHealth {
        CameraHealth {
            status: HealthStatus::Healthy,
            issues: vec![],
        }
    }

    fn disconnected() -> CameraHealth {
        CameraHealth {
            status: HealthStatus::Disconnected,
            issues: vec!["Camera not connected".to_string()],
        }
    }

    #[test]
    fn test_disconnected_camera() {
        let h = classify_camera(
            &probe(CameraState::Faulted, None, None),
            1000.0,
            &ManagerConfig::default(),
        );
        assert_eq!(h.status, HealthStatus::Disconnected);
    }

    #[test]
    fn test_inactive_uses_later_of_detection_and_connect() {
        let cfg = ManagerConfig::default();

        // connected 10 min ago, no detections
        let h = classify_camera(&probe(CameraState::Idle, Some(400.0), None), 1000.0, &cfg);
        assert_eq!(h.status, HealthStatus::Inactive);
        assert_eq!(h.issues, vec!["No detections for 10.0 minutes".to_string()]);

        // old detection, but reconnected 1 min ago
        let h = classify_camera(
            &probe(CameraState::Tracking, Some(940.0), Some(100.0)),
            1000.0,
            &cfg,
        );
        assert_eq!(h.status, HealthStatus::Healthy);
    }

    #[test]
    fn test_connection_attempts_issue_keeps_status() {
        let mut p = probe(CameraState::Idle, Some(990.0), None);
        p.connection_attempts = 4;
        let h = classify_camera(&p, 1000.0, &ManagerConfig::default());

        assert_eq!(h.status, HealthStatus::Healthy);
        assert_eq!(h.issues.len(), 1);
    }

    #[test]
    fn test_overall_status_thresholds() {
        let all_ok: BTreeMap<_, _> = [("a".to_string(), healthy()), ("b".to_string(), healthy())].into();
        assert_eq!(build_report(all_ok, 0.0).overall_status, OverallStatus::Healthy);

        let one_of_three: BTreeMap<_, _> = [
            ("a".to_string(), healthy()),
            ("b".to_string(), healthy()),
            ("c".to_string(), disconnected()),
        ]
        .into();
        let report = build_report(one_of_three, 0.0);
        assert_eq!(report.overall_status, OverallStatus::Degraded);
        assert_eq!(report.issues, vec!["c: Camera not connected".to_string()]);
        assert_eq!(report.recommendations.len(), 1);

        let half: BTreeMap<_, _> = [("a".to_string(), healthy()), ("b".to_string(), disconnected())].into();
        assert_eq!(build_report(half, 0.0).overall_status, OverallStatus::Critical);
    }

    #[test]
    fn test_empty_fleet_is_healthy() {
        let report = build_report(BTreeMap::new(), 0.0);
        assert_eq!(report.overall_status, OverallStatus::Healthy);
        assert!(report.recommendations.is_empty());
    }
}
