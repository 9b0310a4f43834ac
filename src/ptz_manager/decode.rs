//! Detection record decoding
//!
//! Upstream detectors emit boxes in three shapes:
//! - corner box: `{"bbox": [x1, y1, x2, y2]}`
//! - top-left box: `{"x", "y", "width", "height"}`
//! - centre box: `{"cx", "cy", "width", "height"}`
//!
//! plus `confidence` (or `conf`), `class` (name) or `cls` (COCO id) and
//! `track_id` (or `id`).

use crate::models::Detection;
use serde::Deserialize;
use serde_json::Value;

/// COCO class names for the ids detectors commonly emit
const COCO_NAMES: [&str; 12] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic_light",
    "fire_hydrant",
    "stop_sign",
];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DetectionDecodeError {
    #[error("unrecognised detection record: {0}")]
    Malformed(String),

    #[error("invalid box geometry: {0}")]
    InvalidGeometry(String),
}

/// Bounding box in any supported layout
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BoxShape {
    Corners { bbox: Vec<f64> },
    TopLeft { x: f64, y: f64, width: f64, height: f64 },
    Center { cx: f64, cy: f64, width: f64, height: f64 },
}

impl BoxShape {
    /// `(x, y, width, height)` with `x`/`y` the top-left corner
    pub fn to_xywh(&self) -> Result<(f64, f64, f64, f64), DetectionDecodeError> {
        let xywh = match self {
            BoxShape::Corners { bbox } => {
                if bbox.len() < 4 {
                    return Err(DetectionDecodeError::InvalidGeometry(format!(
                        "bbox needs 4 values, got {}",
                        bbox.len()
                    )));
                }
                (bbox[0], bbox[1], bbox[2] - bbox[0], bbox[3] - bbox[1])
            }
            BoxShape::TopLeft {
                x,
                y,
                width,
                height,
            } => (*x, *y, *width, *height),
            BoxShape::Center {
                cx,
                cy,
                width,
                height,
            } => (cx - width / 2.0, cy - height / 2.0, *width, *height),
        };

        let (x, y, w, h) = xywh;
        if ![x, y, w, h].iter().all(|v| v.is_finite()) {
            return Err(DetectionDecodeError::InvalidGeometry(
                "non-finite coordinate".to_string(),
            ));
        }
        if w < 0.0 || h < 0.0 {
            return Err(DetectionDecodeError::InvalidGeometry(format!(
                "negative size {}x{}",
                w, h
            )));
        }
        Ok(xywh)
    }
}

/// Detection as received from an upstream detector
#[derive(Debug, Clone, Deserialize)]
pub struct RawDetection {
    #[serde(flatten)]
    pub shape: BoxShape,
    #[serde(default, alias = "conf")]
    pub confidence: f64,
    #[serde(default, rename = "class")]
    pub class_name: Option<Value>,
    /// COCO id; detectors emit it as an integer or a whole float (`0.0`)
    #[serde(default)]
    pub cls: Option<Value>,
    #[serde(default, alias = "id")]
    pub track_id: Option<Value>,
    /// Capture time (Unix seconds); ingestion time when absent
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl RawDetection {
    pub fn from_value(value: &Value) -> Result<Self, DetectionDecodeError> {
        RawDetection::deserialize(value)
            .map_err(|e| DetectionDecodeError::Malformed(e.to_string()))
    }

    /// `class` wins over `cls`; neither gives `object`
    pub fn resolved_class(&self) -> String {
        match (&self.class_name, &self.cls) {
            (Some(Value::String(name)), _) => name.clone(),
            (Some(other), _) if !other.is_null() => other.to_string(),
            (_, Some(Value::Number(n))) => match whole_id(n) {
                Some(id) => coco_class_name(id),
                None => format!("class_{}", n),
            },
            (_, Some(Value::String(name))) => name.clone(),
            _ => "object".to_string(),
        }
    }

    pub fn resolved_track_id(&self) -> Option<String> {
        match &self.track_id {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }

    pub fn into_detection(self, now: f64) -> Result<Detection, DetectionDecodeError> {
        let (x, y, width, height) = self.shape.to_xywh()?;
        let class_name = self.resolved_class();
        let track_id = self.resolved_track_id();

        Ok(Detection {
            x,
            y,
            width,
            height,
            confidence: self.confidence,
            timestamp: self.timestamp.unwrap_or(now),
            class_name,
            track_id,
        })
    }
}

fn whole_id(n: &serde_json::Number) -> Option<i64> {
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

pub fn coco_class_name(id: i64) -> String {
    usize::try_from(id)
        .ok()
        .and_then(|i| COCO_NAMES.get(i))
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("class_{}", id))
}

/// Decode a detection record received at `now`
pub fn decode_detection(value: &Value, now: f64) -> Result<Detection, DetectionDecodeError> {
    RawDetection::from_value(value)?.into_detection(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_corner_box() {
        let d = decode_detection(
            &json!({"bbox": [100, 50, 180, 250], "conf": 0.9, "cls": 0, "id": 7}),
            10.0,
        )
        .unwrap();

        assert_eq!((d.x, d.y, d.width, d.height), (100.0, 50.0, 80.0, 200.0));
        assert_eq!(d.confidence, 0.9);
        assert_eq!(d.class_name, "person");
        assert_eq!(d.track_id.as_deref(), Some("7"));
        assert_eq!(d.timestamp, 10.0);
    }

    #[test]
    fn test_decode_top_left_box() {
        let d = decode_detection(
            &json!({"x": 10.0, "y": 20.0, "width": 30.0, "height": 40.0,
                    "confidence": 0.7, "class": "forklift", "track_id": "a1",
                    "timestamp": 5.5}),
            10.0,
        )
        .unwrap();

        assert_eq!((d.x, d.y, d.width, d.height), (10.0, 20.0, 30.0, 40.0));
        assert_eq!(d.class_name, "forklift");
        assert_eq!(d.track_id.as_deref(), Some("a1"));
        assert_eq!(d.timestamp, 5.5);
    }

    #[test]
    fn test_decode_center_box() {
        let d = decode_detection(
            &json!({"cx": 100.0, "cy": 100.0, "width": 40.0, "height": 20.0, "confidence": 0.8}),
            0.0,
        )
        .unwrap();

        assert_eq!((d.x, d.y), (80.0, 90.0));
        assert_eq!(d.center(), (100.0, 100.0));
        assert_eq!(d.class_name, "object");
        assert!(d.track_id.is_none());
    }

    #[test]
    fn test_class_precedence_and_unknown_ids() {
        let raw = RawDetection::from_value(&json!({"x": 0, "y": 0, "width": 1, "height": 1,
                                                    "class": "dog", "cls": 2}))
        .unwrap();
        assert_eq!(raw.resolved_class(), "dog");

        assert_eq!(coco_class_name(7), "truck");
        assert_eq!(coco_class_name(11), "stop_sign");
        assert_eq!(coco_class_name(56), "class_56");
    }

    #[test]
    fn test_float_class_id_resolves() {
        let d = decode_detection(
            &json!({"x": 10, "y": 10, "width": 5, "height": 5, "confidence": 0.9, "cls": 0.0}),
            0.0,
        )
        .unwrap();
        assert_eq!(d.class_name, "person");

        let d = decode_detection(
            &json!({"x": 10, "y": 10, "width": 5, "height": 5, "cls": 2.5}),
            0.0,
        )
        .unwrap();
        assert_eq!(d.class_name, "class_2.5");
    }

    #[test]
    fn test_decode_failures() {
        assert!(matches!(
            decode_detection(&json!({"confidence": 0.9}), 0.0),
            Err(DetectionDecodeError::Malformed(_))
        ));
        assert!(matches!(
            decode_detection(&json!({"bbox": [1, 2, 3]}), 0.0),
            Err(DetectionDecodeError::InvalidGeometry(_))
        ));
        assert!(matches!(
            decode_detection(&json!({"bbox": [10, 10, 5, 5]}), 0.0),
            Err(DetectionDecodeError::InvalidGeometry(_))
        ));
        assert!(decode_detection(&json!("not an object"), 0.0).is_err());
    }
}
