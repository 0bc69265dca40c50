use serde::{Deserialize, Serialize};

use super::{resolve_timestamp, DecodeError};

pub const FIRE_LABEL: &str = "fire";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
}

impl Detection {
    pub fn is_fire(&self) -> bool {
        self.label == FIRE_LABEL
    }
}

#[derive(Debug, Clone)]
pub struct ImageryMessage {
    pub timestamp_ns: u64,
    pub detections: Vec<Detection>,
    pub distance_m: Option<f64>,
}

impl ImageryMessage {
    /// An empty detection list simply means no fire was seen.
    pub fn has_fire(&self) -> bool {
        self.detections.iter().any(Detection::is_fire)
    }
}

#[derive(Deserialize)]
struct RawImagery {
    #[serde(default, alias = "ts_ns", alias = "send_ts_ns")]
    timestamp_ns: Option<u64>,
    #[serde(default)]
    timestamp: Option<f64>,
    #[serde(default)]
    detections: Option<Vec<Detection>>,
    #[serde(default)]
    distance_m: Option<f64>,
}

pub fn decode_imagery(line: &str) -> Result<ImageryMessage, DecodeError> {
    let raw: RawImagery = serde_json::from_str(line)?;
    let timestamp_ns = resolve_timestamp(raw.timestamp_ns, raw.timestamp)?;
    let detections = raw
        .detections
        .ok_or(DecodeError::MissingField("detections"))?;

    Ok(ImageryMessage {
        timestamp_ns,
        detections,
        distance_m: raw.distance_m,
    })
}
