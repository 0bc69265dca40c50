//! Line-delimited JSON message codec for the two sensor streams.
//!
//! Each line carries one reading. Unknown fields are ignored; a missing
//! required field rejects the line with a typed [`DecodeError`].

pub mod imagery;
pub mod thermal;

pub use imagery::{decode_imagery, BoundingBox, Detection, ImageryMessage};
pub use thermal::{decode_thermal, ShapeDescriptor, ThermalGrid, ThermalMessage};

use crate::prelude::StreamKind;

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("empty line")]
    Empty,
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// A decoded reading, tagged by the stream it arrived on.
#[derive(Debug, Clone)]
pub enum WireMessage {
    Thermal(ThermalMessage),
    Imagery(ImageryMessage),
}

impl WireMessage {
    pub fn kind(&self) -> StreamKind {
        match self {
            WireMessage::Thermal(_) => StreamKind::Thermal,
            WireMessage::Imagery(_) => StreamKind::Imagery,
        }
    }

    pub fn source_timestamp_ns(&self) -> u64 {
        match self {
            WireMessage::Thermal(msg) => msg.timestamp_ns,
            WireMessage::Imagery(msg) => msg.timestamp_ns,
        }
    }

    pub fn distance_m(&self) -> Option<f64> {
        match self {
            WireMessage::Thermal(msg) => msg.distance_m,
            WireMessage::Imagery(msg) => msg.distance_m,
        }
    }
}

/// Decodes one line received on the `kind` stream.
pub fn decode(kind: StreamKind, line: &str) -> Result<WireMessage, DecodeError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(DecodeError::Empty);
    }
    match kind {
        StreamKind::Thermal => decode_thermal(line).map(WireMessage::Thermal),
        StreamKind::Imagery => decode_imagery(line).map(WireMessage::Imagery),
    }
}

/// Send time in ns. Senders report either integer `timestamp_ns` or the
/// older float-seconds `timestamp`; the integer field wins when both exist.
pub(crate) fn resolve_timestamp(
    timestamp_ns: Option<u64>,
    timestamp_s: Option<f64>,
) -> Result<u64, DecodeError> {
    if let Some(ns) = timestamp_ns {
        return Ok(ns);
    }
    match timestamp_s {
        Some(secs) if secs.is_finite() && secs >= 0.0 => Ok((secs * 1e9).round() as u64),
        Some(secs) => Err(DecodeError::InvalidField {
            field: "timestamp",
            reason: format!("{} is not a valid epoch time", secs),
        }),
        None => Err(DecodeError::MissingField("timestamp_ns")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_reported_as_empty() {
        assert!(matches!(
            decode(StreamKind::Thermal, "   \r"),
            Err(DecodeError::Empty)
        ));
    }

    #[test]
    fn decode_dispatches_on_stream_kind() {
        let msg = decode(
            StreamKind::Imagery,
            r#"{"timestamp_ns": 7, "detections": []}"#,
        )
        .unwrap();
        assert_eq!(msg.kind(), StreamKind::Imagery);
        assert_eq!(msg.source_timestamp_ns(), 7);
        assert_eq!(msg.distance_m(), None);
    }

    #[test]
    fn thermal_line_on_imagery_stream_is_rejected() {
        let line = r#"{"timestamp_ns": 1, "grid": [[1.0]], "shape": [1, 1]}"#;
        assert!(matches!(
            decode(StreamKind::Imagery, line),
            Err(DecodeError::MissingField("detections"))
        ));
    }

    #[test]
    fn float_seconds_are_converted_to_ns() {
        assert_eq!(resolve_timestamp(None, Some(1.5)).unwrap(), 1_500_000_000);
        assert_eq!(resolve_timestamp(Some(42), Some(1.5)).unwrap(), 42);
        assert!(matches!(
            resolve_timestamp(None, None),
            Err(DecodeError::MissingField(_))
        ));
        assert!(matches!(
            resolve_timestamp(None, Some(-3.0)),
            Err(DecodeError::InvalidField { .. })
        ));
    }
}
