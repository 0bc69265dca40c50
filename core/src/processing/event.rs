use chrono::{SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::wire::ShapeDescriptor;

/// Timing breakdown of one fusion event, in signed ns since sender and
/// controller clocks are not guaranteed to agree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyBreakdown {
    pub thermal_proc_ns: i64,
    pub imagery_proc_ns: i64,
    pub thermal_net_ns: i64,
    pub imagery_net_ns: i64,
    pub fusion_proc_ns: i64,
    pub e2e_ns: i64,
}

impl LatencyBreakdown {
    pub fn e2e_ms(&self) -> f64 {
        self.e2e_ns as f64 / 1e6
    }
}

/// Signed `to_ns - from_ns`, saturating at the `i64` bounds. Source
/// timestamps are sender-controlled and may lie far outside the local clock.
pub(crate) fn elapsed_ns(from_ns: u64, to_ns: u64) -> i64 {
    let diff = i128::from(to_ns) - i128::from(from_ns);
    i64::try_from(diff).unwrap_or(if diff > 0 { i64::MAX } else { i64::MIN })
}

/// One correlated decision. Never modified after it is handed to a sink.
#[derive(Debug, Clone)]
pub struct FusionEvent {
    pub id: u64,
    pub utc_timestamp_ns: u64,
    pub time_skew_s: f64,
    pub max_temperature: f64,
    pub imagery_has_fire: bool,
    pub raw_signal: bool,
    pub confirmations: usize,
    pub window_fill: usize,
    pub decision: bool,
    pub thermal_shape: ShapeDescriptor,
    pub detection_count: usize,
    pub thermal_distance_m: Option<f64>,
    pub imagery_distance_m: Option<f64>,
    pub latency: LatencyBreakdown,
}

impl FusionEvent {
    /// ISO-8601 UTC with millisecond precision, e.g. `2024-05-01T12:00:00.250Z`.
    pub fn utc_iso(&self) -> String {
        Utc.timestamp_nanos(i64::try_from(self.utc_timestamp_ns).unwrap_or(i64::MAX))
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn latency_record(&self) -> LatencyRecord {
        LatencyRecord {
            fusion_id: self.id,
            utc: self.utc_iso(),
            thermal_proc_ns: self.latency.thermal_proc_ns,
            imagery_proc_ns: self.latency.imagery_proc_ns,
            thermal_net_ns: self.latency.thermal_net_ns,
            imagery_net_ns: self.latency.imagery_net_ns,
            fusion_proc_ns: self.latency.fusion_proc_ns,
            e2e_ns: self.latency.e2e_ns,
            e2e_ms: self.latency.e2e_ms(),
            raw_signal: self.raw_signal,
            decision: self.decision,
        }
    }
}

/// One line of the latency log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyRecord {
    pub fusion_id: u64,
    pub utc: String,
    pub thermal_proc_ns: i64,
    pub imagery_proc_ns: i64,
    pub thermal_net_ns: i64,
    pub imagery_net_ns: i64,
    pub fusion_proc_ns: i64,
    pub e2e_ns: i64,
    pub e2e_ms: f64,
    pub raw_signal: bool,
    pub decision: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> FusionEvent {
        FusionEvent {
            id: 4,
            utc_timestamp_ns: 1_714_564_800_250_000_000,
            time_skew_s: 0.1,
            max_temperature: 120.0,
            imagery_has_fire: true,
            raw_signal: true,
            confirmations: 3,
            window_fill: 5,
            decision: true,
            thermal_shape: ShapeDescriptor { rows: 4, cols: 4 },
            detection_count: 2,
            thermal_distance_m: Some(10.0),
            imagery_distance_m: None,
            latency: LatencyBreakdown {
                e2e_ns: 2_500_000,
                ..Default::default()
            },
        }
    }

    #[test]
    fn utc_iso_keeps_milliseconds() {
        assert_eq!(event().utc_iso(), "2024-05-01T12:00:00.250Z");
    }

    #[test]
    fn latency_record_carries_e2e_in_ms() {
        let record = event().latency_record();
        assert_eq!(record.fusion_id, 4);
        assert_eq!(record.e2e_ms, 2.5);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["e2e_ns"], 2_500_000);
        assert_eq!(json["raw_signal"], true);
    }

    #[test]
    fn elapsed_may_be_negative_under_clock_skew() {
        assert_eq!(elapsed_ns(10, 4), -6);
    }

    #[test]
    fn elapsed_saturates_on_out_of_range_timestamps() {
        assert_eq!(elapsed_ns(0, 9_300_000_000_000_000_000), i64::MAX);
        assert_eq!(elapsed_ns(9_300_000_000_000_000_000, 1_000), i64::MIN);
        assert_eq!(elapsed_ns(u64::MAX, u64::MAX - 7), -7);
    }
}
