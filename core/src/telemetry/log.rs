use log::info;

use crate::processing::monitor::{DropReport, StreamStatus};
use crate::processing::FusionEvent;
use crate::telemetry::metrics::LatencySummary;

/// Human-readable run log: one `[FUSION]` line per event and one `[RATE]`
/// line per monitor tick.
pub struct LogManager;

impl LogManager {
    pub fn new() -> Self {
        Self
    }

    pub fn record(&self, message: &str) {
        info!("{}", message);
    }

    pub fn fusion_event(&self, event: &FusionEvent) {
        self.record(&format!(
            "[FUSION] #{} dt={:.3}s temp={:.1} fire={} shape={} raw={} conf={}/{} decision={}",
            event.id,
            event.time_skew_s,
            event.max_temperature,
            event.imagery_has_fire,
            event.thermal_shape,
            event.raw_signal,
            event.confirmations,
            event.window_fill,
            event.decision
        ));
    }

    pub fn drop_report(&self, report: &DropReport, window_s: f64) {
        let streams = report
            .streams
            .iter()
            .map(|stats| match stats.status {
                StreamStatus::Idle => format!("{}=idle", stats.kind),
                StreamStatus::WarmingUp => {
                    format!("{}={} (warming up)", stats.kind, stats.actual_count)
                }
                StreamStatus::Evaluated => format!(
                    "{}={}/{:.0} drop={:.1}%",
                    stats.kind,
                    stats.actual_count,
                    stats.expected_count,
                    stats.drop_rate * 100.0
                ),
            })
            .collect::<Vec<_>>()
            .join(" ");
        self.record(&format!("[RATE] {} (last {:.0}s)", streams, window_s));
    }

    pub fn latency_summary(&self, summary: &LatencySummary) {
        if summary.count == 0 {
            self.record("[LATENCY] no fusion events recorded");
            return;
        }
        self.record(&format!(
            "[LATENCY] events={} e2e mean={:.2}ms median={:.2}ms p95={:.2}ms p99={:.2}ms",
            summary.count, summary.mean_ms, summary.median_ms, summary.p95_ms, summary.p99_ms
        ));
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}
