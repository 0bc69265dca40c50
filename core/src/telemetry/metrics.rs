use std::sync::Mutex;

use crate::math::stats::StatsHelper;
use crate::prelude::StreamKind;

const MAX_LATENCY_SAMPLES: usize = 100_000;

/// Counters and latency samples for one controller run.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Default)]
struct Metrics {
    accepted: [usize; 2],
    rejected: [usize; 2],
    connections: [usize; 2],
    events: usize,
    positive_decisions: usize,
    e2e_ms: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub accepted: [usize; 2],
    pub rejected: [usize; 2],
    pub connections: [usize; 2],
    pub events: usize,
    pub positive_decisions: usize,
}

impl MetricsSnapshot {
    pub fn accepted(&self, kind: StreamKind) -> usize {
        self.accepted[kind.index()]
    }

    pub fn rejected(&self, kind: StreamKind) -> usize {
        self.rejected[kind.index()]
    }

    pub fn connections(&self, kind: StreamKind) -> usize {
        self.connections[kind.index()]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencySummary {
    pub count: usize,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_accepted(&self, kind: StreamKind) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.accepted[kind.index()] += 1;
        }
    }

    pub fn record_rejected(&self, kind: StreamKind) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.rejected[kind.index()] += 1;
        }
    }

    pub fn record_connection(&self, kind: StreamKind) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.connections[kind.index()] += 1;
        }
    }

    pub fn record_event(&self, decision: bool, e2e_ms: f64) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.events += 1;
            if decision {
                metrics.positive_decisions += 1;
            }
            if metrics.e2e_ms.len() < MAX_LATENCY_SAMPLES {
                metrics.e2e_ms.push(e2e_ms);
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            MetricsSnapshot {
                accepted: metrics.accepted,
                rejected: metrics.rejected,
                connections: metrics.connections,
                events: metrics.events,
                positive_decisions: metrics.positive_decisions,
            }
        } else {
            MetricsSnapshot::default()
        }
    }

    pub fn latency_summary(&self) -> LatencySummary {
        let Ok(metrics) = self.inner.lock() else {
            return LatencySummary::default();
        };
        let samples = &metrics.e2e_ms;
        LatencySummary {
            count: samples.len(),
            mean_ms: StatsHelper::mean(samples),
            median_ms: StatsHelper::percentile(samples, 50.0),
            p95_ms: StatsHelper::percentile(samples, 95.0),
            p99_ms: StatsHelper::percentile(samples, 99.0),
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_tracked_per_stream() {
        let metrics = MetricsRecorder::new();
        metrics.record_accepted(StreamKind::Thermal);
        metrics.record_accepted(StreamKind::Thermal);
        metrics.record_rejected(StreamKind::Imagery);
        metrics.record_connection(StreamKind::Imagery);
        let snap = metrics.snapshot();
        assert_eq!(snap.accepted(StreamKind::Thermal), 2);
        assert_eq!(snap.accepted(StreamKind::Imagery), 0);
        assert_eq!(snap.rejected(StreamKind::Imagery), 1);
        assert_eq!(snap.connections(StreamKind::Imagery), 1);
    }

    #[test]
    fn latency_summary_covers_recorded_events() {
        let metrics = MetricsRecorder::new();
        for (i, ms) in [4.0, 1.0, 3.0, 2.0, 5.0].into_iter().enumerate() {
            metrics.record_event(i % 2 == 0, ms);
        }
        let summary = metrics.latency_summary();
        assert_eq!(summary.count, 5);
        assert_eq!(summary.mean_ms, 3.0);
        assert_eq!(summary.median_ms, 3.0);
        assert_eq!(summary.p99_ms, 5.0);
        assert_eq!(metrics.snapshot().positive_decisions, 3);
    }
}
