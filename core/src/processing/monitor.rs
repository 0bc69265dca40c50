//! Rolling-window drop-rate monitor.
//!
//! Every tick compares each stream's arrivals over the last window against
//! its declared send rate. A drop rate above the stop threshold on either
//! stream is the one fatal condition of the controller: the monitor stops
//! the fusion engine, cancels the shared shutdown token and reports the
//! breach to its caller.

use log::error;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::prelude::{Clock, MonitorConfig, StreamKind};
use crate::processing::engine::FusionEngine;
use crate::state::{ArrivalSummary, SharedState};
use crate::telemetry::log::LogManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// Nothing received yet.
    Idle,
    /// Less than one full window since the first arrival.
    WarmingUp,
    Evaluated,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropStats {
    pub kind: StreamKind,
    pub expected_count: f64,
    pub actual_count: usize,
    pub drop_rate: f64,
    pub status: StreamStatus,
}

/// `max(0, (expected - actual) / expected)`.
pub fn drop_rate(expected: f64, actual: usize) -> f64 {
    if expected <= 0.0 {
        return 0.0;
    }
    ((expected - actual as f64) / expected).max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropReport {
    pub at_ns: u64,
    pub streams: [DropStats; 2],
}

impl DropReport {
    pub fn stats(&self, kind: StreamKind) -> &DropStats {
        &self.streams[kind.index()]
    }

    /// First evaluated stream whose drop rate exceeds `threshold`.
    pub fn breach(&self, threshold: f64) -> Option<&DropStats> {
        self.streams
            .iter()
            .find(|s| s.status == StreamStatus::Evaluated && s.drop_rate > threshold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MonitorExit {
    /// Shutdown was requested elsewhere.
    Cancelled,
    /// The monitor itself triggered the shutdown.
    Breached(DropStats),
}

pub struct DropMonitor {
    config: MonitorConfig,
    state: Arc<SharedState>,
    engine: Arc<FusionEngine>,
    clock: Arc<dyn Clock>,
    logger: LogManager,
}

impl DropMonitor {
    pub fn new(
        config: MonitorConfig,
        state: Arc<SharedState>,
        engine: Arc<FusionEngine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            state,
            engine,
            clock,
            logger: LogManager::new(),
        }
    }

    fn stream_stats(&self, kind: StreamKind, arrivals: ArrivalSummary, now_ns: u64) -> DropStats {
        let expected_count = self.config.rate_hz(kind) * self.config.window_s;
        let status = match arrivals.first_arrival_ns {
            None => StreamStatus::Idle,
            Some(first) if now_ns.saturating_sub(first) < self.config.window_ns() => {
                StreamStatus::WarmingUp
            }
            Some(_) => StreamStatus::Evaluated,
        };
        let drop_rate = match status {
            StreamStatus::Evaluated => drop_rate(expected_count, arrivals.in_window),
            _ => 0.0,
        };
        DropStats {
            kind,
            expected_count,
            actual_count: arrivals.in_window,
            drop_rate,
            status,
        }
    }

    /// Computes the drop statistics as of now.
    pub fn evaluate(&self) -> DropReport {
        let now_ns = self.clock.now_ns();
        let snapshot = self.state.snapshot(now_ns);
        let streams = StreamKind::ALL
            .map(|kind| self.stream_stats(kind, snapshot.arrivals(kind), now_ns));
        DropReport {
            at_ns: now_ns,
            streams,
        }
    }

    /// One monitor tick. Returns the breaching stream after shutting down.
    pub fn tick(&self, shutdown: &CancellationToken) -> Option<DropStats> {
        let report = self.evaluate();
        self.logger.drop_report(&report, self.config.window_s);

        let breach = *report.breach(self.config.stop_threshold)?;
        error!(
            "{} drop rate {:.1}% exceeds stop threshold {:.1}% ({} of {:.0} expected); stopping controller",
            breach.kind,
            breach.drop_rate * 100.0,
            self.config.stop_threshold * 100.0,
            breach.actual_count,
            breach.expected_count
        );
        self.engine.stop();
        shutdown.cancel();
        Some(breach)
    }

    pub async fn run(self, shutdown: CancellationToken) -> MonitorExit {
        let mut ticker = tokio::time::interval(Duration::from_secs_f64(self.config.period_s));
        // The first tick of an interval completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return MonitorExit::Cancelled,
                _ = ticker.tick() => {
                    if let Some(breach) = self.tick(&shutdown) {
                        return MonitorExit::Breached(breach);
                    }
                }
            }
        }
    }
}
