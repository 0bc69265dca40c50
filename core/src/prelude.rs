use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::processing::FusionEvent;

/// The two independent sensor streams the controller correlates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Thermal,
    Imagery,
}

impl StreamKind {
    pub const ALL: [StreamKind; 2] = [StreamKind::Thermal, StreamKind::Imagery];

    pub fn index(self) -> usize {
        match self {
            StreamKind::Thermal => 0,
            StreamKind::Imagery => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StreamKind::Thermal => "thermal",
            StreamKind::Imagery => "imagery",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters of the debounced fusion decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    pub temp_threshold_c: f64,
    pub time_window_s: f64,
    pub window_k: usize,
    pub confirm_k: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            temp_threshold_c: 100.0,
            time_window_s: 2.0,
            window_k: 5,
            confirm_k: 3,
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.temp_threshold_c.is_finite() {
            return Err(ConfigError::Invalid("temp_threshold_c must be finite".into()));
        }
        if !(self.time_window_s >= 0.0 && self.time_window_s.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "time_window_s must be finite and >= 0 (got {})",
                self.time_window_s
            )));
        }
        if self.window_k == 0 {
            return Err(ConfigError::Invalid("window_k must be >= 1".into()));
        }
        if self.confirm_k == 0 || self.confirm_k > self.window_k {
            return Err(ConfigError::Invalid(format!(
                "confirm_k must be in 1..={} (got {})",
                self.window_k, self.confirm_k
            )));
        }
        Ok(())
    }
}

/// Parameters of the rolling-window drop-rate monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub window_s: f64,
    pub period_s: f64,
    pub stop_threshold: f64,
    pub thermal_rate_hz: f64,
    pub imagery_rate_hz: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window_s: 10.0,
            period_s: 10.0,
            stop_threshold: 0.5,
            thermal_rate_hz: 2.0,
            imagery_rate_hz: 2.0,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Both become a `Duration`, which rejects infinite or overlong values.
        for (name, secs) in [("monitor_window_s", self.window_s), ("monitor_period_s", self.period_s)] {
            if !(secs > 0.0) || Duration::try_from_secs_f64(secs).is_err() {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a finite duration > 0 (got {})",
                    name, secs
                )));
            }
        }
        if !(self.stop_threshold > 0.0 && self.stop_threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "drop_stop_threshold must be in (0, 1] (got {})",
                self.stop_threshold
            )));
        }
        for kind in StreamKind::ALL {
            let rate = self.rate_hz(kind);
            if !(rate > 0.0 && rate.is_finite()) {
                return Err(ConfigError::Invalid(format!(
                    "{} rate must be finite and > 0 (got {})",
                    kind, rate
                )));
            }
        }
        Ok(())
    }

    pub fn rate_hz(&self, kind: StreamKind) -> f64 {
        match kind {
            StreamKind::Thermal => self.thermal_rate_hz,
            StreamKind::Imagery => self.imagery_rate_hz,
        }
    }

    pub fn window_ns(&self) -> u64 {
        (self.window_s * 1e9) as u64
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Raised when no stream listener could be started.
#[derive(thiserror::Error, Debug)]
pub enum StartupError {
    #[error("no stream listener could be bound (thermal: {thermal}; imagery: {imagery})")]
    NoListeners {
        thermal: std::io::Error,
        imagery: std::io::Error,
    },
}

/// Nanosecond UTC epoch time source.
pub trait Clock: Send + Sync {
    fn now_ns(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

/// Hand-driven clock for deterministic tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ns: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ns),
        }
    }

    pub fn set(&self, now_ns: u64) {
        self.now.store(now_ns, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ns: u64) {
        self.now.fetch_add(delta_ns, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Receives completed fusion events. Ownership of the event moves to the sink.
pub trait EventSink: Send + Sync {
    fn submit(&self, event: FusionEvent);
}
