use anyhow::{bail, Context};
use fusioncore::prelude::{FusionConfig, MonitorConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub bind_host: String,
    pub thermal_port: u16,
    pub imagery_port: u16,
    pub temp_threshold_c: f64,
    pub time_window_s: f64,
    pub window_k: usize,
    pub confirm_k: usize,
    pub drop_stop_threshold: f64,
    pub monitor_window_s: f64,
    pub monitor_period_s: f64,
    pub thermal_rate_hz: f64,
    pub imagery_rate_hz: f64,
    pub fusion_log: PathBuf,
    pub latency_log: PathBuf,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        let fusion = FusionConfig::default();
        let monitor = MonitorConfig::default();
        Self {
            bind_host: "0.0.0.0".to_string(),
            thermal_port: 5001,
            imagery_port: 5002,
            temp_threshold_c: fusion.temp_threshold_c,
            time_window_s: fusion.time_window_s,
            window_k: fusion.window_k,
            confirm_k: fusion.confirm_k,
            drop_stop_threshold: monitor.stop_threshold,
            monitor_window_s: monitor.window_s,
            monitor_period_s: monitor.period_s,
            thermal_rate_hz: monitor.thermal_rate_hz,
            imagery_rate_hz: monitor.imagery_rate_hz,
            fusion_log: PathBuf::from("fusion_log.csv"),
            latency_log: PathBuf::from("latency_log.jsonl"),
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub bind_host: Option<String>,
    pub thermal_port: Option<u16>,
    pub imagery_port: Option<u16>,
    pub temp_threshold_c: Option<f64>,
    pub time_window_s: Option<f64>,
    pub window_k: Option<usize>,
    pub confirm_k: Option<usize>,
    pub drop_stop_threshold: Option<f64>,
    pub monitor_window_s: Option<f64>,
    pub monitor_period_s: Option<f64>,
    pub thermal_rate_hz: Option<f64>,
    pub imagery_rate_hz: Option<f64>,
    pub fusion_log: Option<PathBuf>,
    pub latency_log: Option<PathBuf>,
}

fn apply<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

impl ControllerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading controller config {}", path_ref.display()))?;
        let config: ControllerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing controller config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        apply(&mut self.bind_host, overrides.bind_host);
        apply(&mut self.thermal_port, overrides.thermal_port);
        apply(&mut self.imagery_port, overrides.imagery_port);
        apply(&mut self.temp_threshold_c, overrides.temp_threshold_c);
        apply(&mut self.time_window_s, overrides.time_window_s);
        apply(&mut self.window_k, overrides.window_k);
        apply(&mut self.confirm_k, overrides.confirm_k);
        apply(&mut self.drop_stop_threshold, overrides.drop_stop_threshold);
        apply(&mut self.monitor_window_s, overrides.monitor_window_s);
        apply(&mut self.monitor_period_s, overrides.monitor_period_s);
        apply(&mut self.thermal_rate_hz, overrides.thermal_rate_hz);
        apply(&mut self.imagery_rate_hz, overrides.imagery_rate_hz);
        apply(&mut self.fusion_log, overrides.fusion_log);
        apply(&mut self.latency_log, overrides.latency_log);
        self
    }

    pub fn to_fusion_config(&self) -> FusionConfig {
        FusionConfig {
            temp_threshold_c: self.temp_threshold_c,
            time_window_s: self.time_window_s,
            window_k: self.window_k,
            confirm_k: self.confirm_k,
        }
    }

    pub fn to_monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            window_s: self.monitor_window_s,
            period_s: self.monitor_period_s,
            stop_threshold: self.drop_stop_threshold,
            thermal_rate_hz: self.thermal_rate_hz,
            imagery_rate_hz: self.imagery_rate_hz,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.thermal_port == self.imagery_port {
            bail!(
                "thermal and imagery ports must be different (both {})",
                self.thermal_port
            );
        }
        self.to_fusion_config().validate()?;
        self.to_monitor_config().validate()?;
        Ok(())
    }
}
