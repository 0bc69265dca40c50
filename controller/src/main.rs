use anyhow::Context;
use clap::Parser;
use log::error;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::{ControllerConfig, Overrides};
use workflow::runner::{RunFailure, RunOutcome, Runner};

mod records;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Thermal/imagery fusion controller")]
struct Args {
    /// Load controller settings from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    bind_host: Option<String>,
    #[arg(long)]
    thermal_port: Option<u16>,
    #[arg(long)]
    imagery_port: Option<u16>,
    /// Thermal maximum (°C) that counts as fire
    #[arg(long)]
    temp_threshold: Option<f64>,
    /// Largest thermal/imagery timestamp skew (s) still fused as a match
    #[arg(long)]
    time_window: Option<f64>,
    #[arg(long)]
    window_k: Option<usize>,
    #[arg(long)]
    confirm_k: Option<usize>,
    /// Drop rate above which the controller stops itself
    #[arg(long)]
    drop_stop_threshold: Option<f64>,
    #[arg(long)]
    monitor_window: Option<f64>,
    #[arg(long)]
    monitor_period: Option<f64>,
    #[arg(long)]
    thermal_rate: Option<f64>,
    #[arg(long)]
    imagery_rate: Option<f64>,
    #[arg(long)]
    fusion_log: Option<PathBuf>,
    #[arg(long)]
    latency_log: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            bind_host: self.bind_host.clone(),
            thermal_port: self.thermal_port,
            imagery_port: self.imagery_port,
            temp_threshold_c: self.temp_threshold,
            time_window_s: self.time_window,
            window_k: self.window_k,
            confirm_k: self.confirm_k,
            drop_stop_threshold: self.drop_stop_threshold,
            monitor_window_s: self.monitor_window,
            monitor_period_s: self.monitor_period,
            thermal_rate_hz: self.thermal_rate,
            imagery_rate_hz: self.imagery_rate,
            fusion_log: self.fusion_log.clone(),
            latency_log: self.latency_log.clone(),
        }
    }
}

fn load_config(args: &Args) -> anyhow::Result<ControllerConfig> {
    let config = match &args.config {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::default(),
    }
    .with_overrides(args.overrides());
    config.validate().context("validating controller config")?;
    Ok(config)
}

fn run(args: Args) -> Result<RunOutcome, RunFailure> {
    let config = load_config(&args).map_err(RunFailure::Startup)?;
    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating controller runtime")
        .map_err(RunFailure::Startup)?;
    runtime.block_on(async {
        let running = Runner::new(config)
            .start()
            .await
            .map_err(RunFailure::Startup)?;
        running
            .wait(async {
                if let Err(err) = signal::ctrl_c().await {
                    error!("awaiting Ctrl+C failed: {}", err);
                    std::future::pending::<()>().await;
                }
            })
            .await
            .map_err(RunFailure::Runtime)
    })
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let code = match run(args) {
        Ok(outcome) => outcome.exit_code(),
        Err(failure) => {
            error!("{}", failure);
            failure.exit_code()
        }
    };
    std::process::exit(code);
}
