use crate::records::{spawn_record_writer, ChannelSink};
use crate::workflow::config::ControllerConfig;
use anyhow::Context;
use fusioncore::net::bind_listeners;
use fusioncore::processing::{DropStats, MonitorExit};
use fusioncore::telemetry::LogManager;
use fusioncore::{Pipeline, StreamKind, SystemClock};
use log::{info, warn};
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Process exit status for a clean stop.
pub const EXIT_CLEAN: i32 = 0;
/// Invalid configuration or no listener could be bound.
pub const EXIT_STARTUP: i32 = 2;
/// Drop rate on a stream exceeded the stop threshold.
pub const EXIT_DROP_RATE: i32 = 3;
/// A task failed after the controller had started.
pub const EXIT_RUNTIME: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    Clean,
    DropRateBreach(DropStats),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Clean => EXIT_CLEAN,
            RunOutcome::DropRateBreach(_) => EXIT_DROP_RATE,
        }
    }
}

/// Why a run ended without an outcome, split at the point `start` returns.
#[derive(Debug)]
pub enum RunFailure {
    Startup(anyhow::Error),
    Runtime(anyhow::Error),
}

impl RunFailure {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunFailure::Startup(_) => EXIT_STARTUP,
            RunFailure::Runtime(_) => EXIT_RUNTIME,
        }
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunFailure::Startup(err) => write!(f, "startup failed: {:#}", err),
            RunFailure::Runtime(err) => write!(f, "controller failed after startup: {:#}", err),
        }
    }
}

#[derive(Clone)]
pub struct Runner {
    config: ControllerConfig,
}

impl Runner {
    pub fn new(config: ControllerConfig) -> Self {
        Self { config }
    }

    /// Binds the listeners, opens the record files and spawns every task.
    pub async fn start(&self) -> anyhow::Result<RunningController> {
        let bound = bind_listeners(
            &self.config.bind_host,
            self.config.thermal_port,
            self.config.imagery_port,
        )
        .await
        .context("starting stream listeners")?;
        let degraded = bound.is_degraded();

        let (sink, rx) = ChannelSink::channel();
        let sink = Arc::new(sink);
        let writer = spawn_record_writer(rx, &self.config.fusion_log, &self.config.latency_log)?;

        let pipeline = Arc::new(Pipeline::new(
            self.config.to_fusion_config(),
            &self.config.to_monitor_config(),
            sink.clone(),
            Arc::new(SystemClock),
        ));
        let shutdown = CancellationToken::new();

        let mut addrs = Vec::new();
        let mut listener_tasks = Vec::new();
        for listener in bound.into_vec() {
            let addr = listener
                .local_addr()
                .with_context(|| format!("reading {} listener address", listener.kind()))?;
            addrs.push((listener.kind(), addr));
            listener_tasks.push(tokio::spawn(
                listener.run(pipeline.clone(), shutdown.clone()),
            ));
        }
        if degraded {
            warn!("running in degraded mode; fusion decisions cannot become positive");
        }

        let monitor = pipeline.drop_monitor(self.config.to_monitor_config());
        let monitor_task = tokio::spawn(monitor.run(shutdown.clone()));

        info!(
            "fusion controller started (temp>{}C, skew<={}s, confirm {}/{})",
            self.config.temp_threshold_c,
            self.config.time_window_s,
            self.config.confirm_k,
            self.config.window_k
        );

        Ok(RunningController {
            pipeline,
            sink,
            shutdown,
            addrs,
            listener_tasks,
            monitor_task,
            writer,
        })
    }
}

pub struct RunningController {
    pipeline: Arc<Pipeline>,
    sink: Arc<ChannelSink>,
    shutdown: CancellationToken,
    addrs: Vec<(StreamKind, SocketAddr)>,
    listener_tasks: Vec<JoinHandle<()>>,
    monitor_task: JoinHandle<MonitorExit>,
    writer: JoinHandle<usize>,
}

impl RunningController {
    pub fn local_addr(&self, kind: StreamKind) -> Option<SocketAddr> {
        self.addrs
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, addr)| *addr)
    }

    /// Runs until `stop` resolves or the drop monitor halts the controller,
    /// then drains the record writer.
    pub async fn wait<F>(self, stop: F) -> anyhow::Result<RunOutcome>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = stop => {
                info!("stop requested; shutting down");
                self.shutdown.cancel();
            }
            _ = self.shutdown.cancelled() => {}
        }

        let monitor_exit = self.monitor_task.await.context("joining drop monitor")?;
        for task in self.listener_tasks {
            task.await.context("joining stream listener")?;
        }

        self.pipeline.shutdown();
        self.sink.close();
        let written = self.writer.await.context("joining record writer")?;

        let metrics = self.pipeline.metrics().snapshot();
        info!(
            "run finished: {} fusion events written, {} positive; thermal {} ok/{} rejected, imagery {} ok/{} rejected",
            written,
            metrics.positive_decisions,
            metrics.accepted(StreamKind::Thermal),
            metrics.rejected(StreamKind::Thermal),
            metrics.accepted(StreamKind::Imagery),
            metrics.rejected(StreamKind::Imagery)
        );
        LogManager::new().latency_summary(&self.pipeline.metrics().latency_summary());

        Ok(match monitor_exit {
            MonitorExit::Cancelled => RunOutcome::Clean,
            MonitorExit::Breached(stats) => RunOutcome::DropRateBreach(stats),
        })
    }
}
