use log::debug;
use std::sync::Arc;

use crate::prelude::{Clock, EventSink, FusionConfig, MonitorConfig, StreamKind};
use crate::processing::{DropMonitor, FusionEngine};
use crate::state::{SharedState, StreamReading};
use crate::telemetry::MetricsRecorder;
use crate::wire::{decode, DecodeError};

/// Everything a connection task needs: shared state, the fusion engine,
/// the event sink and run metrics. Cloned by `Arc` into every task.
pub struct Pipeline {
    state: Arc<SharedState>,
    engine: Arc<FusionEngine>,
    sink: Arc<dyn EventSink>,
    metrics: Arc<MetricsRecorder>,
    clock: Arc<dyn Clock>,
}

impl Pipeline {
    pub fn new(
        fusion: FusionConfig,
        monitor: &MonitorConfig,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Arc::new(SharedState::new(monitor.window_ns())),
            engine: Arc::new(FusionEngine::new(fusion, clock.clone())),
            sink,
            metrics: Arc::new(MetricsRecorder::new()),
            clock,
        }
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn engine(&self) -> &Arc<FusionEngine> {
        &self.engine
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn drop_monitor(&self, config: MonitorConfig) -> DropMonitor {
        DropMonitor::new(
            config,
            self.state.clone(),
            self.engine.clone(),
            self.clock.clone(),
        )
    }

    /// Decodes one line, records the reading and runs fusion.
    ///
    /// Blank lines yield `Ok(None)`. A decode failure is counted and
    /// returned; it never touches shared state. On success, returns the id
    /// of the fusion event it produced, if any.
    pub fn ingest_line(
        &self,
        kind: StreamKind,
        line: &str,
        receipt_ns: u64,
    ) -> Result<Option<u64>, DecodeError> {
        let message = match decode(kind, line) {
            Ok(message) => message,
            Err(DecodeError::Empty) => return Ok(None),
            Err(err) => {
                self.metrics.record_rejected(kind);
                return Err(err);
            }
        };
        let processed_ns = self.clock.now_ns();
        self.state
            .record(StreamReading::new(message, receipt_ns, processed_ns));
        self.metrics.record_accepted(kind);

        let emitted = self.engine.on_reading(&self.state, self.sink.as_ref());
        if let Some(emitted) = emitted {
            debug!("{} reading produced fusion event {}", kind, emitted.id);
            self.metrics.record_event(emitted.decision, emitted.e2e_ms);
        }
        Ok(emitted.map(|e| e.id))
    }

    pub fn shutdown(&self) {
        self.engine.stop();
    }
}
