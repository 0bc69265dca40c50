use log::info;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::prelude::{Clock, EventSink, FusionConfig};
use crate::processing::event::{elapsed_ns, FusionEvent, LatencyBreakdown};
use crate::processing::window::FusionWindow;
use crate::state::{SharedState, StreamReading};
use crate::telemetry::log::LogManager;
use crate::wire::ShapeDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    AwaitingBothStreams,
    Active,
    Stopped,
}

/// Instantaneous correlation of the two latest readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    pub time_skew_s: f64,
    pub max_temperature: f64,
    pub imagery_has_fire: bool,
    pub raw_signal: bool,
    pub thermal_shape: ShapeDescriptor,
    pub detection_count: usize,
}

/// Computes the raw fire signal. `None` if either slot holds the wrong
/// kind of payload.
pub fn correlate(
    config: &FusionConfig,
    thermal: &StreamReading,
    imagery: &StreamReading,
) -> Option<Correlation> {
    let thermal_msg = thermal.as_thermal()?;
    let imagery_msg = imagery.as_imagery()?;

    let time_skew_s =
        thermal.source_timestamp_ns.abs_diff(imagery.source_timestamp_ns) as f64 / 1e9;
    let max_temperature = thermal_msg.max_temperature();
    let imagery_has_fire = imagery_msg.has_fire();
    let raw_signal = max_temperature > config.temp_threshold_c
        && imagery_has_fire
        && time_skew_s <= config.time_window_s;

    Some(Correlation {
        time_skew_s,
        max_temperature,
        imagery_has_fire,
        raw_signal,
        thermal_shape: thermal_msg.shape(),
        detection_count: imagery_msg.detections.len(),
    })
}

/// What the caller learns about an event after it went to the sink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Emitted {
    pub id: u64,
    pub raw_signal: bool,
    pub decision: bool,
    pub e2e_ms: f64,
}

struct EngineInner {
    state: EngineState,
    window: FusionWindow,
    next_id: u64,
}

/// Debounced fusion decision engine.
///
/// Runs inside whichever connection task accepted the triggering reading.
/// The internal lock serialises window updates, id allocation and sink
/// hand-off, so sinks observe events in strictly increasing, gap-free id
/// order.
pub struct FusionEngine {
    config: FusionConfig,
    clock: Arc<dyn Clock>,
    logger: LogManager,
    inner: Mutex<EngineInner>,
}

impl FusionEngine {
    pub fn new(config: FusionConfig, clock: Arc<dyn Clock>) -> Self {
        let window = FusionWindow::with_capacity(config.window_k);
        Self {
            config,
            clock,
            logger: LogManager::new(),
            inner: Mutex::new(EngineInner {
                state: EngineState::AwaitingBothStreams,
                window,
                next_id: 1,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> EngineState {
        self.lock().state
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Terminal: no further events are produced.
    pub fn stop(&self) {
        let mut inner = self.lock();
        if inner.state != EngineState::Stopped {
            info!("fusion engine stopped after {} events", inner.next_id - 1);
            inner.state = EngineState::Stopped;
        }
    }

    /// Re-evaluates the fusion decision after a reading was recorded.
    pub fn on_reading(&self, shared: &SharedState, sink: &dyn EventSink) -> Option<Emitted> {
        let mut inner = self.lock();
        if inner.state == EngineState::Stopped {
            return None;
        }

        let fusion_start = self.clock.now_ns();
        let snapshot = shared.snapshot(fusion_start);
        let (thermal, imagery) = match (snapshot.thermal.as_ref(), snapshot.imagery.as_ref()) {
            (Some(thermal), Some(imagery)) => (thermal, imagery),
            _ => return None,
        };
        let correlation = correlate(&self.config, thermal, imagery)?;

        if inner.state == EngineState::AwaitingBothStreams {
            info!("both streams reporting; fusion active");
            inner.state = EngineState::Active;
        }

        inner.window.push(correlation.raw_signal);
        let confirmations = inner.window.confirmations();
        let window_fill = inner.window.fill();
        let decision = confirmations >= self.config.confirm_k;

        let fusion_end = self.clock.now_ns();
        let latency = LatencyBreakdown {
            thermal_proc_ns: elapsed_ns(thermal.receipt_timestamp_ns, thermal.processed_timestamp_ns),
            imagery_proc_ns: elapsed_ns(imagery.receipt_timestamp_ns, imagery.processed_timestamp_ns),
            thermal_net_ns: elapsed_ns(thermal.source_timestamp_ns, thermal.receipt_timestamp_ns),
            imagery_net_ns: elapsed_ns(imagery.source_timestamp_ns, imagery.receipt_timestamp_ns),
            fusion_proc_ns: elapsed_ns(fusion_start, fusion_end),
            e2e_ns: elapsed_ns(
                thermal.source_timestamp_ns.min(imagery.source_timestamp_ns),
                fusion_end,
            ),
        };

        // Nothing fallible runs between id allocation and the hand-off.
        let id = inner.next_id;
        inner.next_id += 1;
        let event = FusionEvent {
            id,
            utc_timestamp_ns: fusion_end,
            time_skew_s: correlation.time_skew_s,
            max_temperature: correlation.max_temperature,
            imagery_has_fire: correlation.imagery_has_fire,
            raw_signal: correlation.raw_signal,
            confirmations,
            window_fill,
            decision,
            thermal_shape: correlation.thermal_shape,
            detection_count: correlation.detection_count,
            thermal_distance_m: thermal.distance_m,
            imagery_distance_m: imagery.distance_m,
            latency,
        };
        self.logger.fusion_event(&event);

        let emitted = Emitted {
            id,
            raw_signal: event.raw_signal,
            decision,
            e2e_ms: latency.e2e_ms(),
        };
        sink.submit(event);
        Some(emitted)
    }
}
