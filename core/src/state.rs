//! Process-wide "latest reading per stream" store.
//!
//! Both streams live behind a single `Mutex`. Writes arrive at a few Hz per
//! stream, so one lock keeps every update atomic without per-stream lock
//! ordering concerns; throughput is not a constraint here.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::prelude::StreamKind;
use crate::wire::{ImageryMessage, ShapeDescriptor, ThermalMessage, WireMessage};

/// Most recent accepted reading on one stream.
#[derive(Debug, Clone)]
pub struct StreamReading {
    pub payload: WireMessage,
    pub source_timestamp_ns: u64,
    /// Taken once the whole line was read off the socket.
    pub receipt_timestamp_ns: u64,
    /// Taken once decoding finished.
    pub processed_timestamp_ns: u64,
    pub distance_m: Option<f64>,
}

impl StreamReading {
    pub fn new(payload: WireMessage, receipt_timestamp_ns: u64, processed_timestamp_ns: u64) -> Self {
        Self {
            source_timestamp_ns: payload.source_timestamp_ns(),
            distance_m: payload.distance_m(),
            payload,
            receipt_timestamp_ns,
            processed_timestamp_ns,
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.payload.kind()
    }

    pub fn shape_descriptor(&self) -> Option<ShapeDescriptor> {
        match &self.payload {
            WireMessage::Thermal(msg) => Some(msg.shape()),
            WireMessage::Imagery(_) => None,
        }
    }

    pub fn as_thermal(&self) -> Option<&ThermalMessage> {
        match &self.payload {
            WireMessage::Thermal(msg) => Some(msg),
            WireMessage::Imagery(_) => None,
        }
    }

    pub fn as_imagery(&self) -> Option<&ImageryMessage> {
        match &self.payload {
            WireMessage::Imagery(msg) => Some(msg),
            WireMessage::Thermal(_) => None,
        }
    }
}

/// Receipt timestamps of one stream, oldest at the head.
#[derive(Debug, Default)]
pub struct ArrivalLog {
    entries: VecDeque<u64>,
    first_arrival_ns: Option<u64>,
}

impl ArrivalLog {
    pub fn push(&mut self, receipt_ns: u64) {
        self.first_arrival_ns.get_or_insert(receipt_ns);
        self.entries.push_back(receipt_ns);
    }

    /// Drops every entry older than `cutoff_ns`.
    pub fn trim_before(&mut self, cutoff_ns: u64) {
        while self.entries.front().is_some_and(|&ts| ts < cutoff_ns) {
            self.entries.pop_front();
        }
    }

    pub fn count_since(&self, cutoff_ns: u64) -> usize {
        self.entries.iter().filter(|&&ts| ts >= cutoff_ns).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first_arrival_ns(&self) -> Option<u64> {
        self.first_arrival_ns
    }
}

#[derive(Debug, Default)]
struct StreamSlot {
    latest: Option<StreamReading>,
    arrivals: ArrivalLog,
}

/// Arrival figures for one stream as of a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArrivalSummary {
    /// Arrivals within `[now - window, now]`.
    pub in_window: usize,
    pub first_arrival_ns: Option<u64>,
}

/// Owned copy of both streams, taken under the lock.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    pub taken_at_ns: u64,
    pub thermal: Option<StreamReading>,
    pub imagery: Option<StreamReading>,
    pub arrivals: [ArrivalSummary; 2],
}

impl StateSnapshot {
    pub fn reading(&self, kind: StreamKind) -> Option<&StreamReading> {
        match kind {
            StreamKind::Thermal => self.thermal.as_ref(),
            StreamKind::Imagery => self.imagery.as_ref(),
        }
    }

    pub fn arrivals(&self, kind: StreamKind) -> ArrivalSummary {
        self.arrivals[kind.index()]
    }

    pub fn has_both(&self) -> bool {
        self.thermal.is_some() && self.imagery.is_some()
    }
}

pub struct SharedState {
    window_ns: u64,
    inner: Mutex<[StreamSlot; 2]>,
}

impl SharedState {
    pub fn new(window_ns: u64) -> Self {
        Self {
            window_ns,
            inner: Mutex::new([StreamSlot::default(), StreamSlot::default()]),
        }
    }

    pub fn window_ns(&self) -> u64 {
        self.window_ns
    }

    fn lock(&self) -> MutexGuard<'_, [StreamSlot; 2]> {
        // Every critical section is an overwrite or push, so a poisoned
        // guard still holds coherent data.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrites the stream's reading, logs its arrival and trims the
    /// arrival log to the monitoring window, as one locked step.
    pub fn record(&self, reading: StreamReading) {
        let receipt_ns = reading.receipt_timestamp_ns;
        let cutoff = receipt_ns.saturating_sub(self.window_ns);
        let mut slots = self.lock();
        let slot = &mut slots[reading.kind().index()];
        slot.latest = Some(reading);
        slot.arrivals.push(receipt_ns);
        slot.arrivals.trim_before(cutoff);
    }

    pub fn snapshot(&self, now_ns: u64) -> StateSnapshot {
        let cutoff = now_ns.saturating_sub(self.window_ns);
        let slots = self.lock();
        let summary = |slot: &StreamSlot| ArrivalSummary {
            in_window: slot.arrivals.count_since(cutoff),
            first_arrival_ns: slot.arrivals.first_arrival_ns(),
        };
        StateSnapshot {
            taken_at_ns: now_ns,
            thermal: slots[StreamKind::Thermal.index()].latest.clone(),
            imagery: slots[StreamKind::Imagery.index()].latest.clone(),
            arrivals: [
                summary(&slots[StreamKind::Thermal.index()]),
                summary(&slots[StreamKind::Imagery.index()]),
            ],
        }
    }

    #[cfg(test)]
    pub(crate) fn arrival_log_len(&self, kind: StreamKind) -> usize {
        self.lock()[kind.index()].arrivals.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::decode;

    const SECOND: u64 = 1_000_000_000;

    fn thermal_at(receipt_ns: u64) -> StreamReading {
        let msg = decode(
            StreamKind::Thermal,
            r#"{"timestamp_ns": 1, "grid": [[70.0, 120.0]], "shape": [1, 2]}"#,
        )
        .unwrap();
        StreamReading::new(msg, receipt_ns, receipt_ns + 10)
    }

    #[test]
    fn arrival_log_trims_from_head() {
        let mut log = ArrivalLog::default();
        for ts in [1, 2, 3, 10, 11] {
            log.push(ts);
        }
        log.trim_before(10);
        assert_eq!(log.len(), 2);
        assert_eq!(log.first_arrival_ns(), Some(1));
        assert_eq!(log.count_since(11), 1);
    }

    #[test]
    fn record_overwrites_latest_and_keeps_window() {
        let state = SharedState::new(10 * SECOND);
        for s in 0..15 {
            state.record(thermal_at(s * SECOND));
        }
        // Entries at 4..=14 s are within [14 - 10, 14].
        assert_eq!(state.arrival_log_len(StreamKind::Thermal), 11);
        let snap = state.snapshot(14 * SECOND);
        assert_eq!(
            snap.thermal.as_ref().map(|r| r.receipt_timestamp_ns),
            Some(14 * SECOND)
        );
        assert!(snap.imagery.is_none());
        assert!(!snap.has_both());
        assert_eq!(snap.arrivals(StreamKind::Thermal).in_window, 11);
        assert_eq!(snap.arrivals(StreamKind::Thermal).first_arrival_ns, Some(0));
        assert_eq!(snap.arrivals(StreamKind::Imagery), ArrivalSummary::default());
    }

    #[test]
    fn snapshot_counts_only_recent_arrivals_without_new_writes() {
        let state = SharedState::new(10 * SECOND);
        state.record(thermal_at(SECOND));
        state.record(thermal_at(2 * SECOND));
        let snap = state.snapshot(11 * SECOND + 500);
        assert_eq!(snap.arrivals(StreamKind::Thermal).in_window, 1);
        assert_eq!(state.arrival_log_len(StreamKind::Thermal), 2);
    }

    #[test]
    fn reading_exposes_shape_and_distance() {
        let reading = thermal_at(5);
        assert_eq!(reading.kind(), StreamKind::Thermal);
        assert_eq!(reading.shape_descriptor().unwrap().to_string(), "1x2");
        assert_eq!(reading.distance_m, None);
        assert!(reading.as_imagery().is_none());
    }
}
