pub mod fusion_csv;
pub mod latency;
pub mod sink;

pub use fusion_csv::FusionCsvWriter;
pub use latency::LatencyJsonlWriter;
pub use sink::ChannelSink;

use anyhow::Context;
use fusioncore::FusionEvent;
use log::error;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

fn create(path: &Path) -> anyhow::Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Drains fusion events into the CSV and JSONL logs on a blocking thread.
/// Finishes once the sink is closed and the queue is empty; returns the
/// number of events written.
pub fn spawn_record_writer(
    mut rx: UnboundedReceiver<FusionEvent>,
    fusion_log: &Path,
    latency_log: &Path,
) -> anyhow::Result<JoinHandle<usize>> {
    let mut fusion = FusionCsvWriter::new(create(fusion_log)?)
        .with_context(|| format!("writing header to {}", fusion_log.display()))?;
    let mut latency = LatencyJsonlWriter::new(create(latency_log)?);

    Ok(tokio::task::spawn_blocking(move || {
        let mut written = 0;
        while let Some(event) = rx.blocking_recv() {
            if let Err(err) = fusion.write(&event) {
                error!("fusion log write failed for event {}: {}", event.id, err);
            }
            if let Err(err) = latency.write(&event) {
                error!("latency log write failed for event {}: {}", event.id, err);
            }
            written += 1;
        }
        written
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use fusioncore::processing::LatencyBreakdown;
    use fusioncore::wire::ShapeDescriptor;
    use fusioncore::EventSink;

    pub(crate) fn sample_event(id: u64, decision: bool) -> FusionEvent {
        FusionEvent {
            id,
            utc_timestamp_ns: 1_714_564_800_000_000_000,
            time_skew_s: 0.0005,
            max_temperature: 120.0,
            imagery_has_fire: true,
            raw_signal: true,
            confirmations: 3,
            window_fill: 5,
            decision,
            thermal_shape: ShapeDescriptor { rows: 2, cols: 2 },
            detection_count: 1,
            thermal_distance_m: Some(25.0),
            imagery_distance_m: None,
            latency: LatencyBreakdown {
                thermal_proc_ns: 20_000,
                imagery_proc_ns: 15_000,
                thermal_net_ns: 1_000_000,
                imagery_net_ns: 1_500_000,
                fusion_proc_ns: 4_000,
                e2e_ns: 3_000_000,
            },
        }
    }

    #[tokio::test]
    async fn writer_drains_queue_into_both_logs() {
        let dir = tempfile::tempdir().unwrap();
        let fusion_path = dir.path().join("run/fusion_log.csv");
        let latency_path = dir.path().join("run/latency_log.jsonl");

        let (sink, rx) = ChannelSink::channel();
        let handle = spawn_record_writer(rx, &fusion_path, &latency_path).unwrap();
        for id in 1..=3 {
            sink.submit(sample_event(id, id == 3));
        }
        sink.close();
        assert_eq!(handle.await.unwrap(), 3);

        let csv = fs::read_to_string(&fusion_path).unwrap();
        assert_eq!(csv.lines().count(), 4);
        let jsonl = fs::read_to_string(&latency_path).unwrap();
        assert_eq!(jsonl.lines().count(), 3);
    }
}
