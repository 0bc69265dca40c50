use log::{info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::pipeline::Pipeline;
use crate::prelude::StreamKind;

/// Longest line accepted from a sender, newline included.
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// Reads newline-delimited readings from one connection until the peer
/// closes it, an I/O error occurs or shutdown is requested.
///
/// Undecodable lines are logged and skipped; the connection stays open.
/// Lines longer than [`MAX_LINE_BYTES`] are discarded up to the next newline
/// and counted as rejected.
pub async fn handle_connection<R>(
    kind: StreamKind,
    reader: R,
    peer: String,
    pipeline: Arc<Pipeline>,
    shutdown: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(4096);
    let mut discarding = false;

    loop {
        buf.clear();
        let mut limited = (&mut reader).take(MAX_LINE_BYTES as u64);
        let read = tokio::select! {
            _ = shutdown.cancelled() => break,
            read = limited.read_until(b'\n', &mut buf) => read,
        };
        match read {
            Ok(0) => {
                info!("{} connection from {} closed", kind, peer);
                break;
            }
            Ok(n) => {
                let terminated = buf.last() == Some(&b'\n');
                if !terminated && n == MAX_LINE_BYTES {
                    if !discarding {
                        warn!(
                            "{} message from {} exceeds {} bytes; discarding",
                            kind, peer, MAX_LINE_BYTES
                        );
                        pipeline.metrics().record_rejected(kind);
                        discarding = true;
                    }
                    continue;
                }
                if discarding {
                    // Tail of an oversize line.
                    discarding = false;
                    continue;
                }
                let receipt_ns = pipeline.clock().now_ns();
                let line = String::from_utf8_lossy(&buf);
                if let Err(err) = pipeline.ingest_line(kind, &line, receipt_ns) {
                    warn!("{} message from {} rejected: {}", kind, peer, err);
                }
            }
            Err(err) => {
                warn!("{} connection from {} failed: {}", kind, peer, err);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::{FusionConfig, ManualClock, MonitorConfig};
    use crate::processing::engine::tests::CollectingSink;

    #[tokio::test]
    async fn reads_lines_until_eof_and_skips_garbage() {
        let sink = Arc::new(CollectingSink::default());
        let pipeline = Arc::new(Pipeline::new(
            FusionConfig::default(),
            &MonitorConfig::default(),
            sink.clone(),
            Arc::new(ManualClock::new(5)),
        ));
        pipeline
            .ingest_line(
                StreamKind::Thermal,
                r#"{"timestamp_ns": 1, "grid": [150.0]}"#,
                1,
            )
            .unwrap();

        let input: &[u8] = b"{\"timestamp_ns\": 2, \"detections\": [{\"label\": \"fire\"}]}\n\
            \xff\xfe garbage\n\
            \n\
            {\"timestamp_ns\": 3, \"detections\": []}";
        handle_connection(
            StreamKind::Imagery,
            input,
            "test".into(),
            pipeline.clone(),
            CancellationToken::new(),
        )
        .await;

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].imagery_has_fire);
        assert!(!events[1].imagery_has_fire);
        assert_eq!(pipeline.metrics().snapshot().rejected(StreamKind::Imagery), 1);
    }

    #[tokio::test]
    async fn exits_on_shutdown() {
        let pipeline = Arc::new(Pipeline::new(
            FusionConfig::default(),
            &MonitorConfig::default(),
            Arc::new(CollectingSink::default()),
            Arc::new(ManualClock::new(5)),
        ));
        let (client, server) = tokio::io::duplex(64);
        let token = CancellationToken::new();
        token.cancel();
        handle_connection(StreamKind::Thermal, server, "test".into(), pipeline, token).await;
        drop(client);
    }

    #[tokio::test]
    async fn oversize_line_is_dropped_and_stream_continues() {
        let sink = Arc::new(CollectingSink::default());
        let pipeline = Arc::new(Pipeline::new(
            FusionConfig::default(),
            &MonitorConfig::default(),
            sink.clone(),
            Arc::new(ManualClock::new(5)),
        ));
        pipeline
            .ingest_line(
                StreamKind::Thermal,
                r#"{"timestamp_ns": 1, "grid": [150.0]}"#,
                1,
            )
            .unwrap();

        let mut input = b"{\"timestamp_ns\": 2, \"detections\": [{\"label\": \"".to_vec();
        input.extend(std::iter::repeat(b'x').take(MAX_LINE_BYTES * 2 + 17));
        input.extend_from_slice(b"\"}]}\n{\"timestamp_ns\": 3, \"detections\": [{\"label\": \"fire\"}]}\n");
        handle_connection(
            StreamKind::Imagery,
            input.as_slice(),
            "test".into(),
            pipeline.clone(),
            CancellationToken::new(),
        )
        .await;

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].imagery_has_fire);
        let metrics = pipeline.metrics().snapshot();
        assert_eq!(metrics.rejected(StreamKind::Imagery), 1);
        assert_eq!(metrics.accepted(StreamKind::Imagery), 1);
    }
}
