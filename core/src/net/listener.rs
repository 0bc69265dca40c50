use log::{info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio_util::sync::CancellationToken;

use crate::net::handler::handle_connection;
use crate::pipeline::Pipeline;
use crate::prelude::StreamKind;

/// Accept loop for one stream. Each accepted connection gets its own
/// handler task; the loop keeps accepting until shutdown, so a sender that
/// drops its link can reconnect at any time.
pub struct StreamListener {
    kind: StreamKind,
    listener: TcpListener,
}

impl StreamListener {
    pub async fn bind<A: ToSocketAddrs>(kind: StreamKind, addr: A) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { kind, listener })
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self, pipeline: Arc<Pipeline>, shutdown: CancellationToken) {
        match self.local_addr() {
            Ok(addr) => info!("{} listener accepting on {}", self.kind, addr),
            Err(_) => info!("{} listener accepting", self.kind),
        }

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    info!("{} connection from {}", self.kind, peer);
                    pipeline.metrics().record_connection(self.kind);
                    if let Err(err) = stream.set_nodelay(true) {
                        warn!("{}: could not disable nagle for {}: {}", self.kind, peer, err);
                    }
                    tokio::spawn(handle_connection(
                        self.kind,
                        stream,
                        peer.to_string(),
                        pipeline.clone(),
                        shutdown.clone(),
                    ));
                }
                // Retried immediately; the next iteration re-checks shutdown.
                Err(err) => warn!("{} accept failed: {}", self.kind, err),
            }
        }
        info!("{} listener stopped", self.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::{FusionConfig, MonitorConfig, SystemClock};
    use crate::processing::engine::tests::CollectingSink;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    const HOT: &[u8] = b"{\"timestamp_ns\": 1000000000, \"grid\": [[130.0, 70.0]]}\n";
    const FIRE: &[u8] = b"{\"timestamp_ns\": 1000100000, \"detections\": [{\"label\": \"fire\"}]}\n";

    async fn wait_for_events(sink: &CollectingSink, count: usize) {
        for _ in 0..200 {
            if sink.events.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {} events", count);
    }

    #[tokio::test]
    async fn reconnecting_sender_keeps_feeding_the_same_stream() {
        let sink = Arc::new(CollectingSink::default());
        let pipeline = Arc::new(Pipeline::new(
            FusionConfig::default(),
            &MonitorConfig::default(),
            sink.clone(),
            Arc::new(SystemClock),
        ));
        let token = CancellationToken::new();

        let thermal = StreamListener::bind(StreamKind::Thermal, "127.0.0.1:0").await.unwrap();
        let imagery = StreamListener::bind(StreamKind::Imagery, "127.0.0.1:0").await.unwrap();
        let thermal_addr = thermal.local_addr().unwrap();
        let imagery_addr = imagery.local_addr().unwrap();
        let thermal_task = tokio::spawn(thermal.run(pipeline.clone(), token.clone()));
        let imagery_task = tokio::spawn(imagery.run(pipeline.clone(), token.clone()));

        let mut thermal_conn = TcpStream::connect(thermal_addr).await.unwrap();
        thermal_conn.write_all(HOT).await.unwrap();
        let mut imagery_conn = TcpStream::connect(imagery_addr).await.unwrap();
        imagery_conn.write_all(b"garbage\n").await.unwrap();
        imagery_conn.write_all(FIRE).await.unwrap();
        wait_for_events(&sink, 1).await;

        // Imagery sender drops its link and comes back.
        drop(imagery_conn);
        let mut imagery_conn = TcpStream::connect(imagery_addr).await.unwrap();
        imagery_conn.write_all(FIRE).await.unwrap();
        wait_for_events(&sink, 2).await;
        thermal_conn.write_all(HOT).await.unwrap();
        wait_for_events(&sink, 3).await;

        let ids: Vec<u64> = sink.events.lock().unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(pipeline.metrics().snapshot().connections(StreamKind::Imagery), 2);
        assert_eq!(pipeline.metrics().snapshot().rejected(StreamKind::Imagery), 1);

        token.cancel();
        thermal_task.await.unwrap();
        imagery_task.await.unwrap();
    }
}
