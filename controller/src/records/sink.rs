use fusioncore::{EventSink, FusionEvent};
use log::warn;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Forwards fusion events to the record writer task.
pub struct ChannelSink {
    tx: Mutex<Option<UnboundedSender<FusionEvent>>>,
}

impl ChannelSink {
    pub fn channel() -> (Self, UnboundedReceiver<FusionEvent>) {
        let (tx, rx) = unbounded_channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Drops the sender so the writer drains what is queued and exits.
    pub fn close(&self) {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

impl EventSink for ChannelSink {
    fn submit(&self, event: FusionEvent) {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(event).is_err() {
                    warn!("record writer gone; fusion event dropped");
                }
            }
            None => warn!("sink closed; fusion event {} dropped", event.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::tests::sample_event;

    #[test]
    fn close_ends_the_stream_after_queued_events() {
        let (sink, mut rx) = ChannelSink::channel();
        sink.submit(sample_event(1, false));
        sink.close();
        sink.submit(sample_event(2, false));
        assert_eq!(rx.try_recv().unwrap().id, 1);
        assert!(rx.try_recv().is_err());
        assert!(rx.blocking_recv().is_none());
    }
}
