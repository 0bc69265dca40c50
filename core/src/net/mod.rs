//! TCP ingestion: one listener per stream, one task per connection.

pub mod handler;
pub mod listener;

pub use handler::handle_connection;
pub use listener::StreamListener;

use log::warn;

use crate::prelude::{StartupError, StreamKind};

/// Listeners that could be bound at startup.
pub struct BoundListeners {
    pub thermal: Option<StreamListener>,
    pub imagery: Option<StreamListener>,
}

impl BoundListeners {
    /// True when only one stream could be bound.
    pub fn is_degraded(&self) -> bool {
        self.thermal.is_none() || self.imagery.is_none()
    }

    pub fn into_vec(self) -> Vec<StreamListener> {
        self.thermal.into_iter().chain(self.imagery).collect()
    }
}

/// Binds both stream listeners. A single failure degrades the controller to
/// the other stream; two failures abort startup.
pub async fn bind_listeners(
    host: &str,
    thermal_port: u16,
    imagery_port: u16,
) -> Result<BoundListeners, StartupError> {
    let thermal = StreamListener::bind(StreamKind::Thermal, (host, thermal_port)).await;
    let imagery = StreamListener::bind(StreamKind::Imagery, (host, imagery_port)).await;

    match (thermal, imagery) {
        (Err(thermal), Err(imagery)) => Err(StartupError::NoListeners { thermal, imagery }),
        (thermal, imagery) => {
            if let Err(err) = &thermal {
                warn!(
                    "thermal listener on {}:{} unavailable ({}); running degraded on imagery only",
                    host, thermal_port, err
                );
            }
            if let Err(err) = &imagery {
                warn!(
                    "imagery listener on {}:{} unavailable ({}); running degraded on thermal only",
                    host, imagery_port, err
                );
            }
            Ok(BoundListeners {
                thermal: thermal.ok(),
                imagery: imagery.ok(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn one_failed_bind_degrades() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let taken_port = taken.local_addr().unwrap().port();

        let bound = bind_listeners("127.0.0.1", taken_port, 0).await.unwrap();
        assert!(bound.is_degraded());
        assert!(bound.thermal.is_none());
        let listeners = bound.into_vec();
        assert_eq!(listeners.len(), 1);
        assert_eq!(listeners[0].kind(), StreamKind::Imagery);
    }

    #[tokio::test]
    async fn both_failed_binds_abort() {
        let a = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let b = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let result = bind_listeners(
            "127.0.0.1",
            a.local_addr().unwrap().port(),
            b.local_addr().unwrap().port(),
        )
        .await;
        assert!(matches!(result, Err(StartupError::NoListeners { .. })));
    }

    #[tokio::test]
    async fn both_bound_is_not_degraded() {
        let bound = bind_listeners("127.0.0.1", 0, 0).await.unwrap();
        assert!(!bound.is_degraded());
        assert_eq!(bound.into_vec().len(), 2);
    }
}
