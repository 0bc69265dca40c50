//! Stream-correlation core of the wildfire fusion controller.
//!
//! Thermal and imagery readings arrive on independent TCP streams, are
//! decoded into typed messages, stored as the latest reading per stream and
//! fused into a debounced fire decision. A rolling-window monitor watches
//! per-stream drop rates and can stop the whole controller.

pub mod math;
pub mod net;
pub mod pipeline;
pub mod prelude;
pub mod processing;
pub mod state;
pub mod telemetry;
pub mod wire;

pub use pipeline::Pipeline;
pub use prelude::{Clock, EventSink, FusionConfig, MonitorConfig, StreamKind, SystemClock};
pub use processing::{FusionEvent, LatencyRecord};
