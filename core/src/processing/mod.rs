pub mod engine;
pub mod event;
pub mod monitor;
pub mod window;

pub use engine::{correlate, Correlation, Emitted, EngineState, FusionEngine};
pub use event::{FusionEvent, LatencyBreakdown, LatencyRecord};
pub use monitor::{drop_rate, DropMonitor, DropReport, DropStats, MonitorExit, StreamStatus};
pub use window::FusionWindow;
