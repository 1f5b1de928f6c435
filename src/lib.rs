// Library interface for gpslogger
// This allows integration tests to access internal modules

pub mod config;
pub mod errors;
pub mod event_loop;
pub mod gps;
pub mod peripherals;
pub mod sequencer;
pub mod session;
pub mod units;
pub mod writer;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{ErrorClass, GpsLoggerError};
pub use event_loop::{EventLoop, LoopTiming, ShutdownSignal};
pub use gps::{GpsFix, GpsReport, LatLon, SkyView};
pub use sequencer::{LoggingSettings, Sequencer};
pub use session::{SessionPaths, SessionState};
pub use writer::{CsvLogWriter, LogRecord};
