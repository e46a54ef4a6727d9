// Library interface for SlopeTrack modules
// The CLI and integration tests drive the tracking engine through these exports

pub mod clock;
pub mod config;
pub mod elevation;
pub mod error;
pub mod geo;
pub mod import;
pub mod logging;
pub mod models;
pub mod runs;
pub mod session;
pub mod source;
pub mod stats;
pub mod storage;

// Re-export commonly used types for convenience
pub use models::*;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TrackerConfig;
pub use error::{ErrorSeverity, ImportError, Result, StorageError, TrackerError};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use runs::{RunDetector, RunDetectorConfig};
pub use session::{PauseLedger, SessionState, StopOutcome, TrackingSession};
pub use source::{Authorization, ReplaySource, SampleSource, SubscriptionOptions};
pub use stats::StatsAggregator;
pub use storage::{JsonSessionStore, MemorySessionStore, SessionStore};
