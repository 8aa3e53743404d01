//! # vigil-core
//!
//! **Rolling telemetry, derived KPIs and threshold alerts per subject.**
//!
//! Each monitored subject owns a [`TelemetrySession`]: a bounded
//! [`SampleStore`] fed by a [`SampleSource`], rolling KPIs derived on every
//! tick, an [`AlertEngine`] with a `Clear -> Active -> Resolved` lifecycle,
//! and an [`UpdateScheduler`] that can be paused, resumed, re-timed and
//! stopped.
//!
//! ## Quick Start
//!
//! ```no_run
//! use vigil_core::profiles;
//!
//! let profile = profiles::get("system-health").unwrap();
//! let session = profile.entry.build_session().unwrap();
//!
//! // One tick now, then every 30 s in the background.
//! session.refresh();
//! session.start().unwrap();
//!
//! let metrics = session.current_metrics();
//! println!("avg cpu {:?}", metrics.average.get("cpu_usage"));
//! for alert in session.alerts(false) {
//!     println!("[{}] {}", alert.severity, alert.message);
//! }
//! ```
//!
//! ## Architecture
//!
//! Source → Store (FIFO window) → Alert engine → published snapshot → readers
//!
//! A tick runs produce, append, evaluate and publish under the session lock.
//! Readers clone the last published snapshot and never wait on a tick.

pub mod alert;
pub mod config;
pub mod error;
pub mod export;
pub mod metrics;
pub mod profiles;
pub mod registry;
pub mod sample;
pub mod scheduler;
pub mod session;
pub mod source;
pub mod store;

pub use alert::{
    Alert, AlertEngine, AlertEvent, AlertId, Comparator, Resolution, RuleState, Severity,
    ThresholdRule,
};
pub use config::{
    SessionConfig, SessionEntry, TelemetryConfig, load_config_from_path, parse_config,
};
pub use error::{Result, VigilError};
pub use export::ExportFormat;
pub use metrics::{
    DerivedMetrics, RatioConfig, ScoreComponent, ScoreConfig, Trend, TrendDirection,
};
pub use registry::{HealthReport, SessionRegistry};
pub use sample::{Sample, unix_ms_now};
pub use scheduler::{ScheduleConfig, UpdateScheduler};
pub use session::{
    HealthStatus, SessionInfo, SessionSnapshot, TelemetrySession, TickStats, TickStatus,
};
pub use source::{FieldWalk, FnSource, RandomWalkSource, SampleSource, WalkKind};
pub use store::{MAX_CAPACITY, SampleStore};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
