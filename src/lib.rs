//! # hostwatch
//!
//! A concurrent local host-metrics monitor for Linux. Four collector
//! tasks sample CPU, memory, disk, and process-count statistics once per
//! second and publish typed updates to a supervisor, which maintains the
//! authoritative snapshot, renders it to the terminal at a configurable
//! display interval, and can append each displayed snapshot to a log
//! file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hostwatch::{MonitorConfig, ProcfsSourceFactory, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut supervisor = Supervisor::new(MonitorConfig::default());
//!     supervisor.start(&ProcfsSourceFactory).await?;
//!     supervisor.run().await;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod metrics;
pub mod report;
pub mod supervisor;

// Re-export public API
pub use error::{MonitorError, Result};
pub use metrics::{
    data::{Domain, MetricUpdate, MetricsSnapshot, Readiness},
    source::{ProcfsSourceFactory, SourceFactory},
};
pub use report::{format_log_line, render, SnapshotLogger};
pub use supervisor::{MonitorConfig, ShutdownHandle, Supervisor, SupervisorState};

use std::time::Duration;

/// Fixed cadence at which every collector samples its source.
pub const COLLECT_INTERVAL: Duration = Duration::from_secs(1);

/// The default display cadence in seconds.
pub const DEFAULT_DISPLAY_INTERVAL_SECS: u64 = 3;

/// The default snapshot log file, created in the working directory.
pub const DEFAULT_LOG_FILE: &str = "hostwatch.log";
