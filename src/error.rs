//! Error handling for the hostwatch crate.

use std::path::PathBuf;

use crate::metrics::data::Domain;

/// A specialized `Result` type for hostwatch operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// The main error type for monitor operations.
///
/// Only startup failures surface to the user; steady-state source read
/// failures are handled inside the collector loops (skip the cycle,
/// retry on the next tick).
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metric source data could not be parsed
    #[error("failed to parse metric source data: {0}")]
    Parse(String),

    /// A collector could not be started
    #[error("failed to start {domain} collector: {reason}")]
    Spawn { domain: Domain, reason: String },

    /// The snapshot log could not be opened
    #[error("failed to open log file {path}: {source}")]
    LogOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl MonitorError {
    /// Create a new parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a new spawn error for the given domain
    pub fn spawn_error(domain: Domain, reason: impl Into<String>) -> Self {
        Self::Spawn {
            domain,
            reason: reason.into(),
        }
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
