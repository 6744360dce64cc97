//! Metric domains: data model, source abstractions, and collector loops.

pub mod collector;
pub mod data;
pub mod source;

// Re-export commonly used items
pub use data::{Domain, MetricUpdate, MetricsSnapshot, Readiness};
pub use source::{ProcfsSourceFactory, SourceFactory};
