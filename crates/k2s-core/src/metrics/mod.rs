//! Metrics collection and export.

mod prometheus;

pub use prometheus::{ErrorType, FlushDurationHistogram, IngestionMetrics};
