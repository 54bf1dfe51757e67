//! K2S Core - Kinesis to storage buffering and flush engine
//!
//! This library batches the records of an ingestion event into bounded
//! windows and writes each window to object storage as one artifact:
//!
//! - Size and time flush thresholds, with size taking priority
//! - A final flush of whatever remains at the end of the batch
//! - Malformed records skipped without disturbing the window
//! - Self-describing artifact names with metadata attached in the sink

pub mod artifact;
pub mod buffer;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod record;
pub mod sink;
pub mod source;

// Re-export commonly used types
pub use buffer::{FlushPolicy, FlushTrigger, WindowBuffer};
pub use config::Config;
pub use engine::{IngestionEngine, InvocationFailure, InvocationResponse, InvocationSummary};
pub use error::{BufferError, FlushError, RecordError};
pub use error::{Error, Result};
pub use source::KinesisEvent;
