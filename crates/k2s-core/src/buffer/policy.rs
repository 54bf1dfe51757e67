//! Flush policy and trigger reasons.
//!
//! A window is flushed when its aggregate raw size reaches the size
//! threshold or its age reaches the time threshold. Size wins when both hold.

use crate::config::BufferConfig;
use crate::{BufferError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Why a window was flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushTrigger {
    /// Aggregate byte size reached the threshold
    Size,
    /// Window age reached the threshold
    Time,
    /// End of batch with records still buffered
    Final,
}

impl FlushTrigger {
    /// Label used in artifact names, metadata, and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushTrigger::Size => "size",
            FlushTrigger::Time => "time",
            FlushTrigger::Final => "final",
        }
    }
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FlushTrigger {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "size" => Ok(FlushTrigger::Size),
            "time" => Ok(FlushTrigger::Time),
            "final" => Ok(FlushTrigger::Final),
            other => Err(crate::Error::Serialization(format!(
                "Unknown flush trigger: {}",
                other
            ))),
        }
    }
}

/// Size and time thresholds for a window.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushPolicy {
    /// Aggregate raw bytes that force a flush
    pub size_threshold_bytes: u64,

    /// Maximum window age
    pub time_threshold: Duration,
}

impl FlushPolicy {
    /// Create a policy. Both thresholds must be strictly positive.
    pub fn new(size_threshold_bytes: u64, time_threshold: Duration) -> Result<Self> {
        if size_threshold_bytes == 0 {
            return Err(BufferError::InvalidPolicy("size threshold must be positive".into()).into());
        }
        if time_threshold.is_zero() {
            return Err(BufferError::InvalidPolicy("time threshold must be positive".into()).into());
        }
        Ok(Self {
            size_threshold_bytes,
            time_threshold,
        })
    }

    /// Build from buffer configuration.
    pub fn from_config(config: &BufferConfig) -> Result<Self> {
        Self::new(config.size_threshold_bytes, config.time_threshold()?)
    }

    /// Set size threshold.
    pub fn with_size_threshold_bytes(mut self, bytes: u64) -> Self {
        self.size_threshold_bytes = bytes;
        self
    }

    /// Set time threshold.
    pub fn with_time_threshold(mut self, threshold: Duration) -> Self {
        self.time_threshold = threshold;
        self
    }

    /// Evaluate thresholds for a window of `size_bytes` that has been open for `age`.
    pub fn evaluate(&self, size_bytes: u64, age: Duration) -> Option<FlushTrigger> {
        if size_bytes >= self.size_threshold_bytes {
            return Some(FlushTrigger::Size);
        }

        if age >= self.time_threshold {
            return Some(FlushTrigger::Time);
        }

        None
    }
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            size_threshold_bytes: 1024,
            time_threshold: Duration::from_secs(2),
        }
    }
}
