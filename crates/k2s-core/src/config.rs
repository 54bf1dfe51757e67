//! Configuration structures for k2s.
//!
//! Configuration is loaded from an optional TOML file, overridden by
//! environment variables, and finally by CLI flags.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the sink location.
pub const ENV_SINK_LOCATION: &str = "K2S_SINK_LOCATION";
/// Legacy environment variable naming the target bucket.
pub const ENV_BUCKET_NAME: &str = "S3_BUCKET_NAME";
/// Environment variable overriding the artifact key prefix.
pub const ENV_SINK_PREFIX: &str = "K2S_SINK_PREFIX";
/// Environment variable overriding the size threshold.
pub const ENV_SIZE_THRESHOLD: &str = "K2S_SIZE_THRESHOLD_BYTES";
/// Environment variable overriding the time threshold.
pub const ENV_TIME_THRESHOLD: &str = "K2S_TIME_THRESHOLD_SECONDS";
/// Environment variable overriding the artifact format.
pub const ENV_ARTIFACT_FORMAT: &str = "K2S_ARTIFACT_FORMAT";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Sink configuration
    #[serde(default)]
    pub sink: SinkConfig,

    /// Buffer thresholds
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Monitoring configuration
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Durable sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkConfig {
    /// Target location: `s3://bucket[/root]`, `memory://`, or a local directory
    #[serde(default)]
    pub location: String,

    /// Key prefix every artifact is written under
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Artifact body format
    #[serde(default)]
    pub format: ArtifactFormat,

    /// Parquet compression (ignored for CSV)
    #[serde(default)]
    pub compression: ParquetCompression,

    /// AWS region
    pub aws_region: Option<String>,

    /// AWS access key ID
    pub aws_access_key_id: Option<String>,

    /// AWS secret access key
    pub aws_secret_access_key: Option<String>,

    /// S3 endpoint (for MinIO or other S3-compatible storage)
    pub endpoint: Option<String>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            location: String::new(),
            prefix: default_prefix(),
            format: ArtifactFormat::default(),
            compression: ParquetCompression::default(),
            aws_region: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            endpoint: None,
        }
    }
}

/// Artifact body format.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    /// Comma separated values with a header row (default)
    #[default]
    Csv,
    /// Apache Parquet, all columns as UTF-8 strings
    Parquet,
}

impl ArtifactFormat {
    /// File extension used in artifact names.
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Csv => "csv",
            ArtifactFormat::Parquet => "parquet",
        }
    }
}

impl std::str::FromStr for ArtifactFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ArtifactFormat::Csv),
            "parquet" => Ok(ArtifactFormat::Parquet),
            other => Err(crate::Error::Config(format!(
                "Unknown artifact format: {}",
                other
            ))),
        }
    }
}

/// Parquet compression codec.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParquetCompression {
    /// Snappy compression (default, good balance)
    #[default]
    Snappy,
    /// Zstd compression (better ratio)
    Zstd,
    /// LZ4 compression (faster)
    Lz4,
    /// Gzip compression
    Gzip,
    /// No compression
    None,
}

/// Buffer flush thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BufferConfig {
    /// Aggregate raw payload bytes that force a size-triggered flush
    #[serde(default = "default_size_threshold_bytes")]
    pub size_threshold_bytes: u64,

    /// Maximum window age in seconds before a time-triggered flush
    #[serde(default = "default_time_threshold_seconds")]
    pub time_threshold_seconds: f64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            size_threshold_bytes: default_size_threshold_bytes(),
            time_threshold_seconds: default_time_threshold_seconds(),
        }
    }
}

impl BufferConfig {
    /// Time threshold as a [`Duration`].
    ///
    /// Fails for non-positive, NaN, or infinite values.
    pub fn time_threshold(&self) -> crate::Result<Duration> {
        if self.time_threshold_seconds.is_nan() || self.time_threshold_seconds <= 0.0 {
            return Err(crate::Error::Config(format!(
                "time_threshold_seconds must be positive, got {}",
                self.time_threshold_seconds
            )));
        }
        Duration::try_from_secs_f64(self.time_threshold_seconds).map_err(|e| {
            crate::Error::Config(format!(
                "time_threshold_seconds {} is out of range: {}",
                self.time_threshold_seconds, e
            ))
        })
    }
}

/// Monitoring configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log format
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    #[default]
    Info,
    /// Warn level
    Warn,
    /// Error level
    Error,
}

impl LogLevel {
    /// Directive string for an env filter.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// Plain text format
    Text,
}

// Default value functions
fn default_prefix() -> String {
    "raw-data".to_string()
}
fn default_size_threshold_bytes() -> u64 {
    1024
}
fn default_time_threshold_seconds() -> f64 {
    2.0
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration: optional file, then process environment overrides.
    ///
    /// Not validated; callers apply their own overrides and then call
    /// [`Config::validate`].
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// [`Config::load`] with an explicit environment lookup.
    pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env(lookup)?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup function.
    ///
    /// Takes a lookup closure rather than reading the process environment
    /// directly so tests can supply their own variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> crate::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(location) = lookup(ENV_SINK_LOCATION) {
            self.sink.location = location;
        } else if let Some(bucket) = lookup(ENV_BUCKET_NAME) {
            self.sink.location = format!("s3://{}", bucket);
        }

        if let Some(prefix) = lookup(ENV_SINK_PREFIX) {
            self.sink.prefix = prefix;
        }

        if let Some(size) = lookup(ENV_SIZE_THRESHOLD) {
            self.buffer.size_threshold_bytes = size.trim().parse().map_err(|e| {
                crate::Error::Config(format!("{} is not a valid integer: {}", ENV_SIZE_THRESHOLD, e))
            })?;
        }

        if let Some(seconds) = lookup(ENV_TIME_THRESHOLD) {
            self.buffer.time_threshold_seconds = seconds.trim().parse().map_err(|e| {
                crate::Error::Config(format!("{} is not a valid number: {}", ENV_TIME_THRESHOLD, e))
            })?;
        }

        if let Some(format) = lookup(ENV_ARTIFACT_FORMAT) {
            self.sink.format = format.parse()?;
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.sink.location.trim().is_empty() {
            return Err(crate::Error::Config("Sink location is required".into()));
        }

        if self.buffer.size_threshold_bytes == 0 {
            return Err(crate::Error::Config(
                "size_threshold_bytes must be positive".into(),
            ));
        }

        self.buffer.time_threshold()?;

        if self.sink.prefix.starts_with('/') || self.sink.prefix.ends_with('/') {
            return Err(crate::Error::Config(format!(
                "Sink prefix must not start or end with '/': {}",
                self.sink.prefix
            )));
        }

        if self.sink.format == ArtifactFormat::Csv
            && self.sink.compression != ParquetCompression::default()
        {
            tracing::warn!(
                compression = ?self.sink.compression,
                "Compression setting is ignored for CSV artifacts"
            );
        }

        Ok(())
    }
}
