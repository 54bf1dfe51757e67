//! Error types for k2s core library.
//!
//! Uses hierarchical domain-specific errors following the thiserror pattern.
//! Record-level errors are absorbed by the ingestion loop; flush and
//! configuration errors are fatal to an invocation.

use thiserror::Error;

/// Result type alias for k2s operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for k2s.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single record could not be decoded or normalized
    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    /// Buffer-related error
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// Flush failure (serialization or sink write)
    #[error("Flush failed: {0}")]
    Flush(#[from] FlushError),

    /// Storage error outside of a flush (sink setup, listing)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether this error must abort the current invocation.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Record(_))
    }
}

/// Per-record decode and shape errors.
#[derive(Error, Debug)]
pub enum RecordError {
    /// Payload was not valid base64
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decoded payload was not valid UTF-8
    #[error("Payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Decoded payload was not valid JSON
    #[error("Payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Value cannot be turned into a field-name to value mapping
    #[error("Malformed record: {0}")]
    Malformed(String),
}

/// Buffer-specific errors.
#[derive(Error, Debug)]
pub enum BufferError {
    /// Buffer is empty
    #[error("Buffer is empty")]
    Empty,

    /// Flush requested without a recorded trigger reason
    #[error("Flush requested without a trigger reason")]
    NoTrigger,

    /// Invalid flush policy
    #[error("Invalid flush policy: {0}")]
    InvalidPolicy(String),
}

/// Flush failures. Any of these leaves the buffer untouched.
#[derive(Error, Debug)]
pub enum FlushError {
    /// Building the artifact body failed
    #[error("Artifact serialization failed: {0}")]
    Serialization(String),

    /// Writing the artifact to the sink failed
    #[error("Sink write failed for {name}: {message}")]
    SinkWrite { name: String, message: String },
}

// Conversion implementations for external error types

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<object_store::Error> for Error {
    fn from(err: object_store::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config("size_threshold_bytes must be positive".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: size_threshold_bytes must be positive"
        );

        let flush_err = FlushError::SinkWrite {
            name: "raw-data/x.csv".into(),
            message: "connection reset".into(),
        };
        let err: Error = flush_err.into();
        assert!(err.to_string().contains("Sink write failed for raw-data/x.csv"));
    }

    #[test]
    fn test_record_errors_are_not_fatal() {
        let err: Error = RecordError::Malformed("expected object".into()).into();
        assert!(!err.is_fatal());

        let err: Error = FlushError::Serialization("bad batch".into()).into();
        assert!(err.is_fatal());

        assert!(Error::Config("missing".into()).is_fatal());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: RecordError = json_err.into();
        assert!(err.to_string().starts_with("Payload is not valid JSON"));
    }
}
