//! Artifact sinks.
//!
//! A sink stores named artifact bodies with metadata. The process-wide sink
//! is created on first use and reused by every later invocation.

mod store;

pub use store::ObjectStoreSink;

use crate::artifact::ArtifactMetadata;
use crate::config::SinkConfig;
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

/// An object listed from a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    /// Full object key
    pub key: String,
    /// Body size in bytes
    pub size: u64,
    /// Last modification time reported by the backend
    pub last_modified: DateTime<Utc>,
}

/// Durable destination for artifacts.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Store `body` under `name` with `metadata` attached.
    async fn put(&self, name: &str, body: Bytes, metadata: &ArtifactMetadata) -> Result<()>;

    /// List stored objects under `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> Result<Vec<StoredArtifact>>;

    /// Human-readable destination for logs.
    fn describe(&self) -> String;
}

static SHARED_SINK: OnceLock<Arc<dyn ArtifactSink>> = OnceLock::new();

/// Process-wide sink, created from `config` on first call.
///
/// Later calls return the same sink; a different location in `config` is
/// logged and ignored.
pub fn shared(config: &SinkConfig) -> Result<Arc<dyn ArtifactSink>> {
    if let Some(sink) = SHARED_SINK.get() {
        if sink.describe() != config.location.trim() {
            warn!(
                active = %sink.describe(),
                requested = %config.location,
                "Shared sink already initialized; ignoring new location"
            );
        }
        return Ok(Arc::clone(sink));
    }

    let created: Arc<dyn ArtifactSink> = Arc::new(ObjectStoreSink::from_config(config)?);
    let sink = SHARED_SINK.get_or_init(|| {
        info!(location = %created.describe(), "Artifact sink initialized");
        created
    });
    Ok(Arc::clone(sink))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_sink_is_reused() {
        let config = SinkConfig {
            location: "memory://".into(),
            ..Default::default()
        };

        let first = shared(&config).unwrap();
        let second = shared(&config).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
