//! `object_store` backed sink.

use super::{ArtifactSink, StoredArtifact};
use crate::artifact::ArtifactMetadata;
use crate::config::SinkConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use std::sync::Arc;
use tracing::debug;

/// Sink writing artifacts to S3, local disk, or memory.
pub struct ObjectStoreSink {
    store: Arc<dyn ObjectStore>,
    location: String,
    /// Whether the backend stores object attributes
    attach_metadata: bool,
}

impl ObjectStoreSink {
    /// Wrap an existing store. Metadata is attached as object attributes.
    pub fn new(store: Arc<dyn ObjectStore>, location: impl Into<String>) -> Self {
        Self {
            store,
            location: location.into(),
            attach_metadata: true,
        }
    }

    /// Create a sink from configuration.
    pub fn from_config(config: &SinkConfig) -> Result<Self> {
        let location = config.location.trim();

        if location.starts_with("s3://") {
            Ok(Self::new(Self::create_s3_store(config)?, location))
        } else if location.starts_with("memory://") {
            Ok(Self::new(Arc::new(object_store::memory::InMemory::new()), location))
        } else {
            let store = Self::create_local_store(location)?;
            Ok(Self {
                store,
                location: location.to_string(),
                attach_metadata: false,
            })
        }
    }

    fn create_s3_store(config: &SinkConfig) -> Result<Arc<dyn ObjectStore>> {
        use object_store::aws::AmazonS3Builder;
        use object_store::prefix::PrefixStore;

        let path = config
            .location
            .trim()
            .strip_prefix("s3://")
            .unwrap_or_default();
        let (bucket, root) = path.split_once('/').unwrap_or((path, ""));
        if bucket.is_empty() {
            return Err(Error::Config(format!(
                "Invalid S3 location: {}",
                config.location
            )));
        }

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);

        if let Some(ref region) = config.aws_region {
            builder = builder.with_region(region);
        }

        if let Some(ref access_key) = config.aws_access_key_id {
            builder = builder.with_access_key_id(access_key);
        }

        if let Some(ref secret_key) = config.aws_secret_access_key {
            builder = builder.with_secret_access_key(secret_key);
        }

        if let Some(ref endpoint) = config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| Error::Storage(format!("Failed to create S3 store: {}", e)))?;

        let root = root.trim_matches('/');
        if root.is_empty() {
            Ok(Arc::new(store))
        } else {
            Ok(Arc::new(PrefixStore::new(store, root)))
        }
    }

    fn create_local_store(location: &str) -> Result<Arc<dyn ObjectStore>> {
        use object_store::local::LocalFileSystem;

        let path = std::path::Path::new(location.strip_prefix("file://").unwrap_or(location));

        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| {
                Error::Storage(format!("Failed to create local sink directory: {}", e))
            })?;
        }

        let store = LocalFileSystem::new_with_prefix(path).map_err(|e| {
            Error::Storage(format!("Failed to create local file system store: {}", e))
        })?;

        Ok(Arc::new(store))
    }
}

fn content_type(name: &str) -> &'static str {
    if name.ends_with(".parquet") {
        "application/vnd.apache.parquet"
    } else {
        "text/csv"
    }
}

#[async_trait]
impl ArtifactSink for ObjectStoreSink {
    async fn put(&self, name: &str, body: Bytes, metadata: &ArtifactMetadata) -> Result<()> {
        let path = ObjectPath::parse(name)
            .map_err(|e| Error::Storage(format!("Invalid artifact path {}: {}", name, e)))?;

        let mut attributes = Attributes::new();
        if self.attach_metadata {
            attributes.insert(Attribute::ContentType, content_type(name).into());
            for (key, value) in metadata.pairs() {
                attributes.insert(Attribute::Metadata(key.into()), value.into());
            }
        } else {
            debug!(
                name = name,
                "Backend does not store attributes; metadata kept in artifact name only"
            );
        }

        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&path, PutPayload::from(body), opts)
            .await?;

        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredArtifact>> {
        let prefix = if prefix.is_empty() {
            None
        } else {
            Some(
                ObjectPath::parse(prefix)
                    .map_err(|e| Error::Storage(format!("Invalid prefix {}: {}", prefix, e)))?,
            )
        };

        let mut artifacts: Vec<StoredArtifact> = self
            .store
            .list(prefix.as_ref())
            .map_ok(|meta| StoredArtifact {
                key: meta.location.to_string(),
                size: meta.size as u64,
                last_modified: meta.last_modified,
            })
            .try_collect()
            .await?;

        artifacts.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(artifacts)
    }

    fn describe(&self) -> String {
        self.location.clone()
    }
}
