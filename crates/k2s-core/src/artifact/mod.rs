//! Flush artifacts: naming, metadata, and body encoding.

mod encode;
mod name;

pub use encode::{encode, to_record_batch};
pub use name::ArtifactName;

use crate::buffer::FlushTrigger;
use chrono::{DateTime, SecondsFormat, Utc};
use crc32fast::Hasher;

/// Metadata attached to an artifact in the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMetadata {
    /// Rows in the artifact
    pub record_count: usize,
    /// Aggregate raw payload bytes of the window
    pub total_bytes: u64,
    /// Why the window was flushed
    pub trigger: FlushTrigger,
    /// When the artifact was generated
    pub generated_at: DateTime<Utc>,
    /// CRC32 of the body, lowercase hex
    pub checksum: String,
}

impl ArtifactMetadata {
    /// Metadata keys and values as stored by the sink.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("record_count", self.record_count.to_string()),
            ("buffer_size", self.total_bytes.to_string()),
            ("flush_trigger", self.trigger.to_string()),
            (
                "generated_at",
                self.generated_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ),
            ("checksum", self.checksum.clone()),
        ]
    }
}

/// CRC32 of an artifact body as eight hex digits.
pub fn checksum(body: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(body);
    format!("{:08x}", hasher.finalize())
}
