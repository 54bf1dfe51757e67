//! Ingestion source events.
//!
//! One invocation receives one event: an ordered list of records, each
//! carrying a base64-encoded UTF-8 JSON payload.

use crate::record::RecordInput;
use crate::{RecordError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// A batch of source records delivered to one invocation.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KinesisEvent {
    /// Records in delivery order
    #[serde(rename = "Records", default)]
    pub records: Vec<SourceRecord>,
}

impl KinesisEvent {
    /// Parse an event document.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    /// Build an event from plain JSON payloads, encoding each as the source would.
    pub fn from_payloads<I, S>(payloads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let records = payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| SourceRecord {
                kinesis: KinesisPayload {
                    data: base64::engine::general_purpose::STANDARD.encode(payload.as_ref()),
                    partition_key: None,
                    sequence_number: Some(i.to_string()),
                },
            })
            .collect();
        Self { records }
    }

    /// Number of records in the event.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the event carries no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One record of a source event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceRecord {
    /// Stream payload
    pub kinesis: KinesisPayload,
}

/// Stream-specific payload fields.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KinesisPayload {
    /// Base64-encoded payload
    pub data: String,

    /// Partition key, if the source supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<String>,

    /// Sequence number, if the source supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<String>,
}

/// A payload decoded to text, ready to be added to the buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPayload {
    /// Parsed payload
    pub input: RecordInput,
    /// Length in bytes of the decoded UTF-8 text
    pub raw_size: u64,
}

impl SourceRecord {
    /// Decode base64, then UTF-8, then JSON.
    pub fn decode(&self) -> std::result::Result<DecodedPayload, RecordError> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(self.kinesis.data.trim())?;
        let text = String::from_utf8(bytes)?;
        let raw_size = text.len() as u64;
        let value: serde_json::Value = serde_json::from_str(&text)?;

        Ok(DecodedPayload {
            input: RecordInput::Structured(value),
            raw_size,
        })
    }

    /// Sequence number or partition key, for log context.
    pub fn locator(&self) -> Option<&str> {
        self.kinesis
            .sequence_number
            .as_deref()
            .or(self.kinesis.partition_key.as_deref())
    }
}
