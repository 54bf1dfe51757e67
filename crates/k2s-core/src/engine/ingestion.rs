//! Ingestion loop and flush.
//!
//! One invocation walks its source records in order: decode, add to the
//! window, and flush whenever the window reports a trigger. Whatever is left
//! at the end is flushed once more with the `final` trigger. Every sink call
//! is awaited before the next record is looked at, so artifacts are produced
//! in delivery order.

use crate::artifact::{self, ArtifactMetadata, ArtifactName};
use crate::buffer::{FlushPolicy, FlushTrigger, WindowBuffer};
use crate::config::{ArtifactFormat, Config, ParquetCompression};
use crate::metrics::{ErrorType, IngestionMetrics};
use crate::sink::{self, ArtifactSink};
use crate::source::SourceRecord;
use crate::{BufferError, Error, FlushError, RecordError, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Outcome of a successful flush.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushReport {
    /// Artifact key in the sink
    pub name: String,
    /// Rows written
    pub record_count: usize,
    /// Aggregate raw payload bytes of the window
    pub total_bytes: u64,
    /// Why the window was flushed
    pub trigger: FlushTrigger,
    /// Encoded body size
    pub body_bytes: usize,
    /// CRC32 of the body
    pub checksum: String,
    /// Time spent encoding and writing
    pub duration: Duration,
}

/// Counts for a completed invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvocationSummary {
    /// Records successfully added to a window
    pub records_processed: usize,
    /// Successful flushes
    pub flushes_performed: usize,
    /// Records skipped as malformed
    pub malformed_records: usize,
    /// Artifacts written, in order
    pub artifacts: Vec<FlushReport>,
}

/// An invocation aborted by a flush failure.
///
/// Counts are those reached before the failing flush; the failed attempt is
/// not included.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct InvocationFailure {
    /// The flush error
    #[source]
    pub error: Error,
    /// Records added before the failure
    pub records_processed: usize,
    /// Flushes completed before the failure
    pub flushes_performed: usize,
    /// Records skipped before the failure
    pub malformed_records: usize,
}

/// Buffers source records into windows and writes each window to the sink.
pub struct IngestionEngine {
    policy: FlushPolicy,
    prefix: String,
    format: ArtifactFormat,
    compression: ParquetCompression,
    sink: Arc<dyn ArtifactSink>,
    metrics: Arc<IngestionMetrics>,
}

impl IngestionEngine {
    /// Create an engine writing to the process-wide sink.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let sink = sink::shared(&config.sink)?;
        Self::with_sink(config, sink)
    }

    /// Create an engine writing to `sink`.
    ///
    /// The sink location in `config` is not used.
    pub fn with_sink(config: &Config, sink: Arc<dyn ArtifactSink>) -> Result<Self> {
        let policy = FlushPolicy::from_config(&config.buffer)?;

        Ok(Self {
            policy,
            prefix: config.sink.prefix.trim_matches('/').to_string(),
            format: config.sink.format,
            compression: config.sink.compression,
            sink,
            metrics: Arc::new(IngestionMetrics::new()),
        })
    }

    /// Thresholds applied to each window.
    pub fn policy(&self) -> &FlushPolicy {
        &self.policy
    }

    /// Metrics for this engine.
    pub fn metrics(&self) -> &Arc<IngestionMetrics> {
        &self.metrics
    }

    /// The sink artifacts are written to.
    pub fn sink(&self) -> &Arc<dyn ArtifactSink> {
        &self.sink
    }

    /// Run one invocation over `records`.
    pub async fn run(
        &self,
        records: &[SourceRecord],
    ) -> std::result::Result<InvocationSummary, InvocationFailure> {
        let invocation_id = Uuid::new_v4();
        let span = info_span!("invocation", id = %invocation_id, records = records.len());
        self.run_inner(records).instrument(span).await
    }

    async fn run_inner(
        &self,
        records: &[SourceRecord],
    ) -> std::result::Result<InvocationSummary, InvocationFailure> {
        self.metrics.record_invocation();
        info!(sink = %self.sink.describe(), "Invocation started");

        let mut buffer = WindowBuffer::new(self.policy.clone());
        let mut summary = InvocationSummary::default();

        for (position, record) in records.iter().enumerate() {
            let decoded = match record.decode() {
                Ok(decoded) => decoded,
                Err(e) => {
                    self.skip_malformed(position, record, &e, &mut summary);
                    continue;
                }
            };

            let trigger = match buffer.add(decoded.input, decoded.raw_size) {
                Ok(trigger) => trigger,
                Err(e) => {
                    self.skip_malformed(position, record, &e, &mut summary);
                    continue;
                }
            };

            summary.records_processed += 1;
            self.metrics.record_record();
            let stats = buffer.stats();
            self.metrics.observe_buffer(&stats);

            if let Some(trigger) = trigger {
                debug!(
                    position,
                    trigger = %trigger,
                    window_age_ms = %stats.age.as_millis(),
                    columns = stats.header_len,
                    "Flush threshold reached"
                );
                self.flush_or_abort(&mut buffer, &mut summary).await?;
            }
        }

        if buffer.force_flush() {
            debug!(remaining = buffer.len(), "Flushing remainder");
            self.flush_or_abort(&mut buffer, &mut summary).await?;
        }

        info!(
            records_processed = summary.records_processed,
            flushes_performed = summary.flushes_performed,
            malformed_records = summary.malformed_records,
            "Invocation completed"
        );

        Ok(summary)
    }

    fn skip_malformed(
        &self,
        position: usize,
        record: &SourceRecord,
        err: &RecordError,
        summary: &mut InvocationSummary,
    ) {
        warn!(
            position,
            locator = record.locator().unwrap_or("-"),
            error = %err,
            "Skipping malformed record"
        );
        summary.malformed_records += 1;
        self.metrics.record_malformed();
    }

    async fn flush_or_abort(
        &self,
        buffer: &mut WindowBuffer,
        summary: &mut InvocationSummary,
    ) -> std::result::Result<(), InvocationFailure> {
        match self.flush(buffer).await {
            Ok(report) => {
                summary.flushes_performed += 1;
                summary.artifacts.push(report);
                Ok(())
            }
            Err(e) => {
                error!(
                    error = %e,
                    buffered = buffer.len(),
                    flushes_performed = summary.flushes_performed,
                    "Flush failed, aborting invocation"
                );
                self.metrics.record_invocation_failure();
                Err(InvocationFailure {
                    error: e,
                    records_processed: summary.records_processed,
                    flushes_performed: summary.flushes_performed,
                    malformed_records: summary.malformed_records,
                })
            }
        }
    }

    /// Write the window to the sink as one artifact.
    ///
    /// The window must hold records and have a trigger recorded. On success
    /// the buffer is reset; on failure it is left as it was and the error is
    /// counted by type.
    pub async fn flush(&self, buffer: &mut WindowBuffer) -> Result<FlushReport> {
        let result = self.write_window(buffer).await;
        if let Err(e) = &result {
            if let Some(error_type) = ErrorType::of(e) {
                self.metrics.record_error_by_type(error_type);
            }
        }
        result
    }

    async fn write_window(&self, buffer: &mut WindowBuffer) -> Result<FlushReport> {
        if buffer.is_empty() {
            return Err(BufferError::Empty.into());
        }
        let trigger = buffer.trigger().ok_or(BufferError::NoTrigger)?;

        let start = Instant::now();
        let generated_at = Utc::now();
        let record_count = buffer.len();
        let total_bytes = buffer.total_bytes();

        let body = artifact::encode(
            buffer.header(),
            buffer.records(),
            self.format,
            self.compression,
        )?;

        let name = ArtifactName {
            prefix: self.prefix.clone(),
            generated_at,
            trigger,
            record_count,
            total_bytes,
            format: self.format,
        }
        .key();

        let metadata = ArtifactMetadata {
            record_count,
            total_bytes,
            trigger,
            generated_at,
            checksum: artifact::checksum(&body),
        };
        let body_bytes = body.len();

        if let Err(e) = self.sink.put(&name, body, &metadata).await {
            return Err(FlushError::SinkWrite {
                name,
                message: e.to_string(),
            }
            .into());
        }

        let duration = start.elapsed();
        self.metrics
            .record_flush(trigger, record_count, total_bytes, body_bytes, duration);

        info!(
            artifact = %name,
            rows = record_count,
            bytes = total_bytes,
            body_bytes,
            trigger = %trigger,
            duration_ms = %duration.as_millis(),
            "Window flushed"
        );

        buffer.reset();
        self.metrics.observe_buffer(&buffer.stats());

        Ok(FlushReport {
            name,
            record_count,
            total_bytes,
            trigger,
            body_bytes,
            checksum: metadata.checksum,
            duration,
        })
    }
}
