//! Ingestion metrics with Prometheus text export.

use crate::buffer::{FlushTrigger, WindowStats};
use crate::{Error, FlushError};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Histogram bucket boundaries in milliseconds for flush duration.
/// In seconds: [0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
const FLUSH_DURATION_BUCKETS_MS: [u64; 7] = [10, 50, 100, 250, 500, 1000, 2500];

const DEFAULT_PREFIX: &str = "k2s";

/// Error categories for labeled metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Undecodable or non-object records
    Record,
    /// Artifact encoding failures
    Serialization,
    /// Sink write failures
    Storage,
    /// Flush preconditions not met
    Buffer,
}

impl ErrorType {
    const ALL: [ErrorType; 4] = [
        ErrorType::Record,
        ErrorType::Serialization,
        ErrorType::Storage,
        ErrorType::Buffer,
    ];

    /// Category of an error raised while ingesting.
    ///
    /// Configuration errors are rejected before an invocation starts and
    /// have no category.
    pub fn of(err: &Error) -> Option<Self> {
        match err {
            Error::Record(_) => Some(ErrorType::Record),
            Error::Flush(FlushError::Serialization(_)) | Error::Serialization(_) => {
                Some(ErrorType::Serialization)
            }
            Error::Flush(FlushError::SinkWrite { .. }) | Error::Storage(_) | Error::Io(_) => {
                Some(ErrorType::Storage)
            }
            Error::Buffer(_) => Some(ErrorType::Buffer),
            Error::Config(_) => None,
        }
    }

    /// Label value for export.
    pub fn as_label(&self) -> &'static str {
        match self {
            ErrorType::Record => "record",
            ErrorType::Serialization => "serialization",
            ErrorType::Storage => "storage",
            ErrorType::Buffer => "buffer",
        }
    }

    fn index(&self) -> usize {
        match self {
            ErrorType::Record => 0,
            ErrorType::Serialization => 1,
            ErrorType::Storage => 2,
            ErrorType::Buffer => 3,
        }
    }
}

fn trigger_index(trigger: FlushTrigger) -> usize {
    match trigger {
        FlushTrigger::Size => 0,
        FlushTrigger::Time => 1,
        FlushTrigger::Final => 2,
    }
}

const TRIGGERS: [FlushTrigger; 3] = [FlushTrigger::Size, FlushTrigger::Time, FlushTrigger::Final];

/// Process-wide ingestion metrics.
///
/// All counters are atomics so one instance can be shared by every
/// invocation in the process.
#[derive(Default)]
pub struct IngestionMetrics {
    // === COUNTERS ===
    /// Invocations started
    invocations_total: AtomicU64,

    /// Invocations that ended with a flush failure
    invocation_failures_total: AtomicU64,

    /// Records successfully added to a window
    records_total: AtomicU64,

    /// Records skipped as malformed
    malformed_total: AtomicU64,

    /// Errors by type, indexed by `ErrorType::index`
    errors: [AtomicU64; 4],

    /// Successful flushes by trigger, indexed by `trigger_index`
    flushes: [AtomicU64; 3],

    /// Rows written across all artifacts
    rows_flushed_total: AtomicU64,

    /// Raw payload bytes written across all artifacts
    bytes_flushed_total: AtomicU64,

    /// Encoded artifact bytes written
    artifact_bytes_total: AtomicU64,

    // === GAUGES ===
    /// Raw bytes in the current window
    buffer_size_bytes: AtomicU64,

    /// Records in the current window
    buffer_record_count: AtomicU64,

    /// Completion time of the last successful flush
    last_flush_at: RwLock<Option<DateTime<Utc>>>,

    // === HISTOGRAM: flush_duration_seconds ===
    flush_duration_sum_us: AtomicU64,
    flush_duration_count: AtomicU64,
    /// Cumulative buckets plus +Inf
    flush_duration_buckets: [AtomicU64; 8],
}

impl IngestionMetrics {
    /// Create zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    // === COUNTER RECORDING ===

    /// Record the start of an invocation.
    pub fn record_invocation(&self) {
        self.invocations_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an invocation aborted by a flush failure.
    pub fn record_invocation_failure(&self) {
        self.invocation_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a record added to the window.
    pub fn record_record(&self) {
        self.records_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a skipped malformed record.
    pub fn record_malformed(&self) {
        self.malformed_total.fetch_add(1, Ordering::Relaxed);
        self.record_error_by_type(ErrorType::Record);
    }

    /// Record an error with a type label.
    pub fn record_error_by_type(&self, error_type: ErrorType) {
        self.errors[error_type.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful flush.
    pub fn record_flush(
        &self,
        trigger: FlushTrigger,
        rows: usize,
        raw_bytes: u64,
        artifact_bytes: usize,
        duration: Duration,
    ) {
        self.flushes[trigger_index(trigger)].fetch_add(1, Ordering::Relaxed);
        self.rows_flushed_total
            .fetch_add(rows as u64, Ordering::Relaxed);
        self.bytes_flushed_total
            .fetch_add(raw_bytes, Ordering::Relaxed);
        self.artifact_bytes_total
            .fetch_add(artifact_bytes as u64, Ordering::Relaxed);
        *self.last_flush_at.write() = Some(Utc::now());

        let duration_us = duration.as_micros() as u64;
        self.flush_duration_sum_us
            .fetch_add(duration_us, Ordering::Relaxed);
        self.flush_duration_count.fetch_add(1, Ordering::Relaxed);

        // Buckets are cumulative (le)
        for (i, &bucket_ms) in FLUSH_DURATION_BUCKETS_MS.iter().enumerate() {
            if duration_us <= bucket_ms * 1000 {
                self.flush_duration_buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
        self.flush_duration_buckets[7].fetch_add(1, Ordering::Relaxed);
    }

    // === GAUGE UPDATES ===

    /// Mirror the current window into the buffer gauges.
    pub fn observe_buffer(&self, stats: &WindowStats) {
        self.buffer_size_bytes
            .store(stats.total_bytes, Ordering::Relaxed);
        self.buffer_record_count
            .store(stats.record_count as u64, Ordering::Relaxed);
    }

    // === GETTERS ===

    /// Invocations started.
    pub fn invocations_total(&self) -> u64 {
        self.invocations_total.load(Ordering::Relaxed)
    }

    /// Invocations aborted by a flush failure.
    pub fn invocation_failures_total(&self) -> u64 {
        self.invocation_failures_total.load(Ordering::Relaxed)
    }

    /// Records added to a window.
    pub fn records_total(&self) -> u64 {
        self.records_total.load(Ordering::Relaxed)
    }

    /// Records skipped as malformed.
    pub fn malformed_total(&self) -> u64 {
        self.malformed_total.load(Ordering::Relaxed)
    }

    /// Total errors across all types.
    pub fn errors_total(&self) -> u64 {
        self.errors.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// Error count for one type.
    pub fn errors_by_type(&self, error_type: ErrorType) -> u64 {
        self.errors[error_type.index()].load(Ordering::Relaxed)
    }

    /// Successful flushes across all triggers.
    pub fn flushes_total(&self) -> u64 {
        self.flushes.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// Successful flushes for one trigger.
    pub fn flushes_by_trigger(&self, trigger: FlushTrigger) -> u64 {
        self.flushes[trigger_index(trigger)].load(Ordering::Relaxed)
    }

    /// Rows written.
    pub fn rows_flushed_total(&self) -> u64 {
        self.rows_flushed_total.load(Ordering::Relaxed)
    }

    /// Raw payload bytes written.
    pub fn bytes_flushed_total(&self) -> u64 {
        self.bytes_flushed_total.load(Ordering::Relaxed)
    }

    /// Encoded artifact bytes written.
    pub fn artifact_bytes_total(&self) -> u64 {
        self.artifact_bytes_total.load(Ordering::Relaxed)
    }

    /// Current window size in raw bytes.
    pub fn buffer_size_bytes(&self) -> u64 {
        self.buffer_size_bytes.load(Ordering::Relaxed)
    }

    /// Current window record count.
    pub fn buffer_record_count(&self) -> u64 {
        self.buffer_record_count.load(Ordering::Relaxed)
    }

    /// Time of the last successful flush.
    pub fn last_flush_at(&self) -> Option<DateTime<Utc>> {
        *self.last_flush_at.read()
    }

    /// Flush duration histogram data.
    pub fn flush_duration_histogram(&self) -> FlushDurationHistogram {
        let mut buckets = [(0.0, 0); 7];
        for (i, &bucket_ms) in FLUSH_DURATION_BUCKETS_MS.iter().enumerate() {
            buckets[i] = (
                bucket_ms as f64 / 1000.0,
                self.flush_duration_buckets[i].load(Ordering::Relaxed),
            );
        }

        FlushDurationHistogram {
            sum_seconds: self.flush_duration_sum_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            count: self.flush_duration_count.load(Ordering::Relaxed),
            buckets,
            inf_bucket: self.flush_duration_buckets[7].load(Ordering::Relaxed),
        }
    }

    /// Export all metrics in Prometheus text format.
    ///
    /// ```
    /// use k2s_core::metrics::IngestionMetrics;
    ///
    /// let metrics = IngestionMetrics::new();
    /// metrics.record_record();
    /// let text = metrics.export_prometheus_text();
    /// assert!(text.contains("k2s_records_total 1"));
    /// ```
    pub fn export_prometheus_text(&self) -> String {
        self.export_prometheus_text_with_prefix(DEFAULT_PREFIX)
    }

    /// Export metrics in Prometheus text format with a custom name prefix.
    pub fn export_prometheus_text_with_prefix(&self, prefix: &str) -> String {
        let mut out = Exposition {
            prefix,
            output: String::with_capacity(4096),
        };

        // === COUNTERS ===

        out.scalar(
            "invocations_total",
            "counter",
            "Invocations started",
            self.invocations_total(),
        );
        out.scalar(
            "invocation_failures_total",
            "counter",
            "Invocations aborted by a flush failure",
            self.invocation_failures_total(),
        );
        out.scalar(
            "records_total",
            "counter",
            "Records added to a window",
            self.records_total(),
        );
        out.scalar(
            "malformed_records_total",
            "counter",
            "Records skipped as malformed",
            self.malformed_total(),
        );
        out.scalar(
            "errors_total",
            "counter",
            "Total errors encountered",
            self.errors_total(),
        );

        out.header("errors", "counter", "Errors by type");
        for error_type in ErrorType::ALL {
            out.labeled(
                "errors",
                "type",
                error_type.as_label(),
                self.errors_by_type(error_type),
            );
        }
        out.output.push('\n');

        out.header("flushes_total", "counter", "Successful flushes by trigger");
        for trigger in TRIGGERS {
            out.labeled(
                "flushes_total",
                "trigger",
                trigger.as_str(),
                self.flushes_by_trigger(trigger),
            );
        }
        out.output.push('\n');

        out.scalar(
            "rows_flushed_total",
            "counter",
            "Rows written to artifacts",
            self.rows_flushed_total(),
        );
        out.scalar(
            "bytes_flushed_total",
            "counter",
            "Raw payload bytes written to artifacts",
            self.bytes_flushed_total(),
        );
        out.scalar(
            "artifact_bytes_total",
            "counter",
            "Encoded artifact bytes written",
            self.artifact_bytes_total(),
        );

        // === GAUGES ===

        out.scalar(
            "buffer_size_bytes",
            "gauge",
            "Raw bytes in the current window",
            self.buffer_size_bytes(),
        );
        out.scalar(
            "buffer_record_count",
            "gauge",
            "Records in the current window",
            self.buffer_record_count(),
        );
        out.scalar(
            "last_flush_timestamp_seconds",
            "gauge",
            "Unix time of the last successful flush",
            self.last_flush_at()
                .map(|t| t.timestamp().max(0) as u64)
                .unwrap_or(0),
        );

        // === HISTOGRAM ===

        let hist = self.flush_duration_histogram();
        out.header(
            "flush_duration_seconds",
            "histogram",
            "Duration of flush operations",
        );
        for (le, count) in &hist.buckets {
            out.labeled("flush_duration_seconds_bucket", "le", &le.to_string(), *count);
        }
        out.labeled("flush_duration_seconds_bucket", "le", "+Inf", hist.inf_bucket);
        let _ = writeln!(
            out.output,
            "{}_flush_duration_seconds_sum {}",
            prefix, hist.sum_seconds
        );
        let _ = writeln!(
            out.output,
            "{}_flush_duration_seconds_count {}",
            prefix, hist.count
        );

        out.output
    }
}

/// Text exposition writer.
struct Exposition<'a> {
    prefix: &'a str,
    output: String,
}

impl Exposition<'_> {
    fn header(&mut self, name: &str, kind: &str, help: &str) {
        let _ = writeln!(self.output, "# HELP {}_{} {}", self.prefix, name, help);
        let _ = writeln!(self.output, "# TYPE {}_{} {}", self.prefix, name, kind);
    }

    fn scalar(&mut self, name: &str, kind: &str, help: &str, value: u64) {
        self.header(name, kind, help);
        let _ = writeln!(self.output, "{}_{} {}", self.prefix, name, value);
        self.output.push('\n');
    }

    fn labeled(&mut self, name: &str, label: &str, label_value: &str, value: u64) {
        let _ = writeln!(
            self.output,
            "{}_{}{{{}=\"{}\"}} {}",
            self.prefix, name, label, label_value, value
        );
    }
}

/// Flush duration histogram data for export.
#[derive(Debug, Clone)]
pub struct FlushDurationHistogram {
    /// Sum of all observations in seconds
    pub sum_seconds: f64,
    /// Total count of observations
    pub count: u64,
    /// Bucket counts: (le_boundary_seconds, count)
    pub buckets: [(f64, u64); 7],
    /// +Inf bucket count
    pub inf_bucket: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = IngestionMetrics::new();

        metrics.record_invocation();
        metrics.record_record();
        metrics.record_record();
        metrics.record_malformed();
        assert_eq!(metrics.invocations_total(), 1);
        assert_eq!(metrics.records_total(), 2);
        assert_eq!(metrics.malformed_total(), 1);
        assert_eq!(metrics.errors_by_type(ErrorType::Record), 1);

        metrics.record_error_by_type(ErrorType::Storage);
        metrics.record_error_by_type(ErrorType::Storage);
        assert_eq!(metrics.errors_total(), 3);
        assert_eq!(metrics.errors_by_type(ErrorType::Storage), 2);
        assert_eq!(metrics.errors_by_type(ErrorType::Buffer), 0);

        metrics.record_invocation_failure();
        assert_eq!(metrics.invocation_failures_total(), 1);
    }

    #[test]
    fn test_error_type_of() {
        let sink = Error::Flush(FlushError::SinkWrite {
            name: "a.csv".into(),
            message: "denied".into(),
        });
        assert_eq!(ErrorType::of(&sink), Some(ErrorType::Storage));
        assert_eq!(
            ErrorType::of(&Error::Flush(FlushError::Serialization("x".into()))),
            Some(ErrorType::Serialization)
        );
        assert_eq!(
            ErrorType::of(&Error::Buffer(crate::BufferError::Empty)),
            Some(ErrorType::Buffer)
        );
        assert_eq!(ErrorType::of(&Error::Config("x".into())), None);
    }

    #[test]
    fn test_flush_by_trigger() {
        let metrics = IngestionMetrics::new();
        assert!(metrics.last_flush_at().is_none());

        metrics.record_flush(FlushTrigger::Size, 3, 1500, 40, Duration::from_millis(5));
        metrics.record_flush(FlushTrigger::Final, 1, 20, 12, Duration::from_millis(5));
        metrics.record_flush(FlushTrigger::Size, 2, 1100, 30, Duration::from_millis(5));

        assert_eq!(metrics.flushes_total(), 3);
        assert_eq!(metrics.flushes_by_trigger(FlushTrigger::Size), 2);
        assert_eq!(metrics.flushes_by_trigger(FlushTrigger::Time), 0);
        assert_eq!(metrics.flushes_by_trigger(FlushTrigger::Final), 1);
        assert_eq!(metrics.rows_flushed_total(), 6);
        assert_eq!(metrics.bytes_flushed_total(), 2620);
        assert_eq!(metrics.artifact_bytes_total(), 82);
        assert!(metrics.last_flush_at().is_some());
    }

    #[test]
    fn test_buffer_gauges() {
        let metrics = IngestionMetrics::new();
        let stats = WindowStats {
            record_count: 4,
            total_bytes: 900,
            age: Duration::from_millis(10),
            header_len: 2,
            trigger: None,
        };

        metrics.observe_buffer(&stats);
        assert_eq!(metrics.buffer_size_bytes(), 900);
        assert_eq!(metrics.buffer_record_count(), 4);
    }

    #[test]
    fn test_histogram_buckets() {
        let metrics = IngestionMetrics::new();

        for ms in [5, 30, 80, 200, 400, 900, 2000, 4000] {
            metrics.record_flush(FlushTrigger::Time, 1, 1, 1, Duration::from_millis(ms));
        }

        let hist = metrics.flush_duration_histogram();
        assert_eq!(hist.count, 8);

        // Cumulative counts
        for (i, (_, count)) in hist.buckets.iter().enumerate() {
            assert_eq!(*count, i as u64 + 1);
        }
        assert_eq!(hist.inf_bucket, 8);
        assert_eq!(hist.buckets[0].0, 0.01);
        assert!((hist.sum_seconds - 7.615).abs() < 0.001);
    }

    #[test]
    fn test_prometheus_text_export() {
        let metrics = IngestionMetrics::new();

        metrics.record_invocation();
        for _ in 0..100 {
            metrics.record_record();
        }
        metrics.record_malformed();
        metrics.record_flush(FlushTrigger::Size, 100, 2048, 900, Duration::from_millis(250));

        let output = metrics.export_prometheus_text();

        assert!(output.contains("# TYPE k2s_records_total counter"));
        assert!(output.contains("k2s_records_total 100"));
        assert!(output.contains("k2s_malformed_records_total 1"));
        assert!(output.contains("k2s_errors{type=\"record\"} 1"));
        assert!(output.contains("k2s_errors{type=\"storage\"} 0"));
        assert!(!output.contains("type=\"config\""));
        assert!(output.contains("k2s_flushes_total{trigger=\"size\"} 1"));
        assert!(output.contains("k2s_flushes_total{trigger=\"final\"} 0"));
        assert!(output.contains("k2s_rows_flushed_total 100"));
        assert!(output.contains("k2s_bytes_flushed_total 2048"));
        assert!(output.contains("# TYPE k2s_buffer_size_bytes gauge"));
        assert!(output.contains("# TYPE k2s_flush_duration_seconds histogram"));
        assert!(output.contains("k2s_flush_duration_seconds_bucket{le=\"0.25\"} 1"));
        assert!(output.contains("k2s_flush_duration_seconds_bucket{le=\"+Inf\"} 1"));
        assert!(output.contains("k2s_flush_duration_seconds_sum 0.25"));
        assert!(output.contains("k2s_flush_duration_seconds_count 1"));
    }

    #[test]
    fn test_prometheus_text_export_with_prefix() {
        let metrics = IngestionMetrics::new();
        metrics.record_record();

        let output = metrics.export_prometheus_text_with_prefix("custom_app");
        assert!(output.contains("# HELP custom_app_records_total"));
        assert!(output.contains("custom_app_records_total 1"));
        assert!(output.contains("custom_app_flush_duration_seconds_bucket"));
    }

    #[test]
    fn test_prometheus_text_format_validity() {
        let metrics = IngestionMetrics::new();
        metrics.record_flush(FlushTrigger::Time, 10, 10, 10, Duration::from_millis(150));

        let output = metrics.export_prometheus_text();
        for line in output.lines() {
            if line.starts_with("# HELP ") {
                assert!(line.contains("k2s_"));
            } else if line.starts_with("# TYPE ") {
                assert!(
                    line.ends_with("counter") || line.ends_with("gauge") || line.ends_with("histogram")
                );
            } else if !line.is_empty() {
                assert!(line.starts_with("k2s_"), "unexpected line: {}", line);
            }
        }
    }
}
