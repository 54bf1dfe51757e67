//! Window buffer: records accumulated between two flushes.
//!
//! The buffer owns the records of the current window, their aggregate raw
//! size, the instant the window opened, the header captured from the first
//! record, and the reason a flush is due. It is driven by a single
//! invocation and never shared, so it takes `&mut self` instead of locking.

use super::policy::{FlushPolicy, FlushTrigger};
use crate::record::{Record, RecordInput};
use crate::RecordError;
use std::time::{Duration, Instant};
use tracing::debug;

/// In-memory accumulator for one window.
#[derive(Debug)]
pub struct WindowBuffer {
    /// Records in arrival order
    records: Vec<Record>,

    /// Sum of raw payload sizes
    total_bytes: u64,

    /// When the current window opened
    opened_at: Instant,

    /// Field names of the window's first record
    header: Option<Vec<String>>,

    /// Reason recorded by the last threshold check
    trigger: Option<FlushTrigger>,

    /// Thresholds
    policy: FlushPolicy,
}

/// Point-in-time view of the buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowStats {
    /// Buffered record count
    pub record_count: usize,
    /// Aggregate raw bytes
    pub total_bytes: u64,
    /// Time since the window opened
    pub age: Duration,
    /// Column count of the established header
    pub header_len: usize,
    /// Pending trigger reason
    pub trigger: Option<FlushTrigger>,
}

impl WindowBuffer {
    /// Create an empty buffer.
    pub fn new(policy: FlushPolicy) -> Self {
        Self {
            records: Vec::new(),
            total_bytes: 0,
            opened_at: Instant::now(),
            header: None,
            trigger: None,
            policy,
        }
    }

    /// Clear the window and reopen it now.
    pub fn reset(&mut self) {
        self.records.clear();
        self.total_bytes = 0;
        self.opened_at = Instant::now();
        self.header = None;
        self.trigger = None;
    }

    /// Add a record.
    ///
    /// On a malformed input the buffer is left untouched. Otherwise the
    /// record is appended, `raw_size` is added to the running total, the
    /// header is captured if this is the window's first record, and the
    /// thresholds are evaluated. Returns the trigger if a flush is now due.
    pub fn add(
        &mut self,
        input: RecordInput,
        raw_size: u64,
    ) -> Result<Option<FlushTrigger>, RecordError> {
        let record = Record::normalize(input)?;

        if self.header.is_none() {
            let header: Vec<String> = record.field_names().map(str::to_owned).collect();
            debug!(columns = header.len(), "Window header established");
            self.header = Some(header);
        }

        self.records.push(record);
        self.total_bytes = self.total_bytes.saturating_add(raw_size);

        Ok(self.should_flush())
    }

    /// Check size, then time. Records and returns the reason that fired.
    pub fn should_flush(&mut self) -> Option<FlushTrigger> {
        self.should_flush_at(Instant::now())
    }

    fn should_flush_at(&mut self, now: Instant) -> Option<FlushTrigger> {
        let age = now.saturating_duration_since(self.opened_at);
        self.trigger = self.policy.evaluate(self.total_bytes, age);
        self.trigger
    }

    /// Mark the remainder for a final flush. True iff the buffer is non-empty.
    pub fn force_flush(&mut self) -> bool {
        if self.records.is_empty() {
            return false;
        }
        self.trigger = Some(FlushTrigger::Final);
        true
    }

    /// Buffered records in arrival order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Header of the current window (empty until the first record).
    pub fn header(&self) -> &[String] {
        self.header.as_deref().unwrap_or(&[])
    }

    /// Pending trigger reason.
    pub fn trigger(&self) -> Option<FlushTrigger> {
        self.trigger
    }

    /// Aggregate raw bytes.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Buffered record count.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the window holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Time since the window opened.
    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }

    /// Snapshot of buffer state.
    pub fn stats(&self) -> WindowStats {
        WindowStats {
            record_count: self.records.len(),
            total_bytes: self.total_bytes,
            age: self.age(),
            header_len: self.header().len(),
            trigger: self.trigger,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_buffer() -> WindowBuffer {
        WindowBuffer::new(FlushPolicy::default())
    }

    fn input(id: i64) -> RecordInput {
        json!({"id": id, "name": format!("user-{}", id)}).into()
    }

    /// Pretend the window opened `ago` in the past.
    fn backdate(buffer: &mut WindowBuffer, ago: Duration) {
        buffer.opened_at = Instant::now()
            .checked_sub(ago)
            .expect("monotonic clock too close to its origin");
    }

    #[test]
    fn test_buffer_add() {
        let mut buffer = create_test_buffer();

        let trigger = buffer.add(input(1), 100).unwrap();
        assert_eq!(trigger, None);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.total_bytes(), 100);
        assert_eq!(buffer.header(), ["id", "name"]);
    }

    #[test]
    fn test_malformed_add_leaves_buffer_untouched() {
        let mut buffer = create_test_buffer();
        buffer.add(input(1), 100).unwrap();

        let err = buffer.add(json!([1, 2, 3]).into(), 500).unwrap_err();
        assert!(matches!(err, RecordError::Malformed(_)));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.total_bytes(), 100);
        assert_eq!(buffer.trigger(), None);
    }

    #[test]
    fn test_malformed_first_record_does_not_set_header() {
        let mut buffer = create_test_buffer();
        assert!(buffer.add(RecordInput::Encoded("nope".into()), 4).is_err());
        assert!(buffer.header().is_empty());

        buffer.add(json!({"b": 1, "a": 2}).into(), 10).unwrap();
        assert_eq!(buffer.header(), ["b", "a"]);
    }

    #[test]
    fn test_size_threshold_scenario() {
        let policy = FlushPolicy::default().with_time_threshold(Duration::from_secs(3600));
        let mut buffer = WindowBuffer::new(policy);

        assert_eq!(buffer.add(input(1), 500).unwrap(), None);
        assert_eq!(buffer.add(input(2), 500).unwrap(), None);
        assert_eq!(buffer.total_bytes(), 1000);

        assert_eq!(buffer.add(input(3), 500).unwrap(), Some(FlushTrigger::Size));
        assert_eq!(buffer.trigger(), Some(FlushTrigger::Size));
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_time_threshold_scenario() {
        let mut buffer = create_test_buffer();

        assert_eq!(buffer.add(input(1), 10).unwrap(), None);

        backdate(&mut buffer, Duration::from_secs(3));

        assert_eq!(buffer.add(input(2), 10).unwrap(), Some(FlushTrigger::Time));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_time_threshold_with_real_clock() {
        let policy = FlushPolicy::default().with_time_threshold(Duration::from_millis(50));
        let mut buffer = WindowBuffer::new(policy);

        assert_eq!(buffer.add(input(1), 10).unwrap(), None);
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(buffer.add(input(2), 10).unwrap(), Some(FlushTrigger::Time));
    }

    #[test]
    fn test_size_wins_when_both_thresholds_hold() {
        let mut buffer = create_test_buffer();
        buffer.add(input(1), 10).unwrap();
        backdate(&mut buffer, Duration::from_secs(10));

        assert_eq!(buffer.add(input(2), 5000).unwrap(), Some(FlushTrigger::Size));
    }

    #[test]
    fn test_should_flush_clears_stale_reason() {
        let mut buffer = create_test_buffer();
        buffer.add(input(1), 10).unwrap();

        let opened = buffer.opened_at;
        assert_eq!(
            buffer.should_flush_at(opened + Duration::from_secs(5)),
            Some(FlushTrigger::Time)
        );
        assert_eq!(buffer.should_flush_at(opened), None);
        assert_eq!(buffer.trigger(), None);
    }

    #[test]
    fn test_header_stability() {
        let mut buffer = create_test_buffer();
        buffer.add(json!({"c": 1, "a": 2, "b": 3}).into(), 1).unwrap();
        buffer.add(json!({"a": 4, "b": 5, "c": 6}).into(), 1).unwrap();
        buffer.add(json!({"b": 7, "d": 8}).into(), 1).unwrap();

        assert_eq!(buffer.header(), ["c", "a", "b"]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_force_flush() {
        let mut buffer = create_test_buffer();
        assert!(!buffer.force_flush());
        assert_eq!(buffer.trigger(), None);

        buffer.add(input(1), 10).unwrap();
        assert!(buffer.force_flush());
        assert_eq!(buffer.trigger(), Some(FlushTrigger::Final));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut buffer = create_test_buffer();

        buffer.reset();
        assert_eq!(buffer.total_bytes(), 0);
        assert!(buffer.header().is_empty());
        assert_eq!(buffer.trigger(), None);

        for i in 0..5 {
            buffer.add(input(i), 400).unwrap();
        }
        assert_eq!(buffer.trigger(), Some(FlushTrigger::Size));

        for _ in 0..2 {
            buffer.reset();
            assert!(buffer.is_empty());
            assert_eq!(buffer.total_bytes(), 0);
            assert!(buffer.header().is_empty());
            assert_eq!(buffer.trigger(), None);
        }
    }

    #[test]
    fn test_reset_reopens_window() {
        let mut buffer = create_test_buffer();
        backdate(&mut buffer, Duration::from_secs(30));
        assert!(buffer.age() >= Duration::from_secs(30));

        buffer.reset();
        assert!(buffer.age() < Duration::from_secs(1));
    }

    #[test]
    fn test_stats() {
        let mut buffer = create_test_buffer();
        buffer.add(input(1), 300).unwrap();
        buffer.add(input(2), 200).unwrap();

        let stats = buffer.stats();
        assert_eq!(stats.record_count, 2);
        assert_eq!(stats.total_bytes, 500);
        assert_eq!(stats.header_len, 2);
        assert_eq!(stats.trigger, None);
    }
}
