//! Artifact naming.
//!
//! `<prefix>/<yyyyMMdd-HHmmss-ffffff>-trigger-<reason>-records-<n>-size-<bytes>.<ext>`
//!
//! Downstream consumers scan by this pattern, so both the layout and the
//! microsecond timestamp precision are fixed.

use crate::buffer::FlushTrigger;
use crate::config::ArtifactFormat;
use crate::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S-%6f";
const TIMESTAMP_LEN: usize = 22;

/// Structured form of an artifact key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    /// Key prefix (no leading or trailing slash)
    pub prefix: String,
    /// Generation time, truncated to microseconds when parsed
    pub generated_at: DateTime<Utc>,
    /// Why the window was flushed
    pub trigger: FlushTrigger,
    /// Rows in the artifact
    pub record_count: usize,
    /// Aggregate raw payload bytes of the window
    pub total_bytes: u64,
    /// Body format
    pub format: ArtifactFormat,
}

impl ArtifactName {
    /// Full object key.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Parse a key produced by [`ArtifactName::key`].
    pub fn parse(key: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            Error::Serialization(format!("Invalid artifact name {}: {}", key, reason))
        };

        let (prefix, file) = match key.rsplit_once('/') {
            Some((prefix, file)) => (prefix, file),
            None => ("", key),
        };

        let (stem, ext) = file
            .rsplit_once('.')
            .ok_or_else(|| invalid("missing extension"))?;
        let format = match ext {
            "csv" => ArtifactFormat::Csv,
            "parquet" => ArtifactFormat::Parquet,
            _ => return Err(invalid("unknown extension")),
        };

        if stem.len() < TIMESTAMP_LEN || !stem.is_char_boundary(TIMESTAMP_LEN) {
            return Err(invalid("missing timestamp"));
        }
        let (timestamp, rest) = stem.split_at(TIMESTAMP_LEN);
        let generated_at = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
            .map_err(|_| invalid("bad timestamp"))?
            .and_utc();

        let rest = rest
            .strip_prefix("-trigger-")
            .ok_or_else(|| invalid("missing trigger"))?;
        let (trigger, rest) = rest
            .split_once("-records-")
            .ok_or_else(|| invalid("missing record count"))?;
        let (records, size) = rest
            .split_once("-size-")
            .ok_or_else(|| invalid("missing size"))?;

        Ok(Self {
            prefix: prefix.to_string(),
            generated_at,
            trigger: trigger.parse()?,
            record_count: records.parse().map_err(|_| invalid("bad record count"))?,
            total_bytes: size.parse().map_err(|_| invalid("bad size"))?,
            format,
        })
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.prefix.is_empty() {
            write!(f, "{}/", self.prefix)?;
        }
        write!(
            f,
            "{}-trigger-{}-records-{}-size-{}.{}",
            self.generated_at.format(TIMESTAMP_FORMAT),
            self.trigger,
            self.record_count,
            self.total_bytes,
            self.format.extension()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(prefix: &str) -> ArtifactName {
        ArtifactName {
            prefix: prefix.to_string(),
            generated_at: Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
                + chrono::Duration::microseconds(42),
            trigger: FlushTrigger::Size,
            record_count: 3,
            total_bytes: 1500,
            format: ArtifactFormat::Csv,
        }
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(
            sample("raw-data").key(),
            "raw-data/20240309-070501-000042-trigger-size-records-3-size-1500.csv"
        );
    }

    #[test]
    fn test_key_without_prefix() {
        assert_eq!(
            sample("").key(),
            "20240309-070501-000042-trigger-size-records-3-size-1500.csv"
        );
    }

    #[test]
    fn test_parse_key() {
        let parsed =
            ArtifactName::parse("a/b/20240309-070501-000042-trigger-final-records-12-size-99.parquet")
                .unwrap();
        assert_eq!(parsed.prefix, "a/b");
        assert_eq!(parsed.trigger, FlushTrigger::Final);
        assert_eq!(parsed.record_count, 12);
        assert_eq!(parsed.total_bytes, 99);
        assert_eq!(parsed.format, ArtifactFormat::Parquet);
        assert_eq!(parsed.generated_at, sample("").generated_at);
    }

    #[test]
    fn test_parse_rejects_foreign_keys() {
        for key in [
            "raw-data/readme.txt",
            "raw-data/notes.csv",
            "raw-data/20240309-070501-000042-trigger-size-records-3.csv",
            "raw-data/20240309-070501-000042-trigger-later-records-3-size-1.csv",
            "raw-data/2024xx09-070501-000042-trigger-size-records-3-size-1.csv",
            "raw-data/20240309-070501-000042-trigger-size-records-x-size-1.csv",
        ] {
            assert!(ArtifactName::parse(key).is_err(), "{} should not parse", key);
        }
    }
}
