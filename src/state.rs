use std::time::SystemTime;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// A point in time with its timezone offset, as stored in either metadata store.
pub type Timestamp = DateTime<FixedOffset>;

/// What a metadata store last knew about a synced file.
///
/// `(bucket, filename)` identifies the record; a store holds at most one per key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub bucket: String,
    pub filename: String,
    /// Lowercase hex content digest.
    pub hash: String,
    /// `None` when the record has never been given a timestamp.
    pub last_modified: Option<Timestamp>,
}

impl FileRecord {
    pub fn new(bucket: &str, filename: &str, hash: &str, last_modified: Option<Timestamp>) -> Self {
        FileRecord {
            bucket: bucket.to_owned(),
            filename: filename.to_owned(),
            hash: hash.to_owned(),
            last_modified,
        }
    }
}

/// Parses an RFC 3339 timestamp, keeping its offset.
pub fn parse_timestamp(value: &str) -> Result<Timestamp, SyncError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map_err(|_| SyncError::InvalidTimestamp(value.to_owned()))
}

/// Parses an optional stored timestamp; empty strings count as absent.
pub fn parse_optional_timestamp(value: Option<&str>) -> Result<Option<Timestamp>, SyncError> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_timestamp(v).map(Some),
        _ => Ok(None),
    }
}

pub fn format_timestamp(timestamp: &Timestamp) -> String {
    timestamp.to_rfc3339()
}

/// Converts a filesystem time into a UTC timestamp.
pub fn timestamp_from_system_time(time: SystemTime) -> Timestamp {
    let utc: DateTime<Utc> = time.into();
    utc.into()
}

/// The newest of the given timestamps, ignoring absent ones.
pub fn newest<'a, I>(timestamps: I) -> Option<Timestamp>
where
    I: IntoIterator<Item = Option<&'a Timestamp>>,
{
    timestamps.into_iter().flatten().max().cloned()
}
