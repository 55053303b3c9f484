//! Shared domain types
//!
//! The wire names on [`Record`] and [`Envelope`] are fixed by the downstream
//! service and must not change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Size and modification time of the remote file, fetched fresh every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileFingerprint {
    pub size: i64,
    pub modified_at: DateTime<Utc>,
}

impl FileFingerprint {
    pub fn new(size: i64, modified_at: DateTime<Utc>) -> Self {
        Self { size, modified_at }
    }
}

/// Fingerprint of the file as of the last successful sync.
///
/// Starts at the zero value (size 0, Unix epoch) so the first real remote
/// file is always treated as changed. Nothing is persisted across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncBaseline {
    pub size: i64,
    pub modified_at: DateTime<Utc>,
}

impl Default for SyncBaseline {
    fn default() -> Self {
        Self {
            size: 0,
            modified_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl From<FileFingerprint> for SyncBaseline {
    fn from(fingerprint: FileFingerprint) -> Self {
        Self {
            size: fingerprint.size,
            modified_at: fingerprint.modified_at,
        }
    }
}

/// One well-formed `id,payload` line of the source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "pubid")]
    pub id: i64,
    #[serde(rename = "pubdata")]
    pub payload: String,
}

impl Record {
    pub fn new(id: i64, payload: impl Into<String>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }
}

/// Transport wrapper around a [`Record`] as posted to the insert endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Parse time in nanoseconds since the Unix epoch
    #[serde(rename = "lastupdate")]
    pub last_updated: i64,
    #[serde(rename = "metainfo")]
    pub meta: String,
    #[serde(rename = "schema")]
    pub record: Record,
}

impl Envelope {
    pub fn new(record: Record, meta: impl Into<String>, last_updated: i64) -> Self {
        Self {
            last_updated,
            meta: meta.into(),
            record,
        }
    }
}
