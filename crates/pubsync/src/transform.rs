//! Staged file parser
//!
//! # File Format
//! UTF-8 text, one record per line, `id,payload` split on the first comma:
//! ```text
//! 1,Alpha
//! 2,Beta, with a comma
//! ```
//! Malformed lines are skipped with a warning and never abort the parse.

use chrono::Utc;
use pubsync_common::{
    types::{Envelope, Record},
    Result, SyncError,
};
use std::path::Path;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// Metadata tag stamped on every envelope unless configured otherwise
pub const DEFAULT_META_INFO: &str = "none";

/// Why a line was rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedLine {
    #[error("line {0}: missing ',' separator")]
    MissingSeparator(usize),
    #[error("line {line}: id '{id}' is not an integer")]
    InvalidId { line: usize, id: String },
    #[error("line {0}: not valid UTF-8")]
    InvalidUtf8(usize),
}

/// Result of parsing the staged file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParseReport {
    /// Records in file order
    pub records: Vec<Record>,
    /// Number of lines skipped as malformed
    pub malformed: usize,
}

/// Parse a single line into a record
pub fn parse_line(line: &str, line_num: usize) -> std::result::Result<Record, MalformedLine> {
    let (id, payload) = line
        .split_once(',')
        .ok_or(MalformedLine::MissingSeparator(line_num))?;

    let id = id.trim();
    let id: i64 = id.parse().map_err(|_| MalformedLine::InvalidId {
        line: line_num,
        id: id.to_string(),
    })?;

    Ok(Record::new(id, payload))
}

/// Parse in-memory content with the same rules as [`parse`]
pub fn parse_content(content: &str) -> ParseReport {
    let mut report = ParseReport::default();
    for (idx, line) in content.lines().enumerate() {
        accept(&mut report, parse_line(line, idx + 1));
    }
    report
}

/// Parse the staged file at `path`.
///
/// A missing file yields an empty report, the same as an empty file. Any
/// other read failure is an IO error.
pub async fn parse(path: &Path) -> Result<ParseReport> {
    let path_str = path.display().to_string();
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Staged file {} does not exist, treating as empty", path_str);
            return Ok(ParseReport::default());
        },
        Err(e) => return Err(SyncError::io(path_str, e)),
    };

    let mut report = ParseReport::default();
    let mut segments = BufReader::new(file).split(b'\n');
    let mut line_num = 0;

    while let Some(mut raw) = segments
        .next_segment()
        .await
        .map_err(|e| SyncError::io(&path_str, e))?
    {
        line_num += 1;
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        let parsed = match std::str::from_utf8(&raw) {
            Ok(line) => parse_line(line, line_num),
            Err(_) => Err(MalformedLine::InvalidUtf8(line_num)),
        };
        accept(&mut report, parsed);
    }

    debug!(
        "Parsed {} records from {} ({} malformed)",
        report.records.len(),
        path_str,
        report.malformed
    );
    Ok(report)
}

fn accept(report: &mut ParseReport, parsed: std::result::Result<Record, MalformedLine>) {
    match parsed {
        Ok(record) => report.records.push(record),
        Err(e) => {
            warn!("Skipping malformed record: {}", e);
            report.malformed += 1;
        },
    }
}

/// Wrap records in envelopes stamped with the current time and `meta`
pub fn wrap(records: Vec<Record>, meta: &str) -> Vec<Envelope> {
    records
        .into_iter()
        .map(|record| {
            let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
            Envelope::new(record, meta, now)
        })
        .collect()
}
