//! Common test utilities for pubsync integration tests
//!
//! In-memory stand-ins for the two external systems of a sync cycle:
//!
//! - [`MemoryConnector`]: a remote endpoint serving one file, with call counters
//! - [`RecordingDownstream`]: a downstream service that records every call
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{MemoryConnector, RecordingDownstream};
//!
//! let remote = MemoryConnector::with_file(b"1,Alpha\n", 8, 1_700_000_000);
//! let downstream = RecordingDownstream::new();
//! ```
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pubsync::{
    client::Downstream,
    pipeline::CycleSettings,
    remote::{RemoteConnector, RemoteReader, RemoteSession},
};
use pubsync_common::{
    types::{Envelope, FileFingerprint},
    Result, SyncError,
};
use std::{
    path::Path,
    sync::{Arc, Mutex},
};

/// Remote path used by every test
pub const REMOTE_PATH: &str = "PFT/pubcodes.csv";

pub fn fingerprint(size: i64, mtime: i64) -> FileFingerprint {
    let modified_at = DateTime::<Utc>::from_timestamp(mtime, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    FileFingerprint::new(size, modified_at)
}

pub fn cycle_settings(staging_dir: &Path) -> CycleSettings {
    CycleSettings {
        remote_path: REMOTE_PATH.to_string(),
        staging_path: staging_dir.join("pubcodes.csv"),
        meta_info: "none".to_string(),
    }
}

// ============================================================================
// Remote
// ============================================================================

#[derive(Debug, Default)]
pub struct RemoteState {
    /// `None` means the file does not exist
    pub file: Option<(FileFingerprint, Vec<u8>)>,
    pub refuse_connect: bool,
    pub connects: usize,
    pub stats: usize,
    pub opens: usize,
    pub closes: usize,
}

/// Remote endpoint serving a single in-memory file
#[derive(Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<RemoteState>>,
}

impl MemoryConnector {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_file(content: &[u8], size: i64, mtime: i64) -> Self {
        let connector = Self::default();
        connector.publish(content, size, mtime);
        connector
    }

    /// Replace the served file
    pub fn publish(&self, content: &[u8], size: i64, mtime: i64) {
        self.state.lock().unwrap().file = Some((fingerprint(size, mtime), content.to_vec()));
    }

    pub fn remove(&self) {
        self.state.lock().unwrap().file = None;
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_connect = refuse;
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn stats(&self) -> usize {
        self.state.lock().unwrap().stats
    }

    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

#[async_trait]
impl RemoteConnector for MemoryConnector {
    async fn connect(&self) -> Result<Box<dyn RemoteSession>> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_connect {
            return Err(SyncError::connection("memory:22", "connection refused"));
        }
        state.connects += 1;
        Ok(Box::new(MemorySession {
            state: self.state.clone(),
        }))
    }
}

struct MemorySession {
    state: Arc<Mutex<RemoteState>>,
}

#[async_trait]
impl RemoteSession for MemorySession {
    async fn stat(&mut self, path: &str) -> Result<FileFingerprint> {
        let mut state = self.state.lock().unwrap();
        state.stats += 1;
        match state.file {
            Some((fingerprint, _)) if path == REMOTE_PATH => Ok(fingerprint),
            _ => Err(SyncError::NotFound(path.to_string())),
        }
    }

    async fn open(&mut self, path: &str) -> Result<RemoteReader> {
        let mut state = self.state.lock().unwrap();
        state.opens += 1;
        match state.file {
            Some((_, ref content)) if path == REMOTE_PATH => {
                Ok(Box::pin(std::io::Cursor::new(content.clone())))
            },
            _ => Err(SyncError::NotFound(path.to_string())),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

// ============================================================================
// Downstream
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DeleteAll,
    InsertAll(Vec<Envelope>),
}

#[derive(Debug, Default)]
struct DownstreamState {
    calls: Vec<Call>,
    fail_delete: bool,
    fail_insert: bool,
}

/// Downstream service that records calls and can be told to fail
#[derive(Clone, Default)]
pub struct RecordingDownstream {
    state: Arc<Mutex<DownstreamState>>,
}

impl RecordingDownstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_delete(&self, fail: bool) {
        self.state.lock().unwrap().fail_delete = fail;
    }

    pub fn fail_insert(&self, fail: bool) {
        self.state.lock().unwrap().fail_insert = fail;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

#[async_trait]
impl Downstream for RecordingDownstream {
    async fn delete_all(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::DeleteAll);
        if state.fail_delete {
            return Err(SyncError::DeleteAll("HTTP 500 Internal Server Error".to_string()));
        }
        Ok(())
    }

    async fn insert_all(&self, envelopes: &[Envelope]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::InsertAll(envelopes.to_vec()));
        if state.fail_insert {
            return Err(SyncError::InsertAll("HTTP 503 Service Unavailable".to_string()));
        }
        Ok(())
    }
}
