//! Pubsync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, error handling and logging setup for the pubsync workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`SyncError`] classifies every way a sync cycle can fail
//! - **Types**: records, envelopes and remote file fingerprints
//! - **Logging**: tracing subscriber initialisation
//!
//! # Example
//!
//! ```no_run
//! use pubsync_common::types::{Envelope, Record};
//!
//! let record = Record::new(1, "Alpha");
//! let envelope = Envelope::new(record, "none", 1_700_000_000_000_000_000);
//! let body = serde_json::to_string(&[envelope]).unwrap();
//! assert!(body.contains("\"pubid\":1"));
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, Severity, SyncError};
