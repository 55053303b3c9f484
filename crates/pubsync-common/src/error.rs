//! Error types for pubsync
//!
//! Every failure inside a sync cycle is fatal for that cycle only. The
//! scheduler keeps running and the next tick retries from scratch.

use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// How loudly an error should be reported to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Expected condition, the cycle ends without side effects
    Warning,
    /// The cycle failed, downstream state is unchanged
    Error,
    /// Downstream data is missing until a later cycle succeeds
    Critical,
}

/// Main error type for sync cycles
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Connection to {addr} failed: {message}")]
    Connection { addr: String, message: String },

    #[error("Authentication rejected for user '{user}'")]
    Auth { user: String },

    #[error("Remote file not found: {0}")]
    NotFound(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote IO error: {0}")]
    Remote(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("Delete-all request failed: {0}")]
    DeleteAll(String),

    #[error("Insert-all request failed: {0}")]
    InsertAll(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid schedule '{expression}': {message}")]
    Schedule { expression: String, message: String },
}

impl SyncError {
    /// Create a connection error
    pub fn connection(addr: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Connection {
            addr: addr.into(),
            message: message.to_string(),
        }
    }

    /// Create a local or remote file IO error tied to a path
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a remote protocol error
    pub fn remote(message: impl std::fmt::Display) -> Self {
        Self::Remote(message.to_string())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::NotFound(_) => Severity::Warning,
            Self::InsertAll(_) => Severity::Critical,
            _ => Severity::Error,
        }
    }
}
