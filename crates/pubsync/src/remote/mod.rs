//! Remote file-transfer access
//!
//! The pipeline talks to the remote side through [`RemoteConnector`] and
//! [`RemoteSession`] so that the SFTP implementation in [`sftp`] can be
//! swapped for an in-memory one in tests.

pub mod sftp;

use async_trait::async_trait;
use pubsync_common::{types::FileFingerprint, Result};
use std::pin::Pin;
use tokio::io::AsyncRead;

pub use sftp::{SftpConnector, SftpSettings};

/// Byte stream over an open remote file
pub type RemoteReader = Pin<Box<dyn AsyncRead + Send>>;

/// Opens authenticated sessions to the remote endpoint
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    /// Establish a new session. Fails with `Connection`, `Auth` or `Timeout`.
    async fn connect(&self) -> Result<Box<dyn RemoteSession>>;
}

/// One authenticated session, scoped to a single cycle
#[async_trait]
pub trait RemoteSession: Send {
    /// Size and modification time of `path`, or `NotFound`
    async fn stat(&mut self, path: &str) -> Result<FileFingerprint>;

    /// Open `path` for reading
    async fn open(&mut self, path: &str) -> Result<RemoteReader>;

    /// Release the session. Called once at the end of every cycle.
    async fn close(self: Box<Self>) -> Result<()>;
}
