//! SFTP implementation of the remote connector
//!
//! Sessions use password authentication and a single configured cipher.
//!
//! # Security
//!
//! The server host key is accepted without verification, and nothing is
//! recorded for later comparison. Anyone able to intercept the connection
//! can impersonate the server and capture the password. Run this only on
//! networks where that trade-off is acceptable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pubsync_common::{types::FileFingerprint, Result, SyncError};
use russh::{cipher, client, Disconnect, Preferred};
use russh_sftp::{
    client::{error::Error as SftpError, SftpSession},
    protocol::{FileAttributes, StatusCode},
};
use std::{borrow::Cow, future::Future, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use super::{RemoteConnector, RemoteReader, RemoteSession};

/// Default bound on session setup and each SFTP request (in seconds)
pub const DEFAULT_SFTP_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the SFTP endpoint
#[derive(Debug, Clone)]
pub struct SftpSettings {
    /// `host:port` of the SFTP server
    pub addr: String,
    pub user: String,
    pub password: String,
    /// Single cipher to offer, e.g. `aes256-ctr`. `None` keeps the library defaults.
    pub cipher: Option<String>,
    /// Deadline for connect and for every request on the session
    pub timeout: Duration,
}

impl Default for SftpSettings {
    fn default() -> Self {
        Self {
            addr: "localhost:22".to_string(),
            user: String::new(),
            password: String::new(),
            cipher: None,
            timeout: Duration::from_secs(DEFAULT_SFTP_TIMEOUT_SECS),
        }
    }
}

/// Resolve an OpenSSH cipher name (`aes256-ctr`, `3des-cbc`, ...) to one
/// russh can negotiate. Unencrypted transports are refused.
pub fn cipher_name(name: &str) -> Result<cipher::Name> {
    let name = name.trim();
    match cipher::Name::try_from(name) {
        Ok(cipher) if cipher != cipher::NONE && cipher != cipher::CLEAR => Ok(cipher),
        _ => Err(SyncError::config(format!("Unsupported SFTP cipher: {}", name))),
    }
}

/// Client handler that trusts whatever host key the server presents
struct AcceptAnyHostKey;

impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        debug!(
            algorithm = %server_public_key.algorithm(),
            "Accepting unverified server host key"
        );
        Ok(true)
    }
}

/// Opens password-authenticated SFTP sessions
pub struct SftpConnector {
    settings: SftpSettings,
    client_config: Arc<client::Config>,
}

impl SftpConnector {
    /// Create a connector. Fails if the configured cipher is unknown.
    pub fn new(settings: SftpSettings) -> Result<Self> {
        let mut preferred = Preferred::default();
        if let Some(ref name) = settings.cipher {
            preferred.cipher = Cow::Owned(vec![cipher_name(name)?]);
        }

        let client_config = Arc::new(client::Config {
            inactivity_timeout: Some(settings.timeout),
            preferred,
            ..Default::default()
        });

        Ok(Self {
            settings,
            client_config,
        })
    }

    async fn open_session(&self) -> Result<SftpRemoteSession> {
        let addr = self.settings.addr.as_str();
        debug!("Connecting to SFTP server: {}", addr);

        let mut handle = client::connect(self.client_config.clone(), addr, AcceptAnyHostKey)
            .await
            .map_err(|e| SyncError::connection(addr, e))?;

        debug!("Logging in as: {}", self.settings.user);
        let auth = handle
            .authenticate_password(self.settings.user.clone(), self.settings.password.clone())
            .await
            .map_err(|e| SyncError::connection(addr, e))?;
        if !auth.success() {
            return Err(SyncError::Auth {
                user: self.settings.user.clone(),
            });
        }

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| SyncError::connection(addr, e))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| SyncError::connection(addr, e))?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| SyncError::connection(addr, e))?;

        Ok(SftpRemoteSession {
            handle,
            sftp,
            timeout: self.settings.timeout,
        })
    }
}

#[async_trait]
impl RemoteConnector for SftpConnector {
    async fn connect(&self) -> Result<Box<dyn RemoteSession>> {
        let session =
            with_deadline("SFTP connect", self.settings.timeout, self.open_session()).await?;
        info!("Connected to sftp server {}", self.settings.addr);
        Ok(Box::new(session))
    }
}

struct SftpRemoteSession {
    handle: client::Handle<AcceptAnyHostKey>,
    sftp: SftpSession,
    timeout: Duration,
}

#[async_trait]
impl RemoteSession for SftpRemoteSession {
    async fn stat(&mut self, path: &str) -> Result<FileFingerprint> {
        let sftp = &self.sftp;
        let attrs = with_deadline("SFTP stat", self.timeout, async {
            sftp.metadata(path).await.map_err(|e| classify(path, e))
        })
        .await?;
        Ok(fingerprint(&attrs))
    }

    async fn open(&mut self, path: &str) -> Result<RemoteReader> {
        let sftp = &self.sftp;
        let file = with_deadline("SFTP open", self.timeout, async {
            sftp.open(path).await.map_err(|e| classify(path, e))
        })
        .await?;
        Ok(Box::pin(file))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        if let Err(e) = self.sftp.close().await {
            warn!("Failed to close SFTP subsystem gracefully: {}", e);
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "cycle complete", "en")
            .await
            .map_err(SyncError::remote)
    }
}

fn classify(path: &str, err: SftpError) -> SyncError {
    match err {
        SftpError::Status(ref status) if status.status_code == StatusCode::NoSuchFile => {
            SyncError::NotFound(path.to_string())
        },
        other => SyncError::remote(format!("{}: {}", path, other)),
    }
}

/// Build a fingerprint from SFTP attributes. Missing fields fall back to the
/// zero baseline values.
fn fingerprint(attrs: &FileAttributes) -> FileFingerprint {
    let size = attrs
        .size
        .map(|s| i64::try_from(s).unwrap_or(i64::MAX))
        .unwrap_or(0);
    let modified_at = attrs
        .mtime
        .and_then(|t| DateTime::<Utc>::from_timestamp(i64::from(t), 0))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    FileFingerprint::new(size, modified_at)
}

async fn with_deadline<T>(
    operation: &'static str,
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| SyncError::Timeout {
            operation,
            secs: limit.as_secs(),
        })?
}
