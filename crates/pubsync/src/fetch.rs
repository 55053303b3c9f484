//! Streams the remote file into the local staging location

use pubsync_common::{Result, SyncError};
use std::path::Path;
use tokio::{
    fs::File,
    io::{AsyncRead, AsyncWriteExt, BufWriter},
};
use tracing::debug;

/// Copy `source` to `destination` until EOF, truncating any existing file.
///
/// Returns the number of bytes written. A failure mid-copy may leave a
/// partial file on disk; it is still reported as an error.
pub async fn fetch<R>(source: &mut R, destination: &Path) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let dest = destination.display().to_string();
    let file = File::create(destination)
        .await
        .map_err(|e| SyncError::io(&dest, e))?;
    let mut writer = BufWriter::new(file);

    let written = tokio::io::copy(source, &mut writer)
        .await
        .map_err(|e| SyncError::io(&dest, e))?;
    writer.flush().await.map_err(|e| SyncError::io(&dest, e))?;
    writer
        .into_inner()
        .sync_all()
        .await
        .map_err(|e| SyncError::io(&dest, e))?;

    debug!("Copied {} bytes to {}", written, dest);
    Ok(written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    #[tokio::test]
    async fn test_fetch_writes_all_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("pubcodes.csv");

        let mut source: &[u8] = b"1,Alpha\n2,Beta\n";
        let written = fetch(&mut source, &dest).await.unwrap();

        assert_eq!(written, 15);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "1,Alpha\n2,Beta\n");
    }

    #[tokio::test]
    async fn test_fetch_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("pubcodes.csv");
        std::fs::write(&dest, "stale contents that are longer than the new file").unwrap();

        let mut source: &[u8] = b"9,New\n";
        fetch(&mut source, &dest).await.unwrap();

        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "9,New\n");
    }

    #[tokio::test]
    async fn test_fetch_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("no-such-dir").join("pubcodes.csv");

        let mut source: &[u8] = b"1,Alpha\n";
        let err = fetch(&mut source, &dest).await.unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }));
    }

    /// Yields some bytes, then fails
    struct BrokenStream {
        sent: bool,
    }

    impl AsyncRead for BrokenStream {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.sent {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "channel closed",
                )));
            }
            self.sent = true;
            buf.put_slice(b"1,Alpha\n");
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_fetch_reports_partial_copy_as_error() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("pubcodes.csv");

        let mut source = BrokenStream { sent: false };
        let err = fetch(&mut source, &dest).await.unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }));
    }
}
