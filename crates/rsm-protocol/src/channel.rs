//! Rendezvous channel
//!
//! A Unix domain socket created by the acceptor for one session. It accepts
//! exactly one client: [`RendezvousChannel::accept_one`] consumes the
//! channel, so the listening socket is closed as soon as the terminal
//! adapter has connected and later connection attempts are refused.

use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};

use crate::error::ProtocolError;

/// Server side of a session's single-use rendezvous channel
#[derive(Debug)]
pub struct RendezvousChannel {
    listener: UnixListener,
    path: PathBuf,
}

impl RendezvousChannel {
    /// Create the channel at `path`.
    ///
    /// A socket file left at `path` by an earlier process is replaced; any
    /// other kind of file is left alone and the bind fails.
    pub fn bind(path: impl Into<PathBuf>) -> Result<Self, ProtocolError> {
        let path = path.into();

        remove_stale_socket(&path).map_err(|source| ProtocolError::ChannelBind {
            path: path.clone(),
            source,
        })?;

        let listener = UnixListener::bind(&path).map_err(|source| ProtocolError::ChannelBind {
            path: path.clone(),
            source,
        })?;

        tracing::debug!("Rendezvous channel bound at {:?}", path);
        Ok(Self { listener, path })
    }

    /// Filesystem path of the channel
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the single client and close the listening socket.
    pub async fn accept_one(self) -> Result<UnixStream, ProtocolError> {
        let Self { listener, path } = self;

        let (stream, _) = listener
            .accept()
            .await
            .map_err(|source| ProtocolError::ChannelAccept {
                path: path.clone(),
                source,
            })?;

        drop(listener);
        tracing::debug!("Rendezvous channel {:?} claimed", path);
        Ok(stream)
    }
}

/// Connect to a rendezvous channel as its one client, then unlink its name.
pub async fn connect_channel(path: &Path) -> Result<UnixStream, ProtocolError> {
    let stream = UnixStream::connect(path)
        .await
        .map_err(|source| ProtocolError::ChannelConnect {
            path: path.to_path_buf(),
            source,
        })?;

    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to unlink rendezvous channel {:?}: {}", path, e),
    }

    Ok(stream)
}

fn remove_stale_socket(path: &Path) -> io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            tracing::debug!("Removing stale channel socket {:?}", path);
            std::fs::remove_file(path)
        }
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_single_client_is_accepted_and_name_unlinked() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client_09001_000001.sock");
        let channel = RendezvousChannel::bind(&path).unwrap();
        assert!(path.exists());

        let accept = tokio::spawn(channel.accept_one());
        let mut client = connect_channel(&path).await.unwrap();
        let mut server = accept.await.unwrap().unwrap();

        assert!(!path.exists());

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn test_second_client_is_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client_09001_000002.sock");
        let channel = RendezvousChannel::bind(&path).unwrap();

        // Connect without unlinking so the name is still present afterwards.
        let accept = tokio::spawn(channel.accept_one());
        let _first = UnixStream::connect(&path).await.unwrap();
        let _server = accept.await.unwrap().unwrap();

        assert!(path.exists());
        let second = timeout(Duration::from_secs(2), UnixStream::connect(&path))
            .await
            .expect("connect should not hang");
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_socket() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client_09001_000003.sock");

        let stale = RendezvousChannel::bind(&path).unwrap();
        drop(stale);
        assert!(path.exists());

        let channel = RendezvousChannel::bind(&path).unwrap();
        assert_eq!(channel.path(), path.as_path());
    }

    #[tokio::test]
    async fn test_bind_refuses_to_clobber_regular_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client_09001_000004.sock");
        std::fs::write(&path, b"not a socket").unwrap();

        let err = RendezvousChannel::bind(&path).unwrap_err();
        assert!(matches!(err, ProtocolError::ChannelBind { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"not a socket");
    }

    #[tokio::test]
    async fn test_connect_to_missing_channel_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.sock");

        let err = connect_channel(&path).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ChannelConnect { .. }));
    }
}
