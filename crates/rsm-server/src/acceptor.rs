//! Connection acceptor
//!
//! Listens on one TCP port. For each accepted connection it allocates a
//! session id, creates the session's rendezvous channel, asks the launcher
//! to start a terminal adapter for it, waits (bounded) for the adapter to
//! claim the channel and then bridges the connection with the channel on
//! its own task. Anything that goes wrong before the bridge starts is
//! confined to that one session.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rsm_core::metadata::remove_session_files;
use rsm_core::{LaunchRequest, Launcher, RsmConfig};
use rsm_protocol::{spawn_bridge, ProtocolError, RendezvousChannel, SessionId, SessionName};
use tokio::net::{TcpListener, TcpSocket, TcpStream, UnixStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::{ServeError, SessionError};
use crate::session::{Session, SessionState};

/// Pending connections the kernel queues for the listener
const LISTEN_BACKLOG: u32 = 1024;

/// Settings shared by every session of one acceptor
struct Shared {
    config: RsmConfig,
    raw_terminal: bool,
    launcher: Arc<dyn Launcher>,
}

/// Accept loop for one listening port
pub struct Acceptor {
    listener: TcpListener,
    port: u16,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    sessions: TaskTracker,
    counter: u64,
}

impl Acceptor {
    /// Bind `<config.bind_host>:<port>` with address reuse enabled.
    ///
    /// Port 0 picks a free port; [`Acceptor::port`] reports the one chosen.
    /// `cancel` stops the accept loop and any session still waiting for its
    /// terminal adapter. Bridged sessions are not affected by it.
    pub fn bind(
        config: RsmConfig,
        port: u16,
        raw_terminal: bool,
        launcher: Arc<dyn Launcher>,
        cancel: CancellationToken,
    ) -> Result<Self, ServeError> {
        let socket_addr = config.bind_address(port).map_err(|e| ServeError::Bind {
            addr: format!("{}:{}", config.bind_host, port),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
        })?;
        let bind_error = |source| ServeError::Bind {
            addr: socket_addr.to_string(),
            source,
        };

        let socket = if socket_addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_error)?;
        socket.set_reuseaddr(true).map_err(bind_error)?;
        socket.bind(socket_addr).map_err(bind_error)?;
        let listener = socket.listen(LISTEN_BACKLOG).map_err(bind_error)?;

        let port = listener.local_addr()?.port();
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            port,
            shared: Arc::new(Shared {
                config,
                raw_terminal,
                launcher,
            }),
            cancel,
            sessions: TaskTracker::new(),
            counter: 0,
        })
    }

    /// Listening port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Host session this acceptor serves (`rsm/<port>`)
    pub fn session_name(&self) -> SessionName {
        SessionName::new(self.port)
    }

    /// Tracker of the session tasks. It is closed when [`Acceptor::run`]
    /// returns, so `wait()` on it completes once every session has ended.
    pub fn sessions(&self) -> TaskTracker {
        self.sessions.clone()
    }

    /// Accept connections until cancelled, then close the listener.
    pub async fn run(mut self) -> Result<(), ServeError> {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Acceptor on port {} shutting down", self.port);
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, remote)) => self.handle_connection(stream, remote),
                        Err(e) => tracing::error!("Failed to accept connection: {}", e),
                    }
                }
            }
        }

        self.sessions.close();
        Ok(())
    }

    fn handle_connection(&mut self, stream: TcpStream, remote: SocketAddr) {
        self.counter += 1;
        let id = SessionId::new(self.port, self.counter);
        let paths = self.shared.config.channel_paths(id);
        let mut session = Session::new(id, remote, paths);
        tracing::info!(session = %id, "New connection from {}", remote);

        let channel = match open_channel(&mut session) {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!(session = %id, "Dropping connection: {}", e);
                session.advance(SessionState::Terminated);
                return;
            }
        };

        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.child_token();
        self.sessions
            .spawn(run_session(shared, session, stream, channel, cancel));
    }
}

/// Create the session's rendezvous channel, moving it to `ChannelOpen`
fn open_channel(session: &mut Session) -> Result<RendezvousChannel, ProtocolError> {
    let channel = RendezvousChannel::bind(&session.paths.socket)?;
    session.advance(SessionState::ChannelOpen);
    Ok(channel)
}

async fn run_session(
    shared: Arc<Shared>,
    mut session: Session,
    stream: TcpStream,
    channel: RendezvousChannel,
    cancel: CancellationToken,
) {
    let adapter = match establish(&shared, &session, channel, &cancel).await {
        Ok(adapter) => adapter,
        Err(e) => {
            tracing::warn!(session = %session.id, "Session abandoned: {}", e);
            remove_session_files(&session.paths);
            session.advance(SessionState::Terminated);
            return;
        }
    };

    session.advance(SessionState::Bridged);
    let bridge = spawn_bridge(
        stream,
        adapter,
        shared.config.chunk_size,
        CancellationToken::new(),
    );

    match bridge.await {
        Ok(stats) => tracing::info!(
            session = %session.id,
            received = stats.a_to_b,
            sent = stats.b_to_a,
            "Connection from {} closed",
            session.remote
        ),
        Err(e) => tracing::warn!(session = %session.id, "Bridge task failed: {}", e),
    }
    session.advance(SessionState::Terminated);
}

/// Launch the terminal adapter and wait for it to claim the channel
async fn establish(
    shared: &Shared,
    session: &Session,
    channel: RendezvousChannel,
    cancel: &CancellationToken,
) -> Result<UnixStream, SessionError> {
    let request = LaunchRequest::new(
        session.id,
        session.paths.clone(),
        session.remote,
        shared.raw_terminal,
    );
    shared.launcher.launch(&request).await?;

    wait_for_adapter(channel, shared.config.attach_timeout, cancel).await
}

async fn wait_for_adapter(
    channel: RendezvousChannel,
    attach_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<UnixStream, SessionError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(SessionError::Cancelled),
        result = tokio::time::timeout(attach_timeout, channel.accept_one()) => match result {
            Ok(stream) => Ok(stream?),
            Err(_) => Err(SessionError::AttachTimeout(attach_timeout)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsm_protocol::ChannelPaths;

    fn session_in(dir: &std::path::Path) -> Session {
        let id = SessionId::new(9001, 1);
        let remote: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        Session::new(id, remote, ChannelPaths::new(dir, id))
    }

    #[tokio::test]
    async fn test_channel_bind_opens_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path());
        assert_eq!(session.state(), SessionState::Accepted);

        let _channel = open_channel(&mut session).unwrap();
        assert_eq!(session.state(), SessionState::ChannelOpen);
        assert!(session.paths.socket.exists());
    }

    #[tokio::test]
    async fn test_failed_channel_bind_leaves_session_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir.path().join("missing"));

        assert!(open_channel(&mut session).is_err());
        assert_eq!(session.state(), SessionState::Accepted);
    }
}
