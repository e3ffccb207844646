//! Launch hook abstraction

use std::net::SocketAddr;

use async_trait::async_trait;
use rsm_protocol::{ChannelPaths, SessionId};

use crate::error::LaunchError;
use crate::time;

/// Everything a launcher needs to start a terminal adapter for a session
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Session being launched
    pub session: SessionId,
    /// Channel socket and metadata file of the session
    pub paths: ChannelPaths,
    /// Whether the adapter should drive the terminal device in raw mode
    pub raw_terminal: bool,
    /// Line recorded in the metadata file (timestamp and remote address)
    pub info_line: String,
    /// Human-readable window name
    pub window_name: String,
}

impl LaunchRequest {
    /// Build the request for a connection accepted from `remote`
    pub fn new(
        session: SessionId,
        paths: ChannelPaths,
        remote: SocketAddr,
        raw_terminal: bool,
    ) -> Self {
        Self {
            session,
            paths,
            raw_terminal,
            info_line: time::info_line(remote),
            window_name: session.window_name(remote.ip()),
        }
    }
}

/// Starts a terminal adapter bound to a session's rendezvous channel.
///
/// Implementations must arrange that the info line is written to the
/// metadata file, that the adapter runs against `paths.socket` with the
/// requested mode, and that both files are removed once it exits, whatever
/// its exit status. `launch` returns once the adapter has been started; it
/// does not wait for it.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Start the adapter for `request`
    async fn launch(&self, request: &LaunchRequest) -> Result<(), LaunchError>;
}
