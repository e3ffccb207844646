//! Per-connection session record

use std::fmt;
use std::net::SocketAddr;

use chrono::{DateTime, Local};
use rsm_protocol::{ChannelPaths, SessionId};

/// Lifecycle of an accepted connection.
///
/// States only move forward; a session is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    /// Connection accepted, nothing set up yet
    Accepted,
    /// Rendezvous channel created and terminal adapter launched
    ChannelOpen,
    /// Adapter connected and bytes are being forwarded
    Bridged,
    /// Forwarding ended or setup was abandoned
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Accepted => "accepted",
            SessionState::ChannelOpen => "channel-open",
            SessionState::Bridged => "bridged",
            SessionState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// One accepted connection
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub remote: SocketAddr,
    pub accepted_at: DateTime<Local>,
    pub paths: ChannelPaths,
    state: SessionState,
}

impl Session {
    pub fn new(id: SessionId, remote: SocketAddr, paths: ChannelPaths) -> Self {
        tracing::debug!(session = %id, %remote, "Session accepted");
        Self {
            id,
            remote,
            accepted_at: Local::now(),
            paths,
            state: SessionState::Accepted,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `next`. Returns false, leaving the state unchanged, if `next`
    /// is not ahead of the current state.
    pub fn advance(&mut self, next: SessionState) -> bool {
        if next <= self.state {
            tracing::warn!(
                session = %self.id,
                "Ignoring transition {} -> {}",
                self.state,
                next
            );
            return false;
        }

        tracing::debug!(session = %self.id, "{} -> {}", self.state, next);
        self.state = next;
        true
    }
}
