//! Acceptor error types

use std::time::Duration;

use rsm_core::LaunchError;
use rsm_protocol::ProtocolError;
use thiserror::Error;

/// Errors that stop the acceptor from serving
#[derive(Error, Debug)]
pub enum ServeError {
    /// The listening socket could not be set up
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that end a single session before it is bridged.
///
/// These never stop the accept loop.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The rendezvous channel could not be created or claimed
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The terminal adapter could not be started
    #[error("Launch failed: {0}")]
    Launch(#[from] LaunchError),

    /// The terminal adapter never connected
    #[error("No terminal attached within {0:?}")]
    AttachTimeout(Duration),

    /// The acceptor shut down while waiting for the terminal adapter
    #[error("Shut down before a terminal attached")]
    Cancelled,
}
