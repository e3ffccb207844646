//! Protocol error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while setting up or using a session channel
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The rendezvous channel could not be created
    #[error("Failed to bind rendezvous channel {path:?}: {source}")]
    ChannelBind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The rendezvous channel failed while waiting for its client
    #[error("Failed to accept on rendezvous channel {path:?}: {source}")]
    ChannelAccept {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Connecting to a rendezvous channel failed
    #[error("Failed to connect to rendezvous channel {path:?}: {source}")]
    ChannelConnect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
