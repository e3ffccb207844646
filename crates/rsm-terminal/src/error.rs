//! Terminal adapter error types

use rsm_protocol::ProtocolError;
use thiserror::Error;

/// Errors that end a terminal adapter before or while it relays
#[derive(Error, Debug)]
pub enum TerminalError {
    /// The rendezvous channel could not be claimed
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The terminal device could not be opened or configured
    #[error("Terminal setup failed: {0}")]
    Setup(#[source] std::io::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
