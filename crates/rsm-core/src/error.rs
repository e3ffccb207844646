//! Core error types for rsm

use std::path::PathBuf;

use rsm_protocol::ProtocolError;
use thiserror::Error;

/// Top-level error type for the rsm libraries
#[derive(Error, Debug)]
pub enum RsmError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Session host error
    #[error("Session host error: {0}")]
    Host(#[from] HostError),

    /// Window launch error
    #[error("Launch error: {0}")]
    Launch(#[from] LaunchError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by the external session host
#[derive(Error, Debug)]
pub enum HostError {
    /// The host binary could not be found
    #[error("{0} is not installed or not on PATH")]
    NotInstalled(String),

    /// The host binary could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A host command exited unsuccessfully
    #[error("`{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Errors raised while starting a terminal adapter for a session
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The host refused to open the window
    #[error(transparent)]
    Host(#[from] HostError),

    /// The adapter command line could not be built
    #[error("Cannot quote adapter command: {0}")]
    Command(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The work directory could not be created
    #[error("Failed to create work directory {path:?}: {source}")]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
