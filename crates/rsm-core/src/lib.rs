//! rsm-core: Core abstractions and configuration for rsm
//!
//! This crate provides the configuration, error types, the interfaces to
//! the external session host and window launcher, the tmux implementation
//! of both, the metadata files written per session, and the control-plane
//! operations (list and kill) built on top of them.

pub mod config;
pub mod error;
pub mod metadata;
pub mod registry;
pub mod time;
pub mod tmux;
pub mod traits;

pub use config::RsmConfig;
pub use error::{ConfigError, HostError, LaunchError, RsmError};
pub use traits::{LaunchRequest, Launcher, SessionHost};
