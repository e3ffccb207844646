//! Interfaces to the collaborators around the session core
//!
//! The session host keeps sessions alive and visible to humans; the
//! launcher opens the interactive window that runs a terminal adapter for a
//! freshly accepted connection. tmux implements both (see [`crate::tmux`]);
//! tests substitute in-memory fakes.

mod host;
mod launcher;

pub use host::SessionHost;
pub use launcher::{LaunchRequest, Launcher};
