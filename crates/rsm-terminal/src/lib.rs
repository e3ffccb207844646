//! rsm-terminal: The terminal side of an rsm session
//!
//! The terminal adapter runs inside the window opened for a session. It
//! claims the session's rendezvous channel, switches the local terminal to
//! raw or cbreak mode and relays bytes between the two until either side
//! closes, restoring the terminal on every way out.

pub mod adapter;
pub mod device;
pub mod error;
pub mod mode;

pub use adapter::{attach_stdio, attach_terminal, relay, run_adapter, AdapterOptions, RelayStats};
pub use device::{StdioStream, TerminalFd};
pub use error::TerminalError;
pub use mode::{FlagsGuard, TerminalGuard, TerminalMode};
