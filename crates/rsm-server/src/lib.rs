//! rsm-server: Connection acceptor for rsm
//!
//! The acceptor listens on one TCP port. Every accepted connection gets a
//! rendezvous channel in the work directory and a terminal adapter started
//! through a [`Launcher`](rsm_core::Launcher); once the adapter claims the
//! channel, a byte bridge pairs it with the connection on its own task.

pub mod acceptor;
pub mod error;
pub mod session;

pub use acceptor::Acceptor;
pub use error::{ServeError, SessionError};
pub use session::{Session, SessionState};
