//! rsm-protocol: Session plumbing for rsm
//!
//! This crate defines how an accepted network connection becomes a session:
//! the deterministic naming scheme shared with the tmux host, the
//! single-use rendezvous channel that hands a session to its terminal
//! adapter, and the byte bridge that forwards data between two endpoints.

pub mod bridge;
pub mod channel;
pub mod error;
pub mod naming;

pub use bridge::{bridge, forward, spawn_bridge, BridgeStats, CHUNK_SIZE};
pub use channel::{connect_channel, RendezvousChannel};
pub use error::ProtocolError;
pub use naming::{info_file_pattern, ChannelPaths, SessionId, SessionName};
