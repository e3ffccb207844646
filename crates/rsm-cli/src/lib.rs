//! rsm: Command-line interface for the remote session multiplexer
//!
//! Provides the `rsm` binary: starting a port inside tmux, listing and
//! killing sessions, and the internal subcommands tmux runs on rsm's behalf
//! (the acceptor and the per-connection window).

pub mod commands;
pub mod output;
pub mod signal;
