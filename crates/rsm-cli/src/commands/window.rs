//! Window command: what tmux runs in each new session window

use std::path::Path;

use anyhow::{Context, Result};

use rsm_core::metadata::{write_info_line, SessionFilesGuard};
use rsm_core::RsmConfig;
use rsm_protocol::ChannelPaths;

use super::interact_command;

/// Record `info` in the session's metadata file, show it, run the terminal
/// adapter, and remove the session's files however the adapter ends
pub async fn window_command(
    config: &RsmConfig,
    socket: &Path,
    info: &str,
    raw_terminal: bool,
) -> Result<()> {
    let files = SessionFilesGuard::new(ChannelPaths::from_socket(socket));

    write_info_line(&files.paths().info, info)
        .with_context(|| format!("Failed to write {}", files.paths().info.display()))?;
    println!("{}", info);

    interact_command(config, socket, raw_terminal).await
}
