//! List command implementation

use anyhow::{Context, Result};

use rsm_core::registry;
use rsm_core::tmux::TmuxHost;
use rsm_core::RsmConfig;

use crate::output::format_sessions;

/// Execute the list command
pub async fn list_command(config: &RsmConfig) -> Result<()> {
    let host = TmuxHost::from_config(config);
    let sessions = registry::list_sessions(&host, &config.work_dir)
        .await
        .context("Failed to list sessions")?;

    println!("{}", format_sessions(&sessions));
    Ok(())
}
