//! Kill command implementation

use anyhow::{Context, Result};

use rsm_core::registry::{self, KillOutcome};
use rsm_core::tmux::TmuxHost;
use rsm_core::RsmConfig;

use crate::output::{print_info, print_success, print_warning, NO_OPEN_PORTS};

/// Execute the kill command for one port, or for every port when `port` is
/// `None`. Missing sessions are reported, not treated as failures.
pub async fn kill_command(config: &RsmConfig, port: Option<u16>) -> Result<()> {
    let host = TmuxHost::from_config(config);

    let outcomes = match port {
        Some(port) => vec![registry::kill_port(&host, &config.work_dir, port)
            .await
            .with_context(|| format!("Failed to kill session for port {}", port))?],
        None => registry::kill_all(&host, &config.work_dir)
            .await
            .context("Failed to kill sessions")?,
    };

    if outcomes.is_empty() {
        print_info(NO_OPEN_PORTS);
    }
    for outcome in &outcomes {
        match outcome {
            KillOutcome::Killed(_) => print_success(&outcome.to_string()),
            KillOutcome::NotFound(_) => print_warning(&outcome.to_string()),
        }
    }

    Ok(())
}
