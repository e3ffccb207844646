//! Serve command: the acceptor for one port
//!
//! Normally started by `rsm start` inside the tmux session it serves. Each
//! accepted connection opens a new window in that session.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use rsm_core::tmux::{TmuxHost, TmuxLauncher};
use rsm_core::RsmConfig;
use rsm_protocol::SessionName;
use rsm_server::Acceptor;

use crate::output::{print_info, print_warning};
use crate::signal::{cancel_on_shutdown, shutdown_signal};

/// Execute the serve command
pub async fn serve_command(
    config: RsmConfig,
    port: u16,
    session: SessionName,
    raw_terminal: bool,
) -> Result<()> {
    if session.port() != port {
        print_warning(&format!(
            "Serving port {} with windows in session {}",
            port, session
        ));
    }

    let program = std::env::current_exe().context("Cannot locate the rsm executable")?;
    let launcher = TmuxLauncher::new(
        TmuxHost::from_config(&config),
        session,
        program,
        config.work_dir.clone(),
    );

    let cancel = CancellationToken::new();
    let signals = cancel_on_shutdown(cancel.clone());

    let acceptor = Acceptor::bind(config, port, raw_terminal, Arc::new(launcher), cancel.clone())
        .with_context(|| format!("Failed to listen on port {}", port))?;
    print_info(&format!(
        "Listening on {} (Ctrl+C to stop)",
        acceptor.local_addr()?
    ));

    let sessions = acceptor.sessions();
    acceptor.run().await?;
    let _ = signals.await;

    if !sessions.is_empty() {
        print_info(&format!(
            "Waiting for {} open session(s) to close, Ctrl+C again to exit",
            sessions.len()
        ));
        tokio::select! {
            _ = sessions.wait() => {}
            name = shutdown_signal() => {
                tracing::warn!("Received {}, leaving {} session(s) behind", name, sessions.len());
            }
        }
    }

    Ok(())
}
