//! Interact command: run the terminal adapter against a channel

use std::path::Path;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use rsm_core::RsmConfig;
use rsm_terminal::{run_adapter, AdapterOptions};

use crate::signal::cancel_on_shutdown;

/// Attach the local terminal to the rendezvous channel at `socket` until
/// either side closes or a shutdown signal arrives
pub async fn interact_command(
    config: &RsmConfig,
    socket: &Path,
    raw_terminal: bool,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let signals = cancel_on_shutdown(cancel.clone());

    let options = AdapterOptions::new(raw_terminal).with_chunk_size(config.chunk_size);
    let result = run_adapter(socket, options, cancel.clone())
        .await
        .with_context(|| format!("Failed to attach to {}", socket.display()));

    cancel.cancel();
    let _ = signals.await;
    result.map(|_| ())
}
