//! Shutdown signals
//!
//! SIGINT, SIGTERM and SIGHUP all mean "shut down cleanly". tmux sends
//! SIGHUP to a window's processes when the window or session goes away.

use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

async fn wait_for(kind: SignalKind, name: &'static str) -> &'static str {
    match signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
            name
        }
        Err(e) => {
            tracing::warn!("Cannot listen for {}: {}", name, e);
            std::future::pending().await
        }
    }
}

/// Wait for the next shutdown signal and return its name
pub async fn shutdown_signal() -> &'static str {
    tokio::select! {
        name = wait_for(SignalKind::interrupt(), "SIGINT") => name,
        name = wait_for(SignalKind::terminate(), "SIGTERM") => name,
        name = wait_for(SignalKind::hangup(), "SIGHUP") => name,
    }
}

/// Cancel `cancel` on the first shutdown signal
pub fn cancel_on_shutdown(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            name = shutdown_signal() => {
                tracing::info!("Received {}, shutting down...", name);
                cancel.cancel();
            }
            _ = cancel.cancelled() => {}
        }
    })
}
