//! Byte bridge
//!
//! Forwards bytes between two duplex endpoints, one task per direction.
//! Both directions share a cancellation token: whichever direction finishes
//! first (end-of-stream or I/O error) cancels the other, and both endpoints
//! are closed once the two tasks have dropped their halves.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Maximum number of bytes moved per read
pub const CHUNK_SIZE: usize = 4096;

/// Byte counts observed when a bridge tears down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Bytes forwarded from the first endpoint to the second
    pub a_to_b: u64,
    /// Bytes forwarded from the second endpoint to the first
    pub b_to_a: u64,
}

/// Copy `reader` into `writer` until end-of-stream, an I/O error, or `done`
/// is cancelled.
///
/// On return `done` is always cancelled, so a sibling direction sharing the
/// token stops as well, and `writer` has been shut down. Returns the number
/// of bytes forwarded, or the error that ended forwarding.
pub async fn forward<R, W>(
    mut reader: R,
    mut writer: W,
    chunk_size: usize,
    done: CancellationToken,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;

    let result = loop {
        let n = tokio::select! {
            biased;
            _ = done.cancelled() => break Ok(total),
            read = reader.read(&mut buf) => match read {
                Ok(0) => break Ok(total),
                Ok(n) => n,
                Err(e) => break Err(e),
            },
        };

        let written = tokio::select! {
            biased;
            _ = done.cancelled() => break Ok(total),
            written = write_chunk(&mut writer, &buf[..n]) => written,
        };

        if let Err(e) = written {
            break Err(e);
        }
        total += n as u64;
    };

    done.cancel();
    let _ = writer.shutdown().await;
    result
}

async fn write_chunk<W: AsyncWrite + Unpin>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    writer.write_all(data).await?;
    writer.flush().await
}

/// Forward bytes between `a` and `b` in both directions until either side
/// closes or fails, then close both.
pub async fn bridge<A, B>(a: A, b: B)
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    run_bridge(a, b, CHUNK_SIZE, CancellationToken::new()).await;
}

/// Run a bridge on its own task.
///
/// The bridge does not depend on the caller after this returns; cancelling
/// `cancel` tears it down early.
pub fn spawn_bridge<A, B>(
    a: A,
    b: B,
    chunk_size: usize,
    cancel: CancellationToken,
) -> JoinHandle<BridgeStats>
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    tokio::spawn(run_bridge(a, b, chunk_size, cancel))
}

async fn run_bridge<A, B>(a: A, b: B, chunk_size: usize, cancel: CancellationToken) -> BridgeStats
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let (a_read, a_write) = tokio::io::split(a);
    let (b_read, b_write) = tokio::io::split(b);
    let done = cancel.child_token();

    let a_to_b = tokio::spawn(forward(a_read, b_write, chunk_size, done.clone()));
    let b_to_a = tokio::spawn(forward(b_read, a_write, chunk_size, done.clone()));

    let (a_to_b, b_to_a) = tokio::join!(a_to_b, b_to_a);
    let stats = BridgeStats {
        a_to_b: direction_total("a->b", a_to_b),
        b_to_a: direction_total("b->a", b_to_a),
    };

    tracing::debug!(
        a_to_b = stats.a_to_b,
        b_to_a = stats.b_to_a,
        "Bridge closed"
    );
    stats
}

fn direction_total(
    direction: &str,
    result: Result<io::Result<u64>, tokio::task::JoinError>,
) -> u64 {
    match result {
        Ok(Ok(total)) => total,
        Ok(Err(e)) => {
            tracing::debug!("Bridge direction {} ended with error: {}", direction, e);
            0
        }
        Err(e) => {
            tracing::warn!("Bridge direction {} task failed: {}", direction, e);
            0
        }
    }
}
