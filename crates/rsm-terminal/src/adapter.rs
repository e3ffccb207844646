//! Terminal adapter
//!
//! Connects to a session's rendezvous channel and relays bytes between it
//! and the local terminal:
//!
//! - raw mode drives the controlling terminal device directly with all
//!   input and output processing disabled
//! - cbreak mode reads standard input key by key with signal keys intact,
//!   echoes what was typed to standard output and writes channel output
//!   there too
//!
//! Whichever direction ends first (end-of-stream, I/O error or cancellation)
//! ends the other, and the terminal is restored before the adapter returns.

use std::io;
use std::os::fd::{AsFd, OwnedFd};
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use rsm_protocol::{connect_channel, forward, CHUNK_SIZE};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::device::{self, StdioStream, TerminalFd};
use crate::error::TerminalError;
use crate::mode::{self, FlagsGuard, TerminalGuard, TerminalMode};

/// How the adapter attaches to the local terminal
#[derive(Debug, Clone, Copy)]
pub struct AdapterOptions {
    /// Terminal mode while attached
    pub mode: TerminalMode,
    /// Bytes moved per read
    pub chunk_size: usize,
}

impl AdapterOptions {
    /// Raw mode on the controlling terminal when `raw_terminal` is set,
    /// cbreak mode on standard input and output otherwise
    pub fn new(raw_terminal: bool) -> Self {
        Self {
            mode: if raw_terminal {
                TerminalMode::Raw
            } else {
                TerminalMode::Cbreak
            },
            chunk_size: CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Byte counts of a finished relay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Bytes read from the channel and written to the terminal
    pub from_channel: u64,
    /// Bytes read from the terminal and written to the channel
    pub to_channel: u64,
}

/// Writer shared by the two relay directions when input is echoed
struct SharedWriter<W>(Arc<Mutex<W>>);

impl<W> Clone for SharedWriter<W> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for SharedWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut inner = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        Pin::new(&mut *inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut inner = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        Pin::new(&mut *inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut inner = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        Pin::new(&mut *inner).poll_shutdown(cx)
    }
}

/// Relay between `channel` and a terminal given as separate `input` and
/// `output` streams until either direction ends or `cancel` fires.
///
/// With `echo` set, everything read from `input` is also written to
/// `output`. I/O errors end the relay like end-of-stream does; they are
/// logged, not returned.
pub async fn relay<C, R, W>(
    channel: C,
    input: R,
    output: W,
    echo: bool,
    chunk_size: usize,
    cancel: CancellationToken,
) -> RelayStats
where
    C: AsyncRead + AsyncWrite,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (channel_read, channel_write) = tokio::io::split(channel);
    let output = SharedWriter(Arc::new(Mutex::new(output)));
    let echo = echo.then(|| output.clone());
    let done = cancel.child_token();

    let (from_channel, to_channel) = tokio::join!(
        forward(channel_read, output, chunk_size, done.clone()),
        forward_input(input, channel_write, echo, chunk_size, done.clone()),
    );

    let stats = RelayStats {
        from_channel: direction_total("channel->terminal", from_channel),
        to_channel: direction_total("terminal->channel", to_channel),
    };
    tracing::debug!(
        from_channel = stats.from_channel,
        to_channel = stats.to_channel,
        "Relay finished"
    );
    stats
}

fn direction_total(direction: &str, result: io::Result<u64>) -> u64 {
    match result {
        Ok(n) => n,
        Err(e) => {
            tracing::debug!("{} ended with error: {}", direction, e);
            0
        }
    }
}

/// Like [`forward`], additionally copying every chunk to `echo`
async fn forward_input<R, W, E>(
    mut input: R,
    mut channel: W,
    mut echo: Option<E>,
    chunk_size: usize,
    done: CancellationToken,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;

    let result = loop {
        let n = tokio::select! {
            biased;
            _ = done.cancelled() => break Ok(total),
            read = input.read(&mut buf) => match read {
                Ok(0) => break Ok(total),
                Ok(n) => n,
                Err(e) => break Err(e),
            },
        };
        let chunk = &buf[..n];

        let written = tokio::select! {
            biased;
            _ = done.cancelled() => break Ok(total),
            written = async {
                channel.write_all(chunk).await?;
                channel.flush().await?;
                if let Some(echo) = echo.as_mut() {
                    echo.write_all(chunk).await?;
                    echo.flush().await?;
                }
                Ok::<_, io::Error>(())
            } => written,
        };

        if let Err(e) = written {
            break Err(e);
        }
        total += n as u64;
    };

    done.cancel();
    let _ = channel.shutdown().await;
    result
}

/// Attach the terminal device `terminal` to `channel`.
///
/// The device is switched to `options.mode` for the duration and restored
/// before returning, including when `cancel` ends the relay early.
pub async fn attach_terminal<C>(
    channel: C,
    terminal: OwnedFd,
    options: AdapterOptions,
    cancel: CancellationToken,
) -> Result<RelayStats, TerminalError>
where
    C: AsyncRead + AsyncWrite,
{
    let guard = TerminalGuard::engage(terminal.as_fd(), options.mode)?;
    let device = TerminalFd::new(terminal).map_err(TerminalError::Setup)?;
    let (input, output) = tokio::io::split(device);

    let stats = relay(channel, input, output, false, options.chunk_size, cancel).await;

    drop(guard);
    Ok(stats)
}

/// Attach separate input and output descriptors (normally standard input
/// and output) to `channel`, echoing input to the output.
///
/// When `input` is a terminal it is switched to `options.mode`. Either side
/// may also be a pipe or a redirected file. Descriptor flags of both are
/// restored before returning.
pub async fn attach_stdio<C>(
    channel: C,
    input: OwnedFd,
    output: OwnedFd,
    options: AdapterOptions,
    cancel: CancellationToken,
) -> Result<RelayStats, TerminalError>
where
    C: AsyncRead + AsyncWrite,
{
    let mut flags = FlagsGuard::new();
    flags
        .preserve(input.as_fd())
        .map_err(TerminalError::Setup)?;
    flags
        .preserve(output.as_fd())
        .map_err(TerminalError::Setup)?;

    let terminal = if mode::is_terminal(input.as_fd()) {
        Some(TerminalGuard::engage(input.as_fd(), options.mode)?)
    } else {
        tracing::debug!("Input is not a terminal, leaving its mode alone");
        None
    };

    let input = StdioStream::new(input).map_err(TerminalError::Setup)?;
    let output = StdioStream::new(output).map_err(TerminalError::Setup)?;

    let stats = relay(channel, input, output, true, options.chunk_size, cancel).await;

    drop(terminal);
    drop(flags);
    Ok(stats)
}

/// Claim the rendezvous channel at `socket_path` and relay it to the local
/// terminal until either side closes or `cancel` fires.
///
/// The channel's file name is unlinked once connected.
pub async fn run_adapter(
    socket_path: &Path,
    options: AdapterOptions,
    cancel: CancellationToken,
) -> Result<RelayStats, TerminalError> {
    let channel = connect_channel(socket_path).await?;
    tracing::info!(mode = ?options.mode, "Attached to {:?}", socket_path);

    let stats = match options.mode {
        TerminalMode::Raw => {
            let terminal = device::open_controlling_terminal().map_err(TerminalError::Setup)?;
            attach_terminal(channel, terminal, options, cancel).await?
        }
        TerminalMode::Cbreak => {
            let input = device::duplicate(io::stdin().as_fd())?;
            let output = device::duplicate(io::stdout().as_fd())?;
            attach_stdio(channel, input, output, options, cancel).await?
        }
    };

    tracing::info!(
        from_channel = stats.from_channel,
        to_channel = stats.to_channel,
        "Detached from {:?}",
        socket_path
    );
    Ok(stats)
}
