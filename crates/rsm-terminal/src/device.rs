//! Async access to terminal descriptors
//!
//! Terminal reads block until a key is pressed, which would leave a
//! forwarding task stuck after its peer has gone away. [`TerminalFd`]
//! switches the descriptor to non-blocking mode and drives it through the
//! runtime's readiness notifications instead, so every read can be
//! abandoned when the session tears down.

use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Path of the controlling terminal of the current process
pub const CONTROLLING_TERMINAL: &str = "/dev/tty";

/// Open the controlling terminal for reading and writing
pub fn open_controlling_terminal() -> io::Result<OwnedFd> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY)
        .open(CONTROLLING_TERMINAL)?;
    Ok(OwnedFd::from(file))
}

/// Duplicate a descriptor of this process, e.g. standard input
pub fn duplicate(fd: BorrowedFd<'_>) -> io::Result<OwnedFd> {
    fd.try_clone_to_owned()
}

/// A terminal (or pseudo-terminal) descriptor usable from async code.
///
/// Creating one sets `O_NONBLOCK` on the underlying open file, which is
/// shared with every duplicate of the descriptor. Callers that hand a
/// shared descriptor to a `TerminalFd` should hold a
/// [`FlagsGuard`](crate::FlagsGuard) or [`TerminalGuard`](crate::TerminalGuard)
/// that restores the flags.
#[derive(Debug)]
pub struct TerminalFd {
    inner: AsyncFd<OwnedFd>,
}

impl TerminalFd {
    /// Register `fd` with the runtime
    ///
    /// Fails with `EPERM`, leaving the descriptor flags untouched, when
    /// the descriptor cannot be polled (regular files, `/dev/null`).
    pub fn new(fd: OwnedFd) -> io::Result<Self> {
        let inner = AsyncFd::new(fd)?;
        set_nonblocking(inner.get_ref().as_fd())?;
        Ok(Self { inner })
    }
}

/// Standard input or output, wherever it points.
///
/// Terminals, pipes and sockets are polled through [`TerminalFd`].
/// Descriptors the runtime cannot poll, such as a file redirected to
/// standard input, are read and written on the blocking pool instead.
#[derive(Debug)]
pub enum StdioStream {
    Polled(TerminalFd),
    Blocking(tokio::fs::File),
}

impl StdioStream {
    pub fn new(fd: OwnedFd) -> io::Result<Self> {
        let spare = fd.try_clone()?;
        match TerminalFd::new(fd) {
            Ok(polled) => Ok(StdioStream::Polled(polled)),
            Err(e) if e.raw_os_error() == Some(libc::EPERM) => {
                tracing::debug!("Descriptor is not pollable, using blocking I/O");
                let file = std::fs::File::from(spare);
                Ok(StdioStream::Blocking(tokio::fs::File::from_std(file)))
            }
            Err(e) => Err(e),
        }
    }
}

impl AsyncRead for StdioStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            StdioStream::Polled(fd) => Pin::new(fd).poll_read(cx, buf),
            StdioStream::Blocking(file) => Pin::new(file).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for StdioStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            StdioStream::Polled(fd) => Pin::new(fd).poll_write(cx, buf),
            StdioStream::Blocking(file) => Pin::new(file).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            StdioStream::Polled(fd) => Pin::new(fd).poll_flush(cx),
            StdioStream::Blocking(file) => Pin::new(file).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            StdioStream::Polled(fd) => Pin::new(fd).poll_shutdown(cx),
            StdioStream::Blocking(file) => Pin::new(file).poll_shutdown(cx),
        }
    }
}

impl AsFd for TerminalFd {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inner.get_ref().as_fd()
    }
}

fn set_nonblocking(fd: BorrowedFd<'_>) -> io::Result<()> {
    // SAFETY: fcntl with F_GETFL/F_SETFL only manipulates descriptor flags.
    unsafe {
        let flags = libc::fcntl(fd.as_raw_fd(), libc::F_GETFL);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if flags & libc::O_NONBLOCK == 0
            && libc::fcntl(fd.as_raw_fd(), libc::F_SETFL, flags | libc::O_NONBLOCK) < 0
        {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn read_fd(fd: BorrowedFd<'_>, buf: &mut [u8]) -> io::Result<usize> {
    // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
    let n = unsafe { libc::read(fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

fn write_fd(fd: BorrowedFd<'_>, buf: &[u8]) -> io::Result<usize> {
    // SAFETY: `buf` is valid for reads of `buf.len()` bytes.
    let n = unsafe { libc::write(fd.as_raw_fd(), buf.as_ptr().cast(), buf.len()) };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

impl AsyncRead for TerminalFd {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = ready!(self.inner.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();

            match guard.try_io(|inner| read_fd(inner.get_ref().as_fd(), unfilled)) {
                Ok(Ok(n)) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                // A pseudo-terminal whose other side has closed reports EIO
                // rather than end-of-file.
                Ok(Err(e)) if e.raw_os_error() == Some(libc::EIO) => {
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(e)) => return Poll::Ready(Err(e)),
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsyncWrite for TerminalFd {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = ready!(self.inner.poll_write_ready(cx))?;

            match guard.try_io(|inner| write_fd(inner.get_ref().as_fd(), buf)) {
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => continue,
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::tests::open_pty;
    use crate::mode::{TerminalGuard, TerminalMode};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_pty_round_trip() {
        let (master, slave) = open_pty();
        let _guard = TerminalGuard::engage(slave.as_fd(), TerminalMode::Raw).unwrap();
        let mut master = TerminalFd::new(master).unwrap();
        let mut slave = TerminalFd::new(slave).unwrap();

        master.write_all(b"keys").await.unwrap();
        let mut buf = [0u8; 4];
        timeout(Duration::from_secs(2), slave.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf, b"keys");

        slave.write_all(b"out").await.unwrap();
        let mut buf = [0u8; 3];
        timeout(Duration::from_secs(2), master.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf, b"out");
    }

    #[tokio::test]
    async fn test_hangup_reads_as_end_of_stream() {
        let (master, slave) = open_pty();
        let mut slave = TerminalFd::new(slave).unwrap();
        drop(master);

        let mut buf = [0u8; 8];
        let n = timeout(Duration::from_secs(2), slave.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_regular_files_are_rejected() {
        let file = tempfile::tempfile().unwrap();
        let dup = file.try_clone().unwrap();
        let before = crate::mode::tests::flags_of(dup.as_fd());

        assert!(TerminalFd::new(OwnedFd::from(file)).is_err());
        assert_eq!(crate::mode::tests::flags_of(dup.as_fd()), before);
    }

    #[tokio::test]
    async fn test_stdio_stream_reads_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input");
        std::fs::write(&path, b"typed ahead").unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let mut stream = StdioStream::new(OwnedFd::from(file)).unwrap();
        assert!(matches!(stream, StdioStream::Blocking(_)));

        let mut content = Vec::new();
        timeout(Duration::from_secs(2), stream.read_to_end(&mut content))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(content, b"typed ahead");
    }

    #[tokio::test]
    async fn test_stdio_stream_polls_pipes() {
        let (read, write) = crate::mode::tests::open_pipe();
        let mut reader = StdioStream::new(read).unwrap();
        let mut writer = StdioStream::new(write).unwrap();
        assert!(matches!(reader, StdioStream::Polled(_)));

        writer.write_all(b"piped").await.unwrap();
        drop(writer);
        let mut content = Vec::new();
        timeout(Duration::from_secs(2), reader.read_to_end(&mut content))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(content, b"piped");
    }
}
