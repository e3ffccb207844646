//! Terminal modes and the guard that restores them
//!
//! [`TerminalGuard::engage`] snapshots a terminal's attributes, switches it
//! to the requested mode and puts everything back when dropped. Dropping is
//! the only restore path, so normal end-of-stream, I/O errors, cancellation
//! and unwinding all restore the terminal the same way.

use std::io;
use std::mem::MaybeUninit;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};

use crate::error::TerminalError;

/// How the local terminal is driven while attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalMode {
    /// Every byte passes through untouched: no echo, no line editing, no
    /// signal keys, no output post-processing
    Raw,
    /// Keys are delivered immediately without echo, but signal keys such as
    /// Ctrl+C still raise signals
    Cbreak,
}

impl TerminalMode {
    /// Apply this mode to a set of terminal attributes
    pub fn apply(self, attrs: &mut libc::termios) {
        match self {
            TerminalMode::Raw => {
                // SAFETY: cfmakeraw only rewrites fields of the struct it is given.
                unsafe { libc::cfmakeraw(attrs) };
                attrs.c_lflag &= !(libc::ECHO | libc::ICANON);
            }
            TerminalMode::Cbreak => {
                attrs.c_lflag &= !(libc::ECHO | libc::ICANON);
            }
        }
        attrs.c_cc[libc::VMIN] = 1;
        attrs.c_cc[libc::VTIME] = 0;
    }
}

/// Read the attributes of a terminal
pub fn get_attrs(fd: BorrowedFd<'_>) -> io::Result<libc::termios> {
    let mut attrs = MaybeUninit::<libc::termios>::uninit();
    // SAFETY: tcgetattr fully initialises `attrs` when it returns 0.
    if unsafe { libc::tcgetattr(fd.as_raw_fd(), attrs.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { attrs.assume_init() })
}

/// Set the attributes of a terminal
pub fn set_attrs(fd: BorrowedFd<'_>, action: libc::c_int, attrs: &libc::termios) -> io::Result<()> {
    // SAFETY: `attrs` points to a valid termios for the duration of the call.
    if unsafe { libc::tcsetattr(fd.as_raw_fd(), action, attrs) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn get_flags(fd: BorrowedFd<'_>) -> io::Result<libc::c_int> {
    // SAFETY: F_GETFL takes no argument and only reads descriptor state.
    let flags = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(flags)
}

fn set_flags(fd: BorrowedFd<'_>, flags: libc::c_int) -> io::Result<()> {
    // SAFETY: F_SETFL with an integer flag set is always memory safe.
    if unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFL, flags) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Whether `fd` refers to a terminal
pub fn is_terminal(fd: BorrowedFd<'_>) -> bool {
    // SAFETY: isatty only inspects the descriptor.
    unsafe { libc::isatty(fd.as_raw_fd()) == 1 }
}

/// Restores the file-status flags of a set of descriptors when dropped.
///
/// Flags live on the open file, so `O_NONBLOCK` set for async I/O on a
/// duplicate of standard input would otherwise leak into the parent shell.
#[derive(Default)]
pub struct FlagsGuard {
    saved: Vec<(OwnedFd, libc::c_int)>,
}

impl FlagsGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save the current flags of `fd` for restoring on drop
    pub fn preserve(&mut self, fd: BorrowedFd<'_>) -> io::Result<()> {
        let flags = get_flags(fd)?;
        self.saved.push((fd.try_clone_to_owned()?, flags));
        Ok(())
    }

    fn restore(&self) -> io::Result<()> {
        let mut first_error = None;
        for (fd, flags) in &self.saved {
            if let Err(e) = set_flags(fd.as_fd(), *flags) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for FlagsGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::warn!("Failed to restore descriptor flags: {}", e);
        }
    }
}

/// Restores a terminal's attributes and descriptor flags when dropped
pub struct TerminalGuard {
    terminal: OwnedFd,
    saved: libc::termios,
    _flags: FlagsGuard,
}

impl TerminalGuard {
    /// Save the attributes of `fd` and switch it to `mode`.
    ///
    /// The descriptor flags of `fd` are saved too, so non-blocking mode set
    /// afterwards for async I/O is undone on restore.
    pub fn engage(fd: BorrowedFd<'_>, mode: TerminalMode) -> Result<Self, TerminalError> {
        let terminal = fd.try_clone_to_owned().map_err(TerminalError::Setup)?;
        let saved = get_attrs(terminal.as_fd()).map_err(TerminalError::Setup)?;

        let mut flags = FlagsGuard::new();
        flags.preserve(fd).map_err(TerminalError::Setup)?;

        let mut attrs = saved;
        mode.apply(&mut attrs);
        set_attrs(terminal.as_fd(), libc::TCSANOW, &attrs).map_err(TerminalError::Setup)?;

        tracing::debug!(?mode, "Terminal mode engaged");
        Ok(Self {
            terminal,
            saved,
            _flags: flags,
        })
    }

    /// Attributes captured before the mode change
    pub fn saved(&self) -> &libc::termios {
        &self.saved
    }
}

impl Drop for TerminalGuard {
    // Descriptor flags are restored afterwards, when `_flags` drops
    fn drop(&mut self) {
        match set_attrs(self.terminal.as_fd(), libc::TCSADRAIN, &self.saved) {
            Ok(()) => tracing::debug!("Terminal restored"),
            Err(e) => tracing::warn!("Failed to restore terminal: {}", e),
        }
    }
}
