//! Raw mode for the controlling terminal.
//!
//! While a game runs, every keystroke must reach it unbuffered and unechoed.
//! [`RawModeGuard`] switches a terminal to raw mode and puts the previous
//! settings back when dropped, so the terminal is restored on every exit
//! path of a run, including early returns and panics.

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use nix::sys::termios::{self, SetArg, Termios};
use tracing::{debug, warn};

use adomate_types::AdomateError;

/// Holds a terminal in raw mode until dropped.
pub struct RawModeGuard {
    fd: OwnedFd,
    original: Termios,
    restored: bool,
}

impl RawModeGuard {
    /// Put the terminal behind `fd` into raw mode.
    pub fn enable(fd: BorrowedFd<'_>) -> Result<Self, AdomateError> {
        let fd = fd
            .try_clone_to_owned()
            .map_err(|e| AdomateError::TerminalError(format!("dup terminal fd: {e}")))?;
        let original = termios::tcgetattr(&fd)
            .map_err(|e| AdomateError::TerminalError(format!("tcgetattr: {e}")))?;

        let mut raw = original.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(&fd, SetArg::TCSANOW, &raw)
            .map_err(|e| AdomateError::TerminalError(format!("tcsetattr: {e}")))?;
        debug!("controlling terminal switched to raw mode");

        Ok(Self {
            fd,
            original,
            restored: false,
        })
    }

    /// Enable raw mode only if `fd` is a terminal.
    pub fn enable_if_tty(fd: BorrowedFd<'_>) -> Result<Option<Self>, AdomateError> {
        if is_tty(fd) {
            Self::enable(fd).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Restore the saved terminal settings now.
    ///
    /// Calling this more than once is harmless; the drop handler skips the
    /// restore if it already happened.
    pub fn restore(&mut self) -> Result<(), AdomateError> {
        if self.restored {
            return Ok(());
        }
        termios::tcsetattr(&self.fd, SetArg::TCSADRAIN, &self.original)
            .map_err(|e| AdomateError::TerminalError(format!("tcsetattr restore: {e}")))?;
        self.restored = true;
        debug!("controlling terminal restored");
        Ok(())
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!(error = %e, "failed to restore terminal mode");
        }
    }
}

/// Whether `fd` refers to a terminal.
pub fn is_tty(fd: impl AsFd) -> bool {
    termios::tcgetattr(fd).is_ok()
}
