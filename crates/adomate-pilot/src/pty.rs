//! Pseudo-terminal session management.
//!
//! Spawns the game in a PTY so every byte it draws can be relayed and
//! inspected. The controller end is kept by [`PtySession`] for reading the
//! game's output and injecting keystrokes; the subordinate end becomes the
//! child's stdin, stdout and stderr.

use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use nix::pty::{openpty, Winsize};
use nix::sys::signal::{self, Signal};
use nix::unistd::{self, Pid};

use adomate_types::AdomateError;

/// A child process running in a pseudo-terminal.
pub struct PtySession {
    controller: OwnedFd,
    child: Child,
}

impl PtySession {
    /// Spawn `command` with `args` in a new PTY of the given size.
    ///
    /// The child gets its own session (and so its own process group) with
    /// the PTY as controlling terminal. The controller fd is non-blocking and
    /// close-on-exec. Failing to exec the command is reported here as a
    /// [`AdomateError::SpawnError`].
    pub fn spawn(
        command: &str,
        args: &[String],
        rows: u16,
        cols: u16,
    ) -> Result<Self, AdomateError> {
        let winsize = Winsize {
            ws_row: rows,
            ws_col: cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        let pty = openpty(Some(&winsize), None)
            .map_err(|e| AdomateError::PtyError(format!("openpty failed: {e}")))?;

        set_cloexec(pty.master.as_fd())?;
        set_cloexec(pty.slave.as_fd())?;
        set_window_size(pty.master.as_fd(), rows, cols)?;

        let stdio = |fd: &OwnedFd| -> Result<Stdio, AdomateError> {
            fd.try_clone()
                .map(Stdio::from)
                .map_err(|e| AdomateError::PtyError(format!("dup pty: {e}")))
        };

        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(stdio(&pty.slave)?)
            .stdout(stdio(&pty.slave)?)
            .stderr(stdio(&pty.slave)?);

        // Safety: runs in the forked child before exec. setsid and ioctl are
        // async-signal-safe, and stdin is already the PTY at this point.
        unsafe {
            cmd.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                if libc::ioctl(libc::STDIN_FILENO, libc::TIOCSCTTY as _, 0) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = cmd
            .spawn()
            .map_err(|e| AdomateError::SpawnError(format!("{command}: {e}")))?;

        // The child holds its own copies of the subordinate side.
        drop(pty.slave);

        let flags = fcntl(pty.master.as_raw_fd(), FcntlArg::F_GETFL)
            .map_err(|e| AdomateError::PtyError(format!("fcntl F_GETFL: {e}")))?;
        let flags = OFlag::from_bits_truncate(flags);
        fcntl(
            pty.master.as_raw_fd(),
            FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK),
        )
        .map_err(|e| AdomateError::PtyError(format!("fcntl F_SETFL: {e}")))?;

        Ok(Self {
            controller: pty.master,
            child,
        })
    }

    /// Non-blocking read from the controller side.
    ///
    /// Returns `Ok(0)` when nothing is available (EAGAIN) or when the child
    /// has closed its side (EIO).
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, AdomateError> {
        match unistd::read(self.controller.as_raw_fd(), buf) {
            Ok(n) => Ok(n),
            Err(Errno::EAGAIN) | Err(Errno::EINTR) => Ok(0),
            Err(Errno::EIO) => Ok(0),
            Err(e) => Err(AdomateError::PtyError(format!("pty read: {e}"))),
        }
    }

    /// Write all bytes to the controller side (the child's input).
    ///
    /// Retries on EAGAIN for up to about five seconds so a child that stops
    /// reading cannot wedge the relay forever.
    pub fn write_all(&self, data: &[u8]) -> Result<(), AdomateError> {
        let mut written = 0;
        let mut retries = 0u32;
        while written < data.len() {
            match unistd::write(&self.controller, &data[written..]) {
                Ok(n) => {
                    written += n;
                    retries = 0;
                }
                Err(Errno::EAGAIN) | Err(Errno::EINTR) => {
                    retries += 1;
                    if retries > 5000 {
                        return Err(AdomateError::PtyError(
                            "pty write: buffer full after 5s of retries".into(),
                        ));
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(e) => {
                    return Err(AdomateError::PtyError(format!("pty write: {e}")));
                }
            }
        }
        Ok(())
    }

    /// Check whether the child has exited, without blocking.
    ///
    /// Returns the exit code once it has; negative values are `-signum`.
    pub fn try_wait(&mut self) -> Result<Option<i32>, AdomateError> {
        self.child
            .try_wait()
            .map(|status| status.map(exit_code))
            .map_err(|e| AdomateError::PtyError(format!("waitpid: {e}")))
    }

    /// Borrow the controller fd (for polling).
    pub fn controller_fd(&self) -> BorrowedFd<'_> {
        self.controller.as_fd()
    }

    /// The child's process ID.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Send SIGTERM to the child's process group.
    pub fn terminate(&self) -> Result<(), AdomateError> {
        let pid = i32::try_from(self.child.id())
            .map_err(|_| AdomateError::PtyError("pid out of range".into()))?;
        signal::killpg(Pid::from_raw(pid), Signal::SIGTERM)
            .map_err(|e| AdomateError::PtyError(format!("killpg SIGTERM: {e}")))
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        // Terminate a still-running child, then reap so it does not linger as
        // a zombie. The controller fd closes when `OwnedFd` drops.
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.terminate();
            std::thread::sleep(Duration::from_millis(100));
            let _ = self.child.try_wait();
        }
    }
}

/// Set the window size of a terminal device.
pub fn set_window_size(fd: BorrowedFd<'_>, rows: u16, cols: u16) -> Result<(), AdomateError> {
    let ws = libc::winsize {
        ws_row: rows,
        ws_col: cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    // Safety: TIOCSWINSZ reads a `winsize` from a pointer valid for the call.
    let ret = unsafe { libc::ioctl(fd.as_raw_fd(), libc::TIOCSWINSZ, &ws) };
    if ret < 0 {
        return Err(AdomateError::PtyError(format!(
            "ioctl TIOCSWINSZ failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

fn set_cloexec(fd: BorrowedFd<'_>) -> Result<(), AdomateError> {
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
        .map(drop)
        .map_err(|e| AdomateError::PtyError(format!("fcntl F_SETFD: {e}")))
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| -sig))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait_exit(session: &mut PtySession) -> i32 {
        for _ in 0..200 {
            if let Some(code) = session.try_wait().expect("try_wait failed") {
                return code;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("child did not exit");
    }

    fn drain(session: &PtySession) -> String {
        let mut buf = [0u8; 1024];
        let mut output = Vec::new();
        loop {
            match session.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => output.extend_from_slice(&buf[..n]),
            }
        }
        String::from_utf8_lossy(&output).into_owned()
    }

    #[test]
    fn spawn_echo_and_read_output() {
        let mut session = PtySession::spawn("/bin/echo", &["hello adom".to_string()], 25, 80)
            .expect("spawn failed");

        std::thread::sleep(Duration::from_millis(100));
        let text = drain(&session);
        assert!(text.contains("hello adom"), "expected output, got {text:?}");

        assert_eq!(wait_exit(&mut session), 0);
    }

    #[test]
    fn child_sees_window_size() {
        let session = PtySession::spawn("/bin/sh", &["-c".into(), "stty size".into()], 25, 80)
            .expect("spawn failed");

        std::thread::sleep(Duration::from_millis(200));
        let text = drain(&session);
        assert!(text.contains("25 80"), "expected '25 80', got {text:?}");
    }

    #[test]
    fn write_reaches_child_input() {
        let mut session = PtySession::spawn("/bin/cat", &[], 25, 80).expect("spawn failed");

        std::thread::sleep(Duration::from_millis(50));
        session.write_all(b"test input\n").expect("write failed");
        std::thread::sleep(Duration::from_millis(100));
        let text = drain(&session);
        assert!(text.contains("test input"), "expected echo, got {text:?}");

        session.write_all(&[0x04]).expect("EOF failed");
        assert_eq!(wait_exit(&mut session), 0);
    }

    #[test]
    fn try_wait_reports_exit() {
        let mut session = PtySession::spawn("/bin/sh", &["-c".into(), "exit 3".into()], 25, 80)
            .expect("spawn failed");

        let mut code = None;
        for _ in 0..100 {
            code = session.try_wait().expect("try_wait failed");
            if code.is_some() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(code, Some(3));
    }

    #[test]
    fn missing_command_is_spawn_error() {
        let result = PtySession::spawn("/nonexistent/adom-binary", &[], 25, 80);
        assert!(matches!(result, Err(AdomateError::SpawnError(_))));
    }
}
