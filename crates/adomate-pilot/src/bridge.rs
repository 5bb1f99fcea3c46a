//! The relay loop between the human's terminal and the game's PTY.
//!
//! One [`Bridge::run`] call spawns the game, puts the controlling terminal in
//! raw mode, and multiplexes three sources with a bounded poll: game output,
//! human input, and the debounce timer. Each iteration, in order:
//!
//! 1. ready game output is copied verbatim to the human's terminal and into
//!    the [`Debouncer`]
//! 2. ready human input is forwarded verbatim to the game, except the
//!    reserved toggle key, which flips auto-drinking instead
//! 3. a settled screen, if any, is normalized and evaluated by the
//!    [`TriggerEngine`]; injected bytes go to the game
//! 4. the game is checked for exit
//!
//! The run ends when the game exits or a fatal error occurs. Human input
//! that fails or closes is dropped from the poll set and the game keeps
//! running. The terminal mode and both PTY descriptors are released on
//! every path.

use std::io::Write;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout};
use tracing::{debug, error, info, warn};

use adomate_types::{AdomateError, PilotConfig};

use crate::ansi;
use crate::debounce::Debouncer;
use crate::pty::PtySession;
use crate::state::SessionState;
use crate::terminal::RawModeGuard;
use crate::trigger::{Evaluation, TriggerEngine};

/// How a single run of the game ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The game exited and nothing asked for another run.
    Completed { exit_code: i32 },
    /// The game exited after the trigger engine requested a restart.
    RestartRequested { exit_code: i32 },
    /// The run could not start or could not continue.
    Fatal(AdomateError),
}

/// Parameters of the relay loop.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub command: String,
    pub args: Vec<String>,
    pub rows: u16,
    pub cols: u16,
    pub debounce: Duration,
    pub poll_ms: u16,
    pub read_chunk: usize,
    /// Reserved input sequence toggling auto-drinking.
    pub toggle_key: Vec<u8>,
}

impl BridgeConfig {
    /// Relay parameters for launching the game with `args`.
    pub fn from_pilot(config: &PilotConfig, args: Vec<String>) -> Self {
        Self {
            command: config.command.clone(),
            args,
            rows: config.terminal.rows,
            cols: config.terminal.cols,
            debounce: Duration::from_millis(config.terminal.debounce_ms),
            poll_ms: config.terminal.poll_ms,
            read_chunk: config.terminal.read_chunk.max(1),
            toggle_key: config.keys.toggle.as_bytes().to_vec(),
        }
    }
}

/// Handles the trigger engine's output is written through.
///
/// `child_input` is the game's side of the PTY; `terminal` is the human's.
pub struct BridgeHandles<'a> {
    pub child_input: &'a PtySession,
    pub terminal: &'a mut dyn Write,
}

impl BridgeHandles<'_> {
    /// Carry out an evaluation: inject its bytes, print its notice, store its state.
    fn apply(&mut self, eval: Evaluation, state: &mut SessionState) {
        if let Some(bytes) = eval.inject.as_deref() {
            info!(
                rule = eval.rule.unwrap_or("-"),
                keys = %String::from_utf8_lossy(bytes).escape_debug(),
                "injecting keys"
            );
            if let Err(e) = self.child_input.write_all(bytes) {
                warn!(error = %e, "failed to inject keys");
                state.had_error = true;
            }
        }
        if let Some(notice) = eval.notice.as_deref() {
            info!(notice, "notice for player");
            let line = format!("\r\n{notice}\r\n");
            if let Err(e) = self
                .terminal
                .write_all(line.as_bytes())
                .and_then(|()| self.terminal.flush())
            {
                warn!(error = %e, "failed to write notice");
                state.had_error = true;
            }
        }
        let had_error = state.had_error;
        *state = eval.state;
        state.had_error |= had_error;
    }
}

/// Drives one run of the game.
pub struct Bridge<'e> {
    config: BridgeConfig,
    engine: &'e TriggerEngine,
}

impl<'e> Bridge<'e> {
    pub fn new(config: BridgeConfig, engine: &'e TriggerEngine) -> Self {
        Self { config, engine }
    }

    /// Run the game until it exits.
    ///
    /// `input` is read for the human's keystrokes and put into raw mode if it
    /// is a terminal. Game output and notices are written to `output`.
    /// `state` is updated in place as triggers fire.
    pub fn run(
        &self,
        input: BorrowedFd<'_>,
        output: &mut dyn Write,
        state: &mut SessionState,
    ) -> RunOutcome {
        let mut raw_mode = match RawModeGuard::enable_if_tty(input) {
            Ok(guard) => guard,
            Err(e) => {
                error!(error = %e, "could not enter raw mode");
                return RunOutcome::Fatal(e);
            }
        };

        let result = PtySession::spawn(
            &self.config.command,
            &self.config.args,
            self.config.rows,
            self.config.cols,
        )
        .and_then(|mut pty| {
            info!(
                pid = pty.pid(),
                command = %self.config.command,
                args = ?self.config.args,
                "game spawned in PTY"
            );
            self.relay(&mut pty, input, output, state)
        });

        // Restore the terminal before anything else reports on the run.
        if let Some(guard) = raw_mode.as_mut() {
            if let Err(e) = guard.restore() {
                warn!(error = %e, "failed to restore terminal");
                state.had_error = true;
            }
        }

        match result {
            Ok(exit_code) if state.restart_requested => {
                info!(exit_code, state = %state, "game exited, restart requested");
                RunOutcome::RestartRequested { exit_code }
            }
            Ok(exit_code) => {
                info!(exit_code, state = %state, "game exited");
                RunOutcome::Completed { exit_code }
            }
            Err(e) => {
                error!(error = %e, command = %self.config.command, "run failed");
                state.had_error = true;
                RunOutcome::Fatal(e)
            }
        }
    }

    fn relay(
        &self,
        pty: &mut PtySession,
        input: BorrowedFd<'_>,
        output: &mut dyn Write,
        state: &mut SessionState,
    ) -> Result<i32, AdomateError> {
        let mut debouncer = Debouncer::new(self.config.debounce);
        let mut buf = vec![0u8; self.config.read_chunk];
        let mut input_open = true;
        let timeout = PollTimeout::from(self.config.poll_ms);

        loop {
            let (child_ready, input_ready) = poll_ready(pty, input, input_open, timeout)?;

            if child_ready {
                // EAGAIN and EIO come back as 0; anything else means the
                // controller fd is unusable.
                let n = pty.read(&mut buf)?;
                if n > 0 {
                    let chunk = &buf[..n];
                    if let Err(e) = output.write_all(chunk).and_then(|()| output.flush()) {
                        warn!(error = %e, "failed to relay game output");
                        state.had_error = true;
                    }
                    debouncer.push(chunk, Instant::now());
                }
            }

            if input_ready {
                match read_input(input, &mut buf) {
                    Ok(None) => {}
                    Ok(Some(0)) => {
                        debug!("input closed, relaying game output only");
                        input_open = false;
                    }
                    Ok(Some(n)) => {
                        let mut handles = BridgeHandles {
                            child_input: pty,
                            terminal: &mut *output,
                        };
                        self.forward_input(&buf[..n], &mut handles, state);
                    }
                    Err(e) => {
                        warn!(error = %e, "input failed, relaying game output only");
                        state.had_error = true;
                        input_open = false;
                    }
                }
            }

            if let Some(raw) = debouncer.poll_expiry(Instant::now()) {
                let text = ansi::normalize(&raw);
                if !text.is_empty() {
                    let eval = self.engine.evaluate(&text, state);
                    let mut handles = BridgeHandles {
                        child_input: pty,
                        terminal: &mut *output,
                    };
                    handles.apply(eval, state);
                }
            }

            if let Some(exit_code) = pty.try_wait()? {
                self.drain(pty, output, &mut debouncer, &mut buf, state);
                return Ok(exit_code);
            }
        }
    }

    /// Forward human input to the game, intercepting the toggle key.
    fn forward_input(&self, data: &[u8], handles: &mut BridgeHandles<'_>, state: &mut SessionState) {
        let toggle = self.config.toggle_key.as_slice();
        let mut rest = data;

        while !rest.is_empty() {
            let (before, found) = match find(rest, toggle) {
                Some(pos) => (&rest[..pos], true),
                None => (rest, false),
            };
            if !before.is_empty() {
                if let Err(e) = handles.child_input.write_all(before) {
                    warn!(error = %e, "failed to forward input");
                    state.had_error = true;
                }
            }
            if !found {
                break;
            }
            let eval = self.engine.toggle_auto_repeat(state);
            handles.apply(eval, state);
            rest = &rest[before.len() + toggle.len()..];
        }
    }

    /// Relay output the game wrote just before exiting.
    fn drain(
        &self,
        pty: &PtySession,
        output: &mut dyn Write,
        debouncer: &mut Debouncer,
        buf: &mut [u8],
        state: &mut SessionState,
    ) {
        loop {
            let n = match pty.read(buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "failed to drain game output");
                    state.had_error = true;
                    break;
                }
            };
            if let Err(e) = output.write_all(&buf[..n]) {
                warn!(error = %e, "failed to relay game output");
                state.had_error = true;
            }
            debouncer.push(&buf[..n], Instant::now());
        }
        if let Err(e) = output.flush() {
            warn!(error = %e, "failed to relay game output");
            state.had_error = true;
        }
        if debouncer.is_pending() {
            let tail = ansi::normalize(&debouncer.take());
            debug!(tail, "discarding output written after the last settled screen");
        }
    }
}

/// Wait for the game's output or the human's input to become readable.
fn poll_ready(
    pty: &PtySession,
    input: BorrowedFd<'_>,
    input_open: bool,
    timeout: PollTimeout,
) -> Result<(bool, bool), AdomateError> {
    let mut fds = vec![PollFd::new(pty.controller_fd(), PollFlags::POLLIN)];
    if input_open {
        fds.push(PollFd::new(input, PollFlags::POLLIN));
    }

    match nix::poll::poll(&mut fds, timeout) {
        Ok(0) | Err(Errno::EINTR) => Ok((false, false)),
        Ok(_) => {
            let ready = |fd: &PollFd<'_>| {
                fd.revents().is_some_and(|r| {
                    r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
                })
            };
            let child_ready = ready(&fds[0]);
            let input_ready = fds.get(1).is_some_and(ready);
            Ok((child_ready, input_ready))
        }
        Err(e) => Err(AdomateError::PtyError(format!("poll: {e}"))),
    }
}

/// Read the human's input. `Ok(None)` means nothing was available after all.
fn read_input(input: BorrowedFd<'_>, buf: &mut [u8]) -> Result<Option<usize>, AdomateError> {
    match nix::unistd::read(input.as_raw_fd(), buf) {
        Ok(n) => Ok(Some(n)),
        Err(Errno::EAGAIN) | Err(Errno::EINTR) => Ok(None),
        Err(e) => Err(AdomateError::TerminalError(format!("input read: {e}"))),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
