//! Session supervisor: runs the game until it exits for good.
//!
//! Each iteration makes sure the chosen save is in place, runs one
//! [`Bridge`] over the game, then backs the save up if the run wrote it.
//! A [`RunOutcome::RestartRequested`] starts the next iteration with the
//! session state carried over; anything else ends the session.

use std::io::Write;
use std::os::fd::BorrowedFd;
use std::path::Path;
use std::time::SystemTime;

use tracing::{error, info, warn};

use adomate_types::{AdomateError, PilotConfig};

use crate::bridge::{Bridge, BridgeConfig, RunOutcome};
use crate::saves::{SaveSelection, SaveStore};
use crate::state::SessionState;
use crate::trigger::{EngineContext, TriggerEngine};

/// Flag the game takes before a save identifier to load it.
pub const LOAD_FLAG: &str = "-l";

/// How a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The game exited without a pending restart.
    Clean,
    /// A run could not start or broke down.
    Failed(AdomateError),
}

/// Summary of a finished session.
#[derive(Debug)]
pub struct SessionReport {
    /// Number of times the game was launched.
    pub runs: u32,
    pub end: SessionEnd,
    /// State at the end of the last run.
    pub state: SessionState,
    /// The save played last, if any.
    pub selection: Option<SaveSelection>,
}

impl SessionReport {
    /// No fatal error and no transient error along the way.
    pub fn is_clean(&self) -> bool {
        matches!(self.end, SessionEnd::Clean) && !self.state.had_error
    }
}

/// Runs sessions of the game with a fixed configuration and save store.
pub struct SessionSupervisor<'c> {
    config: &'c PilotConfig,
    store: SaveStore,
}

impl<'c> SessionSupervisor<'c> {
    pub fn new(config: &'c PilotConfig, store: SaveStore) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> &SaveStore {
        &self.store
    }

    /// Play `selection` (or a new game when `None`) until the game exits
    /// without asking for a restart.
    ///
    /// `input` and `output` are handed to every [`Bridge`] run.
    pub fn run_session(
        &self,
        selection: Option<SaveSelection>,
        input: BorrowedFd<'_>,
        output: &mut dyn Write,
    ) -> SessionReport {
        let mut selection = selection;
        let mut state = SessionState::new();
        let mut runs = 0u32;

        let end = loop {
            runs += 1;

            if let Some(sel) = &selection {
                if let Err(e) = self.store.ensure_active(sel) {
                    error!(error = %e, "save is not available");
                    break SessionEnd::Failed(e);
                }
            }

            let context = EngineContext {
                save_loaded: selection.is_some(),
            };
            let engine = match TriggerEngine::new(self.config, context) {
                Ok(engine) => engine,
                Err(e) => {
                    error!(error = %e, "could not build trigger rules");
                    break SessionEnd::Failed(e);
                }
            };

            let args = selection
                .as_ref()
                .map(|sel| vec![LOAD_FLAG.to_string(), sel.identifier.clone()])
                .unwrap_or_default();
            info!(run = runs, args = ?args, state = %state, "starting game");

            let started = SystemTime::now();
            let bridge = Bridge::new(BridgeConfig::from_pilot(self.config, args), &engine);
            let outcome = bridge.run(input, &mut *output, &mut state);

            self.after_run(&mut selection, started, &mut state);

            match outcome {
                RunOutcome::RestartRequested { exit_code } => {
                    info!(exit_code, state = %state, "restarting game");
                    state = state.for_run();
                }
                RunOutcome::Completed { exit_code } => {
                    info!(exit_code, runs, "session finished");
                    break SessionEnd::Clean;
                }
                RunOutcome::Fatal(e) => {
                    error!(error = %e, runs, "session failed");
                    break SessionEnd::Failed(e);
                }
            }
        };

        SessionReport {
            runs,
            end,
            state,
            selection,
        }
    }

    /// Back up the save the run wrote. A new game adopts the save it
    /// created so that a restart loads it.
    fn after_run(
        &self,
        selection: &mut Option<SaveSelection>,
        started: SystemTime,
        state: &mut SessionState,
    ) {
        if selection.is_none() {
            match self.store.find_written_since(started) {
                Ok(Some(found)) => {
                    info!(identifier = %found.identifier, file = %found.file_name, "adopting new save");
                    *selection = Some(found);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "could not look for a new save");
                    state.had_error = true;
                }
            }
        }

        if let Some(sel) = selection.as_ref() {
            if let Err(e) = self.store.backup_if_written(sel, started) {
                warn!(error = %e, "could not back up save");
                state.had_error = true;
            }
        }
    }
}

/// Delete the session's log file if the session was clean.
///
/// Returns whether the file was removed.
pub fn discard_log_if_clean(report: &SessionReport, log_path: &Path) -> Result<bool, AdomateError> {
    if !report.is_clean() {
        return Ok(false);
    }
    match std::fs::remove_file(log_path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(AdomateError::IoError(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(end: SessionEnd, had_error: bool) -> SessionReport {
        let mut state = SessionState::new();
        state.had_error = had_error;
        SessionReport {
            runs: 1,
            end,
            state,
            selection: None,
        }
    }

    #[test]
    fn clean_report_requires_no_errors() {
        assert!(report(SessionEnd::Clean, false).is_clean());
        assert!(!report(SessionEnd::Clean, true).is_clean());
        let failed = SessionEnd::Failed(AdomateError::SpawnError("adom".into()));
        assert!(!report(failed, false).is_clean());
    }

    #[test]
    fn clean_session_discards_log() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("adom_log.log");
        std::fs::write(&log, "trace").unwrap();

        assert!(!discard_log_if_clean(&report(SessionEnd::Clean, true), &log).unwrap());
        assert!(log.exists());

        assert!(discard_log_if_clean(&report(SessionEnd::Clean, false), &log).unwrap());
        assert!(!log.exists());

        assert!(!discard_log_if_clean(&report(SessionEnd::Clean, false), &log).unwrap());
    }
}
