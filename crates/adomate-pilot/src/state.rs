//! Session state tracked across screens and runs.

use std::fmt;

/// The automaton's memory of which prompt sequence is in progress.
///
/// One value lives for a whole supervised session. Only the trigger engine
/// produces new values; the bridge stores them and the supervisor reads them
/// between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    pub in_startup_sequence: bool,
    pub in_save_sequence: bool,
    pub in_quit_sequence: bool,
    pub in_drinking_sequence: bool,
    pub drinking_auto_repeat: bool,
    pub restart_requested: bool,
    pub had_error: bool,
}

/// A single flag of [`SessionState`] that a rule can set or clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Startup,
    Save,
    Quit,
    Drinking,
    Restart,
}

impl SessionState {
    /// State for the first run of a session.
    pub fn new() -> Self {
        Self::default().for_run()
    }

    /// State to start the next run with.
    ///
    /// The game starts over at its title screens, so the startup sequence is
    /// re-entered and the restart request is consumed. Save, quit, drinking
    /// and error flags carry over so a restart resumes where the last run
    /// left off.
    pub fn for_run(self) -> Self {
        Self {
            in_startup_sequence: true,
            restart_requested: false,
            ..self
        }
    }

    /// Write a flag.
    pub fn set(&mut self, flag: Flag, value: bool) {
        let slot = match flag {
            Flag::Startup => &mut self.in_startup_sequence,
            Flag::Save => &mut self.in_save_sequence,
            Flag::Quit => &mut self.in_quit_sequence,
            Flag::Drinking => &mut self.in_drinking_sequence,
            Flag::Restart => &mut self.restart_requested,
        };
        *slot = value;
    }

    /// Whether a save, quit or drinking sequence is underway.
    pub fn in_any_sequence(&self) -> bool {
        self.in_save_sequence || self.in_quit_sequence || self.in_drinking_sequence
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (self.in_startup_sequence, "startup"),
            (self.in_save_sequence, "save"),
            (self.in_quit_sequence, "quit"),
            (self.in_drinking_sequence, "drinking"),
            (self.drinking_auto_repeat, "auto-repeat"),
            (self.restart_requested, "restart"),
            (self.had_error, "error"),
        ];
        let active: Vec<&str> = flags
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| *name)
            .collect();
        if active.is_empty() {
            write!(f, "idle")
        } else {
            write!(f, "{}", active.join("+"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_in_startup() {
        let state = SessionState::new();
        assert!(state.in_startup_sequence);
        assert!(!state.in_any_sequence());
        assert!(!state.restart_requested);
    }

    #[test]
    fn for_run_preserves_sequences_and_consumes_restart() {
        let state = SessionState {
            in_quit_sequence: true,
            drinking_auto_repeat: true,
            restart_requested: true,
            had_error: true,
            ..SessionState::default()
        };
        let next = state.for_run();
        assert!(next.in_startup_sequence);
        assert!(next.in_quit_sequence);
        assert!(next.drinking_auto_repeat);
        assert!(next.had_error);
        assert!(!next.restart_requested);
    }

    #[test]
    fn set_writes_the_matching_field() {
        let mut state = SessionState::default();
        state.set(Flag::Startup, true);
        state.set(Flag::Save, true);
        state.set(Flag::Quit, true);
        state.set(Flag::Drinking, true);
        state.set(Flag::Restart, true);
        assert!(state.in_startup_sequence);
        assert!(state.in_save_sequence);
        assert!(state.in_quit_sequence);
        assert!(state.in_drinking_sequence);
        assert!(state.restart_requested);
        assert!(!state.drinking_auto_repeat);

        state.set(Flag::Drinking, false);
        assert!(!state.in_drinking_sequence);
    }

    #[test]
    fn display_lists_active_flags() {
        assert_eq!(SessionState::default().to_string(), "idle");
        let state = SessionState {
            in_drinking_sequence: true,
            drinking_auto_repeat: true,
            ..SessionState::default()
        };
        assert_eq!(state.to_string(), "drinking+auto-repeat");
    }
}
