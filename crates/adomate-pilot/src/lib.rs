//! PTY relay that plays ADOM alongside a human.
//!
//! Spawns the game in a pseudo-terminal and relays every byte between it
//! and the human's terminal. Output is also collected into settled screens,
//! stripped of escape sequences and matched against a fixed rule set that
//! answers mechanical prompts (adverts, save and quit confirmations, pool
//! drinking) with synthesized keystrokes.
//!
//! # Architecture
//!
//! - [`ansi`]: escape sequence stripping
//! - [`debounce::Debouncer`]: turns the output stream into settled screens
//! - [`rules`] and [`trigger::TriggerEngine`]: ordered prompt rules and their dispatcher
//! - [`state::SessionState`]: which prompt sequence is in progress
//! - [`pty::PtySession`]: the game process in a pseudo-terminal
//! - [`terminal::RawModeGuard`]: scoped raw mode for the human's terminal
//! - [`bridge::Bridge`]: the poll loop of a single run
//! - [`saves::SaveStore`]: save backups around each run
//! - [`supervisor::SessionSupervisor`]: restarts the game when a rule asks for it

pub mod ansi;
pub mod bridge;
pub mod debounce;
pub mod pty;
pub mod rules;
pub mod saves;
pub mod state;
pub mod supervisor;
pub mod terminal;
pub mod trigger;
