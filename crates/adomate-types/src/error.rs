//! Error types shared across all adomate crates.

/// Errors that can occur while piloting a game session.
///
/// Each variant corresponds to a subsystem: the pseudo-terminal, spawning
/// the child, the controlling terminal, save files, or configuration.
#[derive(Debug, thiserror::Error)]
pub enum AdomateError {
    #[error("pty error: {0}")]
    PtyError(String),

    #[error("failed to spawn child process: {0}")]
    SpawnError(String),

    #[error("terminal error: {0}")]
    TerminalError(String),

    #[error("save file error: {0}")]
    SaveError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}
