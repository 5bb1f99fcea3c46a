//! Configuration types for a piloted game session.
//!
//! [`PilotConfig`] is loaded from `~/.adomate/config.toml` when present and
//! otherwise falls back to defaults tuned for ADOM. Every field carries a
//! serde default, so a partial file only overrides what it names.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::AdomateError;

/// Directory under `$HOME` holding adomate's own files.
pub const CONFIG_DIR: &str = ".adomate";

/// Name of the configuration file inside [`CONFIG_DIR`].
pub const CONFIG_FILENAME: &str = "config.toml";

/// Environment variable overriding the game command.
pub const COMMAND_ENV: &str = "ADOM_PATH";

/// Top-level configuration for the pilot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PilotConfig {
    /// Game executable (looked up on `PATH` when not absolute).
    pub command: String,
    /// Directory where the game keeps its active save files.
    /// Defaults to `$HOME/.adom.data/savedg`.
    pub saves_dir: Option<PathBuf>,
    /// Root directory of per-game backup copies.
    /// Defaults to `$HOME/.adompy.data`.
    pub backup_dir: Option<PathBuf>,
    /// Directory for the per-run diagnostic log.
    pub log_dir: PathBuf,
    /// PTY geometry and relay timing.
    pub terminal: TerminalConfig,
    /// Keystrokes injected into the game.
    pub keys: KeyConfig,
    /// Screen patterns recognized by the trigger engine.
    pub patterns: PatternConfig,
    /// Outcome messages of drinking from a pool.
    pub drinking: DrinkingConfig,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            command: "adom".into(),
            saves_dir: None,
            backup_dir: None,
            log_dir: PathBuf::from("."),
            terminal: TerminalConfig::default(),
            keys: KeyConfig::default(),
            patterns: PatternConfig::default(),
            drinking: DrinkingConfig::default(),
        }
    }
}

impl PilotConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, AdomateError> {
        toml::from_str(content).map_err(|e| AdomateError::ConfigError(e.to_string()))
    }

    /// Serialize the configuration to pretty TOML.
    pub fn to_toml(&self) -> Result<String, AdomateError> {
        toml::to_string_pretty(self).map_err(|e| AdomateError::ConfigError(e.to_string()))
    }

    /// Load a configuration file, returning defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, AdomateError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(AdomateError::ConfigError(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    /// Default location of the configuration file for a home directory.
    pub fn default_path(home: &Path) -> PathBuf {
        home.join(CONFIG_DIR).join(CONFIG_FILENAME)
    }

    /// Apply the `ADOM_PATH` override, if set and non-empty.
    pub fn apply_env(&mut self) {
        if let Ok(command) = std::env::var(COMMAND_ENV) {
            if !command.trim().is_empty() {
                self.command = command;
            }
        }
    }

    /// Resolved active-saves directory.
    pub fn saves_dir(&self, home: &Path) -> PathBuf {
        self.saves_dir
            .clone()
            .unwrap_or_else(|| home.join(".adom.data").join("savedg"))
    }

    /// Resolved backup root directory.
    pub fn backup_dir(&self, home: &Path) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| home.join(".adompy.data"))
    }
}

/// Pseudo-terminal geometry and relay loop timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TerminalConfig {
    pub rows: u16,
    pub cols: u16,
    /// Quiet interval after which buffered output counts as a settled screen.
    pub debounce_ms: u64,
    /// Upper bound on a single multiplex wait.
    pub poll_ms: u16,
    /// Maximum bytes taken from a descriptor per read.
    pub read_chunk: usize,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            rows: 25,
            cols: 80,
            debounce_ms: 50,
            poll_ms: 100,
            read_chunk: 1024,
        }
    }
}

/// Keystrokes sent to the game, plus the reserved toggle key read from the human.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KeyConfig {
    /// Starts the game from the main menu.
    pub start_game: String,
    /// Answers yes/no prompts affirmatively.
    pub confirm: String,
    /// Chooses "quit" on the credits and main-menu prompts.
    pub quit: String,
    /// Dismisses an exit screen.
    pub dismiss: String,
    /// Advances a pager.
    pub more: String,
    /// Drinks (quaffs) from a pool.
    pub drink: String,
    /// Saves the game.
    pub save: String,
    /// Clears any pending messages and force-quits without saving.
    pub bail_out: String,
    /// Reserved input from the human that toggles auto-drinking.
    /// Never forwarded to the game.
    pub toggle: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            start_game: "P".into(),
            confirm: "y".into(),
            quit: "q".into(),
            dismiss: "\u{1b}".into(),
            more: " ".into(),
            drink: "q".into(),
            save: "S".into(),
            bail_out: "\n\n\n\nQ".into(),
            toggle: "\u{14}".into(),
        }
    }
}

/// Regular expressions for the screens the trigger engine reacts to.
///
/// Patterns are matched against ANSI-stripped, trimmed screen text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PatternConfig {
    pub menu_reached: String,
    /// Must contain one capture group holding the exit key.
    pub advert_exit: String,
    pub save_confirm: String,
    pub press_space: String,
    pub credits_or_quit: String,
    pub quit_confirm: String,
    pub exit_footer: String,
    pub main_menu_or_quit: String,
    pub more: String,
    pub pool_seen: String,
    pub drink_confirm: String,
    pub frog: String,
    pub wish: String,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            menu_reached: r"--- Play the Game --- Credits ---$".into(),
            advert_exit: r"(?m)-- \[(.)\] Exit -+\s*$".into(),
            save_confirm: r"(?i)save the game\?.*\[y/n\]".into(),
            press_space: r"(?i)press space to continue".into(),
            credits_or_quit: r"(?i)read the credits.*quit".into(),
            quit_confirm: r"(?i)quit the game\?.*\[y/n\]".into(),
            exit_footer: r"(?i)press (?:esc|escape) to exit".into(),
            main_menu_or_quit: r"(?i)return to (?:the )?main menu.*quit".into(),
            more: r"\(more\)$".into(),
            pool_seen: r"(?i)you see a (?:[a-z]+ )?pool".into(),
            drink_confirm: r"(?i)drink from the pool\?.*\[y/n\]".into(),
            frog: r"(?i)a small frog pops up.*\(more\)".into(),
            wish: r"(?i)what do you wish for".into(),
        }
    }
}

/// Messages classifying the outcome of drinking from a pool.
///
/// Matched by substring containment; `bad` is checked before `good`,
/// `good` before `neutral`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DrinkingConfig {
    pub bad: Vec<String>,
    pub good: Vec<String>,
    pub neutral: Vec<String>,
}

impl Default for DrinkingConfig {
    fn default() -> Self {
        Self {
            bad: vec!["You age!".into()],
            good: vec!["You feel very lucky".into()],
            neutral: vec!["Nothing happens".into()],
        }
    }
}

/// Human-readable name of a key sequence, e.g. `Ctrl-T` for `"\u{14}"`.
pub fn describe_key(key: &str) -> String {
    match key.as_bytes() {
        [b @ 0x01..=0x1a] => format!("Ctrl-{}", char::from(b'A' + b - 1)),
        [0x1b] => "Esc".into(),
        [b' '] => "Space".into(),
        _ => key.escape_default().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_adom_layout() {
        let config = PilotConfig::default();
        let home = Path::new("/home/player");
        assert_eq!(config.command, "adom");
        assert_eq!(config.saves_dir(home), home.join(".adom.data/savedg"));
        assert_eq!(config.backup_dir(home), home.join(".adompy.data"));
        assert_eq!(config.terminal.rows, 25);
        assert_eq!(config.terminal.cols, 80);
        assert_eq!(config.terminal.debounce_ms, 50);
        assert_eq!(config.terminal.poll_ms, 100);
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = PilotConfig::default();
        let toml_str = config.to_toml().unwrap();
        let parsed = PilotConfig::from_toml(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let parsed = PilotConfig::from_toml(
            r#"
            command = "/opt/adom/adom"

            [drinking]
            bad = ["You age!", "You feel cursed"]
            "#,
        )
        .unwrap();
        assert_eq!(parsed.command, "/opt/adom/adom");
        assert_eq!(parsed.drinking.bad.len(), 2);
        assert_eq!(parsed.drinking.good, DrinkingConfig::default().good);
        assert_eq!(parsed.keys, KeyConfig::default());
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = PilotConfig::from_toml("command = [").unwrap_err();
        assert!(matches!(err, AdomateError::ConfigError(_)));
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let tmpdir = tempfile::tempdir().expect("temp dir");
        let config = PilotConfig::load(&tmpdir.path().join("absent.toml")).unwrap();
        assert_eq!(config, PilotConfig::default());
    }

    #[test]
    fn load_reads_existing_file() {
        let tmpdir = tempfile::tempdir().expect("temp dir");
        let path = tmpdir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "log_dir = \"/var/log/adomate\"\n").unwrap();
        let config = PilotConfig::load(&path).unwrap();
        assert_eq!(config.log_dir, PathBuf::from("/var/log/adomate"));
    }

    #[test]
    fn describe_control_keys() {
        assert_eq!(describe_key("\u{14}"), "Ctrl-T");
        assert_eq!(describe_key("\u{1}"), "Ctrl-A");
        assert_eq!(describe_key("\u{1b}"), "Esc");
        assert_eq!(describe_key("x"), "x");
    }
}
