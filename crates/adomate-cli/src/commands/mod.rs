//! CLI command implementations for the `adomate` binary.

pub mod play;
pub mod saves;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use adomate_types::PilotConfig;

/// The user's home directory from `HOME`.
pub fn dirs_from_env() -> Result<PathBuf> {
    std::env::var("HOME")
        .map(PathBuf::from)
        .context("HOME environment variable is not set")
}

/// Load the configuration from `path`, or from the default location under
/// `home`, then apply environment overrides.
pub fn load_config(home: &Path, path: Option<&Path>) -> Result<PilotConfig> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PilotConfig::default_path(home));
    let mut config = PilotConfig::load(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    config.apply_env();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_default_config_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = load_config(tmp.path(), None).unwrap();
        assert_eq!(config.terminal.rows, 25);
        assert_eq!(config.terminal.cols, 80);
    }

    #[test]
    fn explicit_config_path_is_used() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("custom.toml");
        std::fs::write(&path, "log_dir = \"/var/tmp/adomate\"\n").unwrap();
        let config = load_config(tmp.path(), Some(&path)).unwrap();
        assert_eq!(config.log_dir, PathBuf::from("/var/tmp/adomate"));
    }

    #[test]
    fn broken_config_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.toml");
        std::fs::write(&path, "terminal = 3\n").unwrap();
        let err = load_config(tmp.path(), Some(&path)).unwrap_err();
        assert!(err.to_string().contains("broken.toml"), "{err}");
    }
}
