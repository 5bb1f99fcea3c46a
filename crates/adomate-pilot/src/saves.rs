//! Save files and their backup copies.
//!
//! The game keeps its saves in one directory and deletes a save once it is
//! loaded. [`SaveStore`] keeps a copy of every save it has seen under
//! `backup_dir/<game>/`, puts the latest copy back before the game starts,
//! and refreshes the copy after each run that wrote the save. A new save
//! gets a directory named after its identifier; a restored save keeps the
//! directory it was restored from.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};

use adomate_types::{AdomateError, PilotConfig};

/// Offset of the character name inside a save file header.
pub const IDENTIFIER_OFFSET: u64 = 0x10;
/// Width of the character name field.
pub const IDENTIFIER_LEN: usize = 12;

/// The save a session plays: the name passed to the game's load flag, the
/// file holding it, and the backup directory it is kept in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSelection {
    pub identifier: String,
    pub file_name: String,
    /// Directory name under the backup root.
    pub game: String,
}

impl SaveSelection {
    /// A save backed up under a directory named after its identifier.
    pub fn new(identifier: impl Into<String>, file_name: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self {
            game: identifier.clone(),
            identifier,
            file_name: file_name.into(),
        }
    }
}

/// A game found in the backup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedGame {
    /// Directory name under the backup root.
    pub name: String,
    /// Most recently modified backup file, if the directory has any.
    pub latest: Option<PathBuf>,
    pub modified: Option<SystemTime>,
}

/// Read the identifier stored in a save file's header.
pub fn read_save_identifier(path: &Path) -> Result<String, AdomateError> {
    let mut file = File::open(path).map_err(|e| save_error("open", path, e))?;
    file.seek(SeekFrom::Start(IDENTIFIER_OFFSET))
        .map_err(|e| save_error("seek", path, e))?;

    let mut field = [0u8; IDENTIFIER_LEN];
    file.read_exact(&mut field)
        .map_err(|e| save_error("read header of", path, e))?;

    let end = field.iter().position(|&b| b == 0).unwrap_or(IDENTIFIER_LEN);
    let identifier = std::str::from_utf8(&field[..end]).map_err(|e| {
        AdomateError::SaveError(format!("{}: identifier is not UTF-8: {e}", path.display()))
    })?;
    if identifier.is_empty() {
        return Err(AdomateError::SaveError(format!(
            "{}: empty identifier",
            path.display()
        )));
    }
    Ok(identifier.to_string())
}

/// Active saves directory plus the backup root.
#[derive(Debug, Clone)]
pub struct SaveStore {
    saves_dir: PathBuf,
    backup_dir: PathBuf,
}

impl SaveStore {
    pub fn new(saves_dir: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            saves_dir: saves_dir.into(),
            backup_dir: backup_dir.into(),
        }
    }

    /// Directories from configuration, relative to `home` where unset.
    pub fn from_config(config: &PilotConfig, home: &Path) -> Self {
        Self::new(config.saves_dir(home), config.backup_dir(home))
    }

    pub fn saves_dir(&self) -> &Path {
        &self.saves_dir
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Every game with a backup directory, sorted by name.
    ///
    /// The backup root is created if it does not exist yet.
    pub fn list_games(&self) -> Result<Vec<SavedGame>, AdomateError> {
        create_dir(&self.backup_dir)?;

        let mut games = Vec::new();
        for entry in read_dir(&self.backup_dir)? {
            if !entry.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let latest = latest_file(&entry)?;
            games.push(SavedGame {
                name: name.to_string(),
                modified: latest.as_ref().map(|(_, t)| *t),
                latest: latest.map(|(p, _)| p),
            });
        }
        games.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(games)
    }

    /// Copy the newest backup of `game` into the saves directory.
    pub fn restore_latest(&self, game: &str) -> Result<SaveSelection, AdomateError> {
        let game_dir = self.backup_dir.join(game);
        let (latest, _) = latest_file(&game_dir)?.ok_or_else(|| {
            AdomateError::SaveError(format!("no backups in {}", game_dir.display()))
        })?;
        let file_name = file_name_of(&latest)?;
        let identifier = read_save_identifier(&latest)?;

        create_dir(&self.saves_dir)?;
        let active = self.saves_dir.join(&file_name);
        copy_preserving_mtime(&latest, &active)?;
        info!(
            game,
            identifier,
            from = %latest.display(),
            to = %active.display(),
            "restored latest backup"
        );

        Ok(SaveSelection {
            identifier,
            file_name,
            game: game.to_string(),
        })
    }

    /// Put the backup copy back if the active save file is missing.
    ///
    /// Returns whether a copy was made.
    pub fn ensure_active(&self, selection: &SaveSelection) -> Result<bool, AdomateError> {
        let active = self.active_path(selection);
        if active.exists() {
            return Ok(false);
        }
        let backup = self.backup_path(selection);
        if !backup.exists() {
            return Err(AdomateError::SaveError(format!(
                "{} is missing and has no backup at {}",
                active.display(),
                backup.display()
            )));
        }
        create_dir(&self.saves_dir)?;
        copy_preserving_mtime(&backup, &active)?;
        info!(file = %active.display(), "restored save from backup");
        Ok(true)
    }

    /// Copy the active save into the backup root if it was written at or
    /// after `since`.
    ///
    /// Returns the backup path when a copy was made.
    pub fn backup_if_written(
        &self,
        selection: &SaveSelection,
        since: SystemTime,
    ) -> Result<Option<PathBuf>, AdomateError> {
        let active = self.active_path(selection);
        let modified = match fs::metadata(&active).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(file = %active.display(), "no active save to back up");
                return Ok(None);
            }
            Err(e) => return Err(save_error("stat", &active, e)),
        };
        if modified < since {
            debug!(file = %active.display(), "save untouched this run");
            return Ok(None);
        }

        let backup = self.backup_path(selection);
        if let Some(parent) = backup.parent() {
            create_dir(parent)?;
        }
        copy_preserving_mtime(&active, &backup)?;
        info!(from = %active.display(), to = %backup.display(), "backed up save");
        Ok(Some(backup))
    }

    /// The newest save in the saves directory written at or after `since`.
    ///
    /// Files whose header has no readable identifier are skipped.
    pub fn find_written_since(
        &self,
        since: SystemTime,
    ) -> Result<Option<SaveSelection>, AdomateError> {
        if !self.saves_dir.is_dir() {
            return Ok(None);
        }
        let mut candidates: Vec<(PathBuf, SystemTime)> = Vec::new();
        for path in read_dir(&self.saves_dir)? {
            if let Some(modified) = modified_file(&path)? {
                if modified >= since {
                    candidates.push((path, modified));
                }
            }
        }
        candidates.sort_by(|a, b| b.1.cmp(&a.1));

        for (path, _) in candidates {
            match read_save_identifier(&path) {
                Ok(identifier) => {
                    return Ok(Some(SaveSelection::new(identifier, file_name_of(&path)?)));
                }
                Err(e) => debug!(error = %e, "skipping unreadable save"),
            }
        }
        Ok(None)
    }

    fn active_path(&self, selection: &SaveSelection) -> PathBuf {
        self.saves_dir.join(&selection.file_name)
    }

    fn backup_path(&self, selection: &SaveSelection) -> PathBuf {
        self.backup_dir
            .join(&selection.game)
            .join(&selection.file_name)
    }
}

fn save_error(action: &str, path: &Path, e: std::io::Error) -> AdomateError {
    AdomateError::SaveError(format!("failed to {action} {}: {e}", path.display()))
}

fn create_dir(dir: &Path) -> Result<(), AdomateError> {
    fs::create_dir_all(dir).map_err(|e| save_error("create", dir, e))
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>, AdomateError> {
    fs::read_dir(dir)
        .map_err(|e| save_error("list", dir, e))?
        .map(|entry| {
            entry
                .map(|e| e.path())
                .map_err(|e| save_error("list", dir, e))
        })
        .collect()
}

/// Modification time of `path` if it is a regular file.
fn modified_file(path: &Path) -> Result<Option<SystemTime>, AdomateError> {
    let meta = fs::metadata(path).map_err(|e| save_error("stat", path, e))?;
    if !meta.is_file() {
        return Ok(None);
    }
    meta.modified()
        .map(Some)
        .map_err(|e| save_error("stat", path, e))
}

/// The most recently modified regular file directly inside `dir`.
fn latest_file(dir: &Path) -> Result<Option<(PathBuf, SystemTime)>, AdomateError> {
    let mut latest: Option<(PathBuf, SystemTime)> = None;
    for path in read_dir(dir)? {
        let Some(modified) = modified_file(&path)? else {
            continue;
        };
        if latest.as_ref().map_or(true, |(_, t)| modified > *t) {
            latest = Some((path, modified));
        }
    }
    Ok(latest)
}

fn file_name_of(path: &Path) -> Result<String, AdomateError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| AdomateError::SaveError(format!("bad save file name: {}", path.display())))
}

/// Copy a file and carry over its modification time.
fn copy_preserving_mtime(from: &Path, to: &Path) -> Result<(), AdomateError> {
    fs::copy(from, to).map_err(|e| save_error("copy", from, e))?;
    let modified = fs::metadata(from)
        .and_then(|m| m.modified())
        .map_err(|e| save_error("stat", from, e))?;
    File::options()
        .write(true)
        .open(to)
        .and_then(|f| f.set_modified(modified))
        .map_err(|e| save_error("set mtime of", to, e))
}
