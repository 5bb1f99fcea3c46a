//! `adomate saves`: list backed-up games.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use adomate_pilot::saves::{read_save_identifier, SaveStore, SavedGame};

use crate::commands::{dirs_from_env, load_config};

/// Run `adomate saves`.
pub fn run(config_path: Option<&Path>) -> Result<()> {
    let home = dirs_from_env()?;
    let config = load_config(&home, config_path)?;
    let store = SaveStore::from_config(&config, &home);

    let games = store.list_games().context("failed to list saved games")?;
    if games.is_empty() {
        println!("No saved games in {}.", store.backup_dir().display());
        return Ok(());
    }

    println!("{:<16} {:<14} LATEST BACKUP", "GAME", "IDENTIFIER");
    for game in &games {
        println!("{}", format_row(game));
    }
    Ok(())
}

fn format_row(game: &SavedGame) -> String {
    let identifier = game
        .latest
        .as_deref()
        .and_then(|path| read_save_identifier(path).ok())
        .unwrap_or_else(|| "-".into());
    let latest = match (&game.latest, game.modified) {
        (Some(path), Some(modified)) => {
            let at: DateTime<Local> = modified.into();
            let file = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            format!("{file} ({})", at.format("%Y-%m-%d %H:%M:%S"))
        }
        _ => "none".into(),
    };
    format!("{:<16} {:<14} {latest}", game.name, identifier)
}
