//! `adomate play`: pick a save, then run the game under the supervisor.

use std::io::Write;
use std::os::fd::AsFd;
use std::path::Path;

use anyhow::{Context, Result};
use dialoguer::Select;
use tracing::{info, warn};

use adomate_pilot::saves::{SaveSelection, SaveStore, SavedGame};
use adomate_pilot::supervisor::{discard_log_if_clean, SessionEnd, SessionSupervisor};

use crate::commands::{dirs_from_env, load_config};
use crate::logging;

/// Menu entry that starts a new game.
const NEW_GAME: &str = "Start a new game";

/// Run `adomate play`.
///
/// `game` loads the latest backup of that game, `new` starts a fresh one,
/// and with neither the user picks from a menu.
pub fn run(config_path: Option<&Path>, game: Option<&str>, new: bool) -> Result<()> {
    let home = dirs_from_env()?;
    let config = load_config(&home, config_path)?;
    let store = SaveStore::from_config(&config, &home);

    let selection = if new {
        None
    } else if let Some(name) = game {
        Some(
            store
                .restore_latest(name)
                .with_context(|| format!("failed to restore game {name:?}"))?,
        )
    } else {
        pick_game(&store)?
    };

    let log_path = logging::init(&config.log_dir)?;
    info!(
        command = %config.command,
        saves = %store.saves_dir().display(),
        backups = %store.backup_dir().display(),
        identifier = selection.as_ref().map(|s| s.identifier.as_str()).unwrap_or("<new game>"),
        "session starting"
    );

    let supervisor = SessionSupervisor::new(&config, store);
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let report = supervisor.run_session(selection, stdin.as_fd(), &mut stdout);
    // The game may leave the cursor mid-line.
    let _ = writeln!(stdout);

    match discard_log_if_clean(&report, &log_path) {
        Ok(true) => {}
        Ok(false) => info!(log = %log_path.display(), runs = report.runs, "keeping session log"),
        Err(e) => warn!(error = %e, "failed to delete session log"),
    }

    match report.end {
        SessionEnd::Clean => Ok(()),
        SessionEnd::Failed(e) => Err(e).with_context(|| {
            format!("game session failed (log: {})", log_path.display())
        }),
    }
}

/// Ask which backed-up game to load. `None` starts a new game.
fn pick_game(store: &SaveStore) -> Result<Option<SaveSelection>> {
    let games = store.list_games().context("failed to list saved games")?;
    let items = menu_items(&games);

    let choice = Select::new()
        .with_prompt("Select a game to load")
        .items(&items)
        .default(0)
        .interact()
        .context("failed to read selection")?;

    match games.get(choice) {
        Some(game) => store
            .restore_latest(&game.name)
            .map(Some)
            .with_context(|| format!("failed to restore game {:?}", game.name)),
        None => Ok(None),
    }
}

/// One "Load game" entry per backed-up game, then the new-game entry.
fn menu_items(games: &[SavedGame]) -> Vec<String> {
    games
        .iter()
        .map(|g| format!("Load game: {}", g.name))
        .chain(std::iter::once(NEW_GAME.to_string()))
        .collect()
}
