mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// adomate -- plays ADOM with you, answering its routine prompts.
#[derive(Parser, Debug)]
#[command(name = "adomate", version, about)]
struct Cli {
    /// Configuration file (defaults to ~/.adomate/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Launch the game (the default)
    Play {
        /// Load the latest backup of this game instead of asking
        #[arg(long, conflicts_with = "new")]
        game: Option<String>,

        /// Start a new game instead of asking
        #[arg(long)]
        new: bool,
    },

    /// List backed-up games
    Saves,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Play {
        game: None,
        new: false,
    });

    match command {
        Commands::Play { game, new } => {
            commands::play::run(cli.config.as_deref(), game.as_deref(), new)
        }
        Commands::Saves => commands::saves::run(cli.config.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_play() {
        let cli = Cli::try_parse_from(["adomate"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.config, None);
    }

    #[test]
    fn parse_play_with_game() {
        let cli = Cli::try_parse_from(["adomate", "play", "--game", "Hero"]);
        assert!(cli.is_ok(), "should parse play --game: {cli:?}");
        match cli.unwrap().command {
            Some(Commands::Play { game, new }) => {
                assert_eq!(game.as_deref(), Some("Hero"));
                assert!(!new);
            }
            other => panic!("expected Play command, got {other:?}"),
        }
    }

    #[test]
    fn parse_play_new() {
        let cli = Cli::try_parse_from(["adomate", "play", "--new"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Play {
                game: None,
                new: true
            })
        );
    }

    #[test]
    fn game_and_new_conflict() {
        let cli = Cli::try_parse_from(["adomate", "play", "--game", "Hero", "--new"]);
        assert!(cli.is_err(), "--game and --new are exclusive");
    }

    #[test]
    fn parse_saves_with_global_config() {
        let cli = Cli::try_parse_from(["adomate", "saves", "--config", "/tmp/adomate.toml"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Saves));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/adomate.toml")));
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["adomate", "cheat"]).is_err());
    }
}
