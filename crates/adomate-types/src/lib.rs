//! Core types shared across the adomate crates.
//!
//! Defines the error type and the TOML-backed configuration consumed by the
//! pilot engine and the CLI.

pub mod config;
pub mod error;

pub use config::{
    describe_key, DrinkingConfig, KeyConfig, PatternConfig, PilotConfig, TerminalConfig,
    COMMAND_ENV, CONFIG_DIR, CONFIG_FILENAME,
};
pub use error::AdomateError;
