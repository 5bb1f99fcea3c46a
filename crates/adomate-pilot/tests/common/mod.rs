//! Shared helpers for integration tests.
//!
//! Each integration test file compiles common/ as its own module, so not
//! every helper is used in every file.
#![allow(dead_code)]

use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use adomate_pilot::bridge::BridgeConfig;

/// Shell prologue for a simulated game: raw-ish input, no echo.
pub const GAME_PROLOGUE: &str = "stty -icanon -echo min 1\n";

/// Bridge settings running `script` under `/bin/sh`.
pub fn sh_bridge_config(script: &str) -> BridgeConfig {
    BridgeConfig {
        command: "/bin/sh".into(),
        args: vec!["-c".into(), format!("{GAME_PROLOGUE}{script}")],
        rows: 25,
        cols: 80,
        debounce: Duration::from_millis(50),
        poll_ms: 20,
        read_chunk: 1024,
        toggle_key: vec![0x14],
    }
}

/// A pipe standing in for the human's terminal: (read end, write end).
pub fn input_pipe() -> (OwnedFd, OwnedFd) {
    nix::unistd::pipe().expect("should create input pipe")
}

/// Write an executable shell script into `dir` and return its path.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{GAME_PROLOGUE}{body}"))
        .expect("should write game script");
    let mut perms = std::fs::metadata(&path)
        .expect("should stat game script")
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("should chmod game script");
    path
}

/// Write a save file whose header carries `identifier`.
pub fn write_save(path: &Path, identifier: &str) {
    let mut data = vec![0u8; 0x40];
    data[0x10..0x10 + identifier.len()].copy_from_slice(identifier.as_bytes());
    std::fs::write(path, data).expect("should write save file");
}

pub fn text(output: &[u8]) -> String {
    String::from_utf8_lossy(output).into_owned()
}
