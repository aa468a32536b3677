use std::{env, io, path::PathBuf};

use anyhow::{Context, Result};

const APPLICATION_DIR_NAME: &str = "punchclock";

#[cfg(windows)]
fn platform_state_dir() -> Result<PathBuf> {
    env::var("APPDATA")
        .map(PathBuf::from)
        .context("APPDATA should be present on Windows")
}

#[cfg(target_os = "macos")]
fn platform_state_dir() -> Result<PathBuf> {
    env::var("HOME")
        .map(|home| PathBuf::from(home).join("Library/Application Support"))
        .context("Couldn't find HOME")
}

#[cfg(all(unix, not(target_os = "macos")))]
fn platform_state_dir() -> Result<PathBuf> {
    env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|home| PathBuf::from(home).join(".local/state")))
        .context("Couldn't find neither XDG_STATE_HOME nor HOME")
}

/// Returns the directory holding settings and logs, creating it when needed.
pub fn create_application_default_path() -> Result<PathBuf> {
    let path = platform_state_dir()?.join(APPLICATION_DIR_NAME);

    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}
