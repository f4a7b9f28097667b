//! Filesystem layout helpers for the gate's on-disk state.

use std::path::{Path, PathBuf};

/// Directory holding persistent gate state when none is configured.
pub const DEFAULT_STATE_DIR: &str = ".vestibule";

/// File name of the persisted visit session inside the state dir.
pub const SESSION_FILE: &str = "session.json";

#[inline]
pub fn default_state_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_DIR)
}

#[inline]
pub fn session_file(state_dir: &Path) -> PathBuf {
    state_dir.join(SESSION_FILE)
}

/// Scratch path used for the write-then-rename session persist.
#[inline]
pub fn session_file_tmp(state_dir: &Path) -> PathBuf {
    state_dir.join(format!("{SESSION_FILE}.tmp"))
}
