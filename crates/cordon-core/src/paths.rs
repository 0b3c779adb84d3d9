//! Path resolution utilities.

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Get the user's home directory.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(Error::MissingDirectory("home"))
}

/// Get the Cordon base directory (~/.cordon).
pub fn base_dir() -> Result<PathBuf> {
    Ok(home_dir()?.join(".cordon"))
}

/// Get the system temporary directory.
pub fn temp_dir() -> PathBuf {
    std::env::temp_dir()
}

/// Expand tilde (~) in a path.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Join a path onto the home directory, as a string pattern.
///
/// Used by policy factories that express rules over home-relative locations
/// (e.g. `~/.ssh`) without requiring the caller to resolve them first.
pub fn home_pattern(relative: &str) -> Result<String> {
    let joined = home_dir()?.join(relative);
    Ok(joined.to_string_lossy().into_owned())
}
