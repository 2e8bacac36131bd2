//! Filesystem path helpers for the Nova home directory layout.

use dirs::home_dir;
use std::path::PathBuf;

/// Returns the Nova home directory, or `None` if the user's home cannot be
/// resolved and `NOVA_HOME` is unset.
pub fn try_nova_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("NOVA_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".nova"))
}

/// Returns the canonical Nova home directory (`~/.nova`).
///
/// # Panics
///
/// Panics if neither `NOVA_HOME` is set nor the user's home directory can be
/// resolved.
pub fn nova_home() -> PathBuf {
    try_nova_home().expect("could not determine home directory; set NOVA_HOME to override")
}

/// `SQLite` metadata store path: `~/.nova/state.db`.
pub fn db_path() -> PathBuf {
    nova_home().join("state.db")
}

/// Local artifact content-addressed store root: `~/.nova/artifacts`.
pub fn artifacts_path() -> PathBuf {
    nova_home().join("artifacts")
}

/// Root under which per-compile and per-resolve work directories are created:
/// `~/.nova/work`.
pub fn work_root() -> PathBuf {
    nova_home().join("work")
}

/// A fresh, unique work directory for a single compile or dependency
/// resolution attempt.
pub fn new_work_dir(prefix: &str) -> std::io::Result<PathBuf> {
    let dir = work_root().join(format!("{prefix}-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Logs directory: `~/.nova/logs`.
pub fn log_dir() -> PathBuf {
    nova_home().join("logs")
}
