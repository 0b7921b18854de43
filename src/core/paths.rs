//! core::paths
//!
//! Centralized path routing for autosync storage locations.
//!
//! # Storage Layout
//!
//! Per user (under `~/.autosync/` unless overridden by config):
//! - `config.toml` - Configuration
//! - `repos.txt` - Repository list
//! - `autosync.log` - Audit log
//!
//! Per repository (under the repository's git directory):
//! - `autosync.lock` - Lock marker
//!
//! **Hard rule:** no other module joins these file names by hand.
//!
//! # Example
//!
//! ```
//! use autosync::core::paths::SyncPaths;
//! use std::path::{Path, PathBuf};
//!
//! let paths = SyncPaths::new(PathBuf::from("/home/me/.autosync"));
//! assert_eq!(paths.repo_list_path(), PathBuf::from("/home/me/.autosync/repos.txt"));
//! assert_eq!(
//!     SyncPaths::lock_marker(Path::new("/work/app/.git")),
//!     PathBuf::from("/work/app/.git/autosync.lock")
//! );
//! ```

use std::path::{Path, PathBuf};

/// File name of the per-repository lock marker.
pub const LOCK_FILE_NAME: &str = "autosync.lock";

/// Centralized path routing for autosync storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPaths {
    /// Per-user state directory.
    pub state_dir: PathBuf,
}

impl SyncPaths {
    /// Create paths rooted at an explicit state directory.
    pub fn new(state_dir: PathBuf) -> Self {
        Self { state_dir }
    }

    /// Paths rooted at `~/.autosync`, or `None` without a home directory.
    pub fn from_home() -> Option<Self> {
        dirs::home_dir().map(|home| Self::new(home.join(".autosync")))
    }

    /// Canonical config file location, `<state_dir>/config.toml`.
    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join("config.toml")
    }

    /// Default repository list, `<state_dir>/repos.txt`.
    pub fn repo_list_path(&self) -> PathBuf {
        self.state_dir.join("repos.txt")
    }

    /// Default audit log, `<state_dir>/autosync.log`.
    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("autosync.log")
    }

    /// Lock marker for a repository given its git metadata directory.
    pub fn lock_marker(metadata_dir: &Path) -> PathBuf {
        metadata_dir.join(LOCK_FILE_NAME)
    }
}

/// Expand a leading `~/` against the home directory.
///
/// Paths without the prefix, or when no home directory is known, are
/// returned unchanged.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
