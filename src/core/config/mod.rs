//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. CLI flags (`--repos`, `--log-file`)
//!
//! # Config Locations
//!
//! Searched in order, first existing file wins:
//! 1. `--config <path>` (must exist)
//! 2. `$AUTOSYNC_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/autosync/config.toml`
//! 4. `~/.autosync/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use autosync::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("Remote: {}", config.remote());
//! println!("Repository list: {}", config.repo_list_path().unwrap().display());
//! ```

pub mod schema;

pub use schema::{FileConfig, PullStrategy};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::paths::{expand_home, SyncPaths};

/// Errors from configuration operations.
///
/// Every variant is fatal for a run: nothing is touched until the
/// configuration and the repository list have loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("repository list '{path}' could not be read: {source}")]
    RepoListMissing {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("repository list '{path}' contains no repositories")]
    RepoListEmpty { path: PathBuf },

    #[error("home directory not found")]
    NoHomeDir,
}

/// Resolved configuration: file values plus CLI overrides.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Values read from the config file (defaults if none was found)
    pub file: FileConfig,
    /// CLI override for the repository list
    pub repo_list_override: Option<PathBuf>,
    /// CLI override for the audit log
    pub log_file_override: Option<PathBuf>,
    /// Path the file values were loaded from
    loaded_from: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `explicit` or the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if `explicit` is given but unreadable, or if a found
    /// config file cannot be parsed or validated. Missing default locations
    /// are not an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        for candidate in Self::search_paths() {
            if candidate.exists() {
                return Self::load_file(&candidate);
            }
        }

        Ok(Self::default())
    }

    /// Load and validate one config file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: FileConfig = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        file.validate()?;

        Ok(Self {
            file,
            loaded_from: Some(path.to_path_buf()),
            ..Self::default()
        })
    }

    /// Default search locations, in precedence order.
    fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(path) = std::env::var("AUTOSYNC_CONFIG") {
            paths.push(PathBuf::from(path));
        }
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg_home).join("autosync/config.toml"));
        }
        if let Some(state) = SyncPaths::from_home() {
            paths.push(state.config_path());
        }
        paths
    }

    /// Apply CLI overrides.
    pub fn with_overrides(mut self, repo_list: Option<PathBuf>, log_file: Option<PathBuf>) -> Self {
        if repo_list.is_some() {
            self.repo_list_override = repo_list;
        }
        if log_file.is_some() {
            self.log_file_override = log_file;
        }
        self
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Repository list location.
    ///
    /// Defaults to `~/.autosync/repos.txt`.
    pub fn repo_list_path(&self) -> Result<PathBuf, ConfigError> {
        self.resolve(
            self.repo_list_override.as_ref().or(self.file.repo_list.as_ref()),
            SyncPaths::repo_list_path,
        )
    }

    /// Audit log location.
    ///
    /// Defaults to `~/.autosync/autosync.log`.
    pub fn log_path(&self) -> Result<PathBuf, ConfigError> {
        self.resolve(
            self.log_file_override.as_ref().or(self.file.log_file.as_ref()),
            SyncPaths::log_path,
        )
    }

    fn resolve(
        &self,
        configured: Option<&PathBuf>,
        default: fn(&SyncPaths) -> PathBuf,
    ) -> Result<PathBuf, ConfigError> {
        match configured {
            Some(path) => Ok(expand_home(path)),
            None => SyncPaths::from_home()
                .map(|paths| default(&paths))
                .ok_or(ConfigError::NoHomeDir),
        }
    }

    /// Remote name. Defaults to "origin".
    pub fn remote(&self) -> &str {
        self.file
            .remote
            .as_deref()
            .unwrap_or(schema::DEFAULT_REMOTE)
    }

    /// Bound on each network operation. Defaults to 300 seconds.
    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(
            self.file
                .network_timeout_secs
                .unwrap_or(schema::DEFAULT_NETWORK_TIMEOUT_SECS),
        )
    }

    /// Pull strategy. Defaults to merge.
    pub fn pull_strategy(&self) -> PullStrategy {
        self.file.pull_strategy.unwrap_or_default()
    }

    /// Path the config file was loaded from, if any.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.remote(), "origin");
        assert_eq!(config.network_timeout(), Duration::from_secs(300));
        assert_eq!(config.pull_strategy(), PullStrategy::Merge);
        assert!(config.loaded_from().is_none());
    }

    #[test]
    fn load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
            remote = "upstream"
            network_timeout_secs = 45
            pull_strategy = "rebase"
            repo_list = "/srv/repos.txt"
            "#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.remote(), "upstream");
        assert_eq!(config.network_timeout(), Duration::from_secs(45));
        assert_eq!(config.pull_strategy(), PullStrategy::Rebase);
        assert_eq!(config.repo_list_path().unwrap(), PathBuf::from("/srv/repos.txt"));
        assert_eq!(config.loaded_from(), Some(path.as_path()));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let result = Config::load(Some(&temp.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "remote = [").unwrap();

        let result = Config::load_file(&path);
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn invalid_value_rejected_on_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "network_timeout_secs = 0").unwrap();

        let result = Config::load_file(&path);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn cli_overrides_win() {
        let config = Config {
            file: FileConfig {
                repo_list: Some(PathBuf::from("/from/file.txt")),
                log_file: Some(PathBuf::from("/from/file.log")),
                ..Default::default()
            },
            ..Default::default()
        }
        .with_overrides(Some(PathBuf::from("/from/cli.txt")), None);

        assert_eq!(config.repo_list_path().unwrap(), PathBuf::from("/from/cli.txt"));
        assert_eq!(config.log_path().unwrap(), PathBuf::from("/from/file.log"));
    }
}
