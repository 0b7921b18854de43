//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Validation
//!
//! Values are validated after parsing: the remote must be usable as a git
//! argument and the network timeout must be positive.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Default network timeout for fetch, pull and push.
pub const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 300;

/// Default remote name.
pub const DEFAULT_REMOTE: &str = "origin";

/// On-disk configuration.
///
/// # Example
///
/// ```toml
/// repo_list = "~/.autosync/repos.txt"
/// log_file = "~/.autosync/autosync.log"
/// remote = "origin"
/// network_timeout_secs = 300
/// pull_strategy = "merge"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Repository list file
    pub repo_list: Option<PathBuf>,

    /// Audit log file
    pub log_file: Option<PathBuf>,

    /// Remote to fetch from, pull from, and push to
    pub remote: Option<String>,

    /// Upper bound on each fetch, pull, or push
    pub network_timeout_secs: Option<u64>,

    /// How remote changes are integrated on pull
    pub pull_strategy: Option<PullStrategy>,
}

impl FileConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(remote) = &self.remote {
            if remote.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "remote cannot be empty".to_string(),
                ));
            }
            if remote.starts_with('-') || remote.chars().any(|c| c.is_whitespace() || c == '/') {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid remote name '{}'",
                    remote
                )));
            }
        }

        if self.network_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "network_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// How `git pull` integrates remote commits.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PullStrategy {
    /// Merge remote changes (`--no-rebase`)
    #[default]
    Merge,
    /// Rebase local commits onto the remote (`--rebase`)
    Rebase,
    /// Only fast-forward; diverged history fails the pull (`--ff-only`)
    FfOnly,
}

impl PullStrategy {
    /// The `git pull` flag selecting this strategy.
    pub fn git_flag(self) -> &'static str {
        match self {
            PullStrategy::Merge => "--no-rebase",
            PullStrategy::Rebase => "--rebase",
            PullStrategy::FfOnly => "--ff-only",
        }
    }
}
