//! core::repo_list
//!
//! The ordered list of working copies a run synchronizes.
//!
//! # Format
//!
//! Plain text, one path per line:
//! - lines containing only whitespace are ignored
//! - lines whose first non-whitespace character is `#` are ignored
//! - every other line is a path, taken verbatim (no trimming, no
//!   inline-comment stripping)
//!
//! The list is loaded once per run; entries are not validated here.
//! A path that is not a working copy is reported per repository by the
//! engine, never as a load failure.

use std::fs;
use std::path::{Path, PathBuf};

use super::config::ConfigError;

/// Ordered repository locations for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryList {
    entries: Vec<PathBuf>,
}

impl RepositoryList {
    /// Parse list text into entries. May be empty.
    ///
    /// # Example
    ///
    /// ```
    /// use autosync::core::repo_list::RepositoryList;
    ///
    /// let list = RepositoryList::parse("# notes\n/home/me/notes\n\n   \n  # x\n/srv/site\n");
    /// let paths: Vec<_> = list.iter().map(|p| p.to_str().unwrap()).collect();
    /// assert_eq!(paths, ["/home/me/notes", "/srv/site"]);
    /// ```
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter(|line| {
                let trimmed = line.trim_start();
                !trimmed.is_empty() && !trimmed.starts_with('#')
            })
            .map(PathBuf::from)
            .collect();
        Self { entries }
    }

    /// Load and parse the list at `path`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::RepoListMissing`] if the file cannot be read
    /// - [`ConfigError::RepoListEmpty`] if it yields no entries
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::RepoListMissing {
            path: path.to_path_buf(),
            source: e,
        })?;

        let list = Self::parse(&text);
        if list.is_empty() {
            return Err(ConfigError::RepoListEmpty {
                path: path.to_path_buf(),
            });
        }
        Ok(list)
    }

    /// Build a list from explicit paths.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            entries: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Iterate entries in list order.
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
