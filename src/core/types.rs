//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`BranchName`] - Branch name as reported by Git
//! - [`Oid`] - Git object identifier (SHA)
//! - [`LocalTimestamp`] - Wall-clock timestamp in the `YYYY-MM-DD HH:MM:SS` form
//!   used by audit lines, stash labels, and auto-commit messages
//!
//! # Examples
//!
//! ```
//! use autosync::core::types::{BranchName, Oid};
//!
//! let branch = BranchName::new("main").unwrap();
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//! assert_eq!(branch.remote_ref("origin"), "refs/remotes/origin/main");
//! assert_eq!(oid.short(7), "abc123d");
//!
//! assert!(BranchName::new("").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),
}

/// A branch name read from a working copy.
///
/// Names come from `HEAD`, so only the properties the engine relies on are
/// checked: non-empty, no whitespace or control characters, and no leading
/// `-` (the name is passed as a git CLI argument).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name is unusable as a
    /// git argument.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be empty".into(),
            ));
        }
        if name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(format!(
                "'{name}' cannot start with '-'"
            )));
        }
        if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TypeError::InvalidBranchName(format!(
                "'{name}' contains whitespace or control characters"
            )));
        }
        Ok(Self(name))
    }

    /// Full local ref, `refs/heads/<name>`.
    pub fn local_ref(&self) -> String {
        format!("refs/heads/{}", self.0)
    }

    /// Remote-tracking ref for this branch on `remote`.
    pub fn remote_ref(&self, remote: &str) -> String {
        format!("refs/remotes/{}/{}", remote, self.0)
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated Git object identifier.
///
/// Commit identity is compared for equality only; the value is otherwise
/// opaque. Normalized to lowercase so ids from git2 and the git CLI compare
/// equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` unless the value is 40 (SHA-1) or
    /// 64 (SHA-256) hex characters.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().trim().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Abbreviated form; the full id if `len` exceeds it.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Local wall-clock time rendered as `YYYY-MM-DD HH:MM:SS`.
///
/// # Example
///
/// ```
/// use autosync::core::types::LocalTimestamp;
/// use chrono::TimeZone;
///
/// let dt = chrono::Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
/// let ts = LocalTimestamp::from_datetime(dt);
/// assert_eq!(ts.to_string(), "2024-03-09 07:05:01");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTimestamp(chrono::DateTime<chrono::Local>);

impl LocalTimestamp {
    /// Format shared by every human-facing timestamp.
    pub const FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Local::now())
    }

    /// Create a timestamp from a chrono DateTime.
    pub fn from_datetime(dt: chrono::DateTime<chrono::Local>) -> Self {
        Self(dt)
    }
}

impl std::fmt::Display for LocalTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}
