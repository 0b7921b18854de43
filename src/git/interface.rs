//! git::interface
//!
//! Read-side Git access through git2.
//!
//! # Architecture
//!
//! [`Git`] wraps a `git2::Repository` opened at a working-copy root. It
//! answers the questions the engine asks before deciding to write: which
//! branch is checked out, where refs point, whether the tree is dirty, and
//! whether a merge or rebase is half-finished. Writes and network
//! operations go through [`super::command`].
//!
//! A `Git` value is opened per question and then dropped, so reads after a
//! CLI write always see fresh state.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Path is not a working-copy root
//! - [`GitError::DetachedHead`]: No branch checked out
//! - [`GitError::CommandFailed`]: A git CLI invocation exited non-zero
//! - [`GitError::Timeout`]: A git CLI invocation exceeded its bound

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::{BranchName, Oid, TypeError};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not a working-copy root.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was opened
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// HEAD does not point at a branch.
    #[error("HEAD is detached or unborn; no branch to synchronize")]
    DetachedHead,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Invalid object id or branch name returned by git.
    #[error("invalid value from git: {0}")]
    InvalidValue(String),

    /// A git CLI invocation exited unsuccessfully.
    #[error("{command} failed (exit {}): {stderr}", exit_label(.code))]
    CommandFailed {
        /// Command line that was run
        command: String,
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
        /// Trimmed stderr
        stderr: String,
    },

    /// A git CLI invocation exceeded its time bound and was killed.
    #[error("{command} timed out after {secs}s")]
    Timeout {
        /// Command line that was run
        command: String,
        /// The bound that was exceeded
        secs: u64,
    },

    /// The git executable could not be started.
    #[error("could not run {command}: {message}")]
    Spawn {
        /// Command line that was attempted
        command: String,
        /// OS error description
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: err.message().to_string(),
            },
            _ => GitError::Internal {
                message: err.message().to_string(),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        GitError::InvalidValue(err.to_string())
    }
}

/// State of in-progress Git operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitState {
    /// No operation in progress.
    Clean,
    /// Rebase in progress.
    Rebase,
    /// Merge in progress.
    Merge,
    /// Cherry-pick, revert, bisect or mailbox apply in progress.
    Other,
}

impl GitState {
    /// Check if any operation is in progress.
    ///
    /// # Example
    ///
    /// ```
    /// use autosync::git::GitState;
    ///
    /// assert!(!GitState::Clean.is_in_progress());
    /// assert!(GitState::Merge.is_in_progress());
    /// ```
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, GitState::Clean)
    }
}

/// Summary of working tree status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeStatus {
    /// Number of staged changes
    pub staged: usize,
    /// Number of unstaged changes to tracked files
    pub unstaged: usize,
    /// Number of untracked files (if requested)
    pub untracked: usize,
    /// Whether there are unresolved conflicts
    pub has_conflicts: bool,
}

impl WorktreeStatus {
    /// Whether tracked content differs from HEAD (staged, unstaged, or
    /// conflicted). Untracked files never make a tree dirty.
    pub fn is_dirty(&self) -> bool {
        self.staged > 0 || self.unstaged > 0 || self.has_conflicts
    }
}

/// git2-backed read access to one working copy.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    /// Open the working copy rooted exactly at `path`.
    ///
    /// Unlike discovery, a subdirectory of a repository is rejected: each
    /// repository list entry must itself carry git metadata.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if `path` has no git metadata
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        Ok(Self { repo })
    }

    /// The git metadata directory (`.git`, or `.git/worktrees/<name>` for a
    /// linked worktree).
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Get the current Git state (rebase, merge, etc.).
    pub fn state(&self) -> GitState {
        match self.repo.state() {
            git2::RepositoryState::Clean => GitState::Clean,
            git2::RepositoryState::Rebase
            | git2::RepositoryState::RebaseInteractive
            | git2::RepositoryState::RebaseMerge
            | git2::RepositoryState::ApplyMailboxOrRebase => GitState::Rebase,
            git2::RepositoryState::Merge => GitState::Merge,
            _ => GitState::Other,
        }
    }

    /// Get working tree status summary.
    ///
    /// If `include_untracked` is false, untracked files are not counted.
    pub fn worktree_status(&self, include_untracked: bool) -> Result<WorktreeStatus, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(include_untracked)
            .include_ignored(false)
            .exclude_submodules(true);

        let statuses = self.repo.statuses(Some(&mut opts))?;

        let mut result = WorktreeStatus::default();

        for entry in statuses.iter() {
            let status = entry.status();

            if status.is_conflicted() {
                result.has_conflicts = true;
            }

            if status.is_index_new()
                || status.is_index_modified()
                || status.is_index_deleted()
                || status.is_index_renamed()
                || status.is_index_typechange()
            {
                result.staged += 1;
            }

            if status.is_wt_modified()
                || status.is_wt_deleted()
                || status.is_wt_renamed()
                || status.is_wt_typechange()
            {
                result.unstaged += 1;
            }

            if status.is_wt_new() {
                result.untracked += 1;
            }
        }

        Ok(result)
    }

    /// Resolve a ref to its commit, returning `None` if it doesn't exist.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        let reference = match self.repo.find_reference(refname) {
            Ok(r) => r,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let oid = reference.peel_to_commit()?.id();
        Ok(Some(Oid::new(oid.to_string())?))
    }

    /// Get the current branch name.
    ///
    /// # Errors
    ///
    /// [`GitError::DetachedHead`] if HEAD is detached or unborn.
    pub fn current_branch(&self) -> Result<BranchName, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
                return Err(GitError::DetachedHead)
            }
            Err(e) => return Err(e.into()),
        };

        if !head.is_branch() {
            return Err(GitError::DetachedHead);
        }

        let name = head.shorthand().ok_or(GitError::DetachedHead)?;
        Ok(BranchName::new(name)?)
    }
}
