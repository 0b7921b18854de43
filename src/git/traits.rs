//! git::traits
//!
//! The version-control capability set the sync engine consumes.
//!
//! # Design
//!
//! The engine never talks to git directly. It asks a [`Vcs`] for a fixed set
//! of capabilities, each of which may fail independently with a
//! [`GitError`]. [`super::GitBackend`] implements them against real
//! repositories; [`super::mock::MockVcs`] implements them in memory with
//! failure injection for deterministic tests.
//!
//! Every method takes the working-copy root explicitly. Implementations
//! must not cache repository state between calls: branch and commit
//! identity can change between any two operations.

use std::path::{Path, PathBuf};

use super::GitError;
use crate::core::types::{BranchName, Oid};

/// One entry of a repository's stash list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashEntry {
    /// Selector usable with `git stash pop`, e.g. `stash@{0}`
    pub selector: String,
    /// Reflog subject, e.g. `On main: autosync auto-stash ...`
    pub message: String,
}

impl StashEntry {
    /// Whether this entry carries `label`.
    pub fn has_label(&self, label: &str) -> bool {
        self.message.ends_with(label)
    }
}

/// Version-control capabilities used by the sync workflows.
pub trait Vcs: Send + Sync {
    /// Git metadata directory of the working copy at `repo`.
    ///
    /// Fails with [`GitError::NotARepo`] when `repo` is not a working-copy
    /// root; the engine treats that entry as invalid.
    fn metadata_dir(&self, repo: &Path) -> Result<PathBuf, GitError>;

    /// Currently checked-out branch.
    fn current_branch(&self, repo: &Path) -> Result<BranchName, GitError>;

    /// Fetch `branch` from `remote`, updating the remote-tracking ref only.
    fn fetch(&self, repo: &Path, remote: &str, branch: &BranchName) -> Result<(), GitError>;

    /// Commit a ref points at, `None` if the ref does not exist.
    fn resolve_ref(&self, repo: &Path, refname: &str) -> Result<Option<Oid>, GitError>;

    /// Whether tracked content differs from HEAD (staged or unstaged).
    /// Untracked files are not consulted.
    fn is_dirty(&self, repo: &Path) -> Result<bool, GitError>;

    /// Stash tracked modifications under `label`.
    ///
    /// Returns `false` if git found nothing to stash.
    fn stash_push(&self, repo: &Path, label: &str) -> Result<bool, GitError>;

    /// Reapply and drop the stash entry carrying `label`.
    ///
    /// On failure (typically a conflict) the entry stays in the stash list.
    fn stash_pop(&self, repo: &Path, label: &str) -> Result<(), GitError>;

    /// Current stash entries, newest first.
    fn stash_list(&self, repo: &Path) -> Result<Vec<StashEntry>, GitError>;

    /// Integrate `remote`/`branch` into the current branch.
    fn pull(&self, repo: &Path, remote: &str, branch: &BranchName) -> Result<(), GitError>;

    /// Whether a merge or rebase is half-finished.
    fn operation_in_progress(&self, repo: &Path) -> Result<bool, GitError>;

    /// Abort a half-finished merge or rebase, restoring the prior state.
    fn abort_operation(&self, repo: &Path) -> Result<(), GitError>;

    /// Stage every modification, deletion, and addition.
    fn stage_all(&self, repo: &Path) -> Result<(), GitError>;

    /// Commit the index with `message`.
    fn commit(&self, repo: &Path, message: &str) -> Result<(), GitError>;

    /// Push the current branch to `remote`.
    fn push(&self, repo: &Path, remote: &str, branch: &BranchName) -> Result<(), GitError>;
}
