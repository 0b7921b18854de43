//! engine::probe
//!
//! Remote-state probe: where the local branch and its remote counterpart
//! point, and whether the working tree carries uncommitted edits.
//!
//! # Invariants
//!
//! - The branch is read fresh on every call; nothing is cached
//! - A missing remote branch reads as "remote == local" (no divergence)
//! - Dirtiness considers staged and unstaged changes only, never untracked
//!   files

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::core::types::{BranchName, Oid};
use crate::git::{GitError, Vcs};

/// Errors from probing a repository.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Local state could not be read (detached HEAD, unborn branch, ...).
    #[error("cannot read repository state: {0}")]
    Git(#[from] GitError),

    /// Remote references could not be retrieved.
    #[error("fetch of {branch} from {remote} failed: {source}")]
    Fetch {
        remote: String,
        /// Branch that was being fetched, so callers can continue locally
        branch: BranchName,
        #[source]
        source: GitError,
    },
}

/// Snapshot of one repository relative to its remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteState {
    pub branch: BranchName,
    pub local_commit: Oid,
    pub remote_commit: Oid,
    /// Whether `refs/remotes/<remote>/<branch>` exists
    pub remote_branch_exists: bool,
    pub dirty: bool,
}

impl RemoteState {
    /// Whether local and remote commits differ.
    pub fn diverged(&self) -> bool {
        self.local_commit != self.remote_commit
    }
}

/// Fetch the current branch from `remote`, then resolve local and remote
/// commits and dirtiness.
///
/// # Errors
///
/// - [`ProbeError::Fetch`] if the fetch fails (unreachable, removed, auth)
/// - [`ProbeError::Git`] if local state cannot be read
pub fn probe(vcs: &dyn Vcs, repo: &Path, remote: &str) -> Result<RemoteState, ProbeError> {
    let branch = vcs.current_branch(repo)?;

    tracing::debug!(repo = %repo.display(), %branch, remote, "fetching");
    if let Err(source) = vcs.fetch(repo, remote, &branch) {
        return Err(ProbeError::Fetch {
            remote: remote.to_string(),
            branch,
            source,
        });
    }

    resolve(vcs, repo, remote, branch)
}

/// Like [`probe`] but without fetching: compares against whatever the
/// remote-tracking ref currently holds.
pub fn inspect(vcs: &dyn Vcs, repo: &Path, remote: &str) -> Result<RemoteState, ProbeError> {
    let branch = vcs.current_branch(repo)?;
    resolve(vcs, repo, remote, branch)
}

fn resolve(
    vcs: &dyn Vcs,
    repo: &Path,
    remote: &str,
    branch: BranchName,
) -> Result<RemoteState, ProbeError> {
    let local_ref = branch.local_ref();
    let local_commit = vcs
        .resolve_ref(repo, &local_ref)?
        .ok_or(GitError::RefNotFound { refname: local_ref })?;

    let remote_commit = vcs.resolve_ref(repo, &branch.remote_ref(remote))?;
    let remote_branch_exists = remote_commit.is_some();
    if !remote_branch_exists {
        tracing::debug!(
            repo = %repo.display(),
            %branch,
            remote,
            "remote branch missing; treating as in sync"
        );
    }
    let remote_commit = remote_commit.unwrap_or_else(|| local_commit.clone());

    let dirty = vcs.is_dirty(repo)?;

    Ok(RemoteState {
        branch,
        local_commit,
        remote_commit,
        remote_branch_exists,
        dirty,
    })
}
