//! git::backend
//!
//! The production [`Vcs`]: git2 for reads, the git CLI for writes and
//! network operations.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::command::run_git;
use super::traits::{StashEntry, Vcs};
use super::{Git, GitError, GitState};
use crate::core::config::PullStrategy;
use crate::core::types::{BranchName, Oid};

/// [`Vcs`] over real repositories.
#[derive(Debug, Clone)]
pub struct GitBackend {
    /// Bound applied to every git CLI invocation
    timeout: Duration,
    /// How `pull` integrates remote commits
    pull_strategy: PullStrategy,
}

impl GitBackend {
    pub fn new(timeout: Duration, pull_strategy: PullStrategy) -> Self {
        Self {
            timeout,
            pull_strategy,
        }
    }

    fn git(&self, repo: &Path, args: &[&str]) -> Result<String, GitError> {
        run_git(repo, args, Some(self.timeout)).map(|out| out.stdout)
    }
}

impl Vcs for GitBackend {
    fn metadata_dir(&self, repo: &Path) -> Result<PathBuf, GitError> {
        Ok(Git::open(repo)?.git_dir().to_path_buf())
    }

    fn current_branch(&self, repo: &Path) -> Result<BranchName, GitError> {
        Git::open(repo)?.current_branch()
    }

    fn fetch(&self, repo: &Path, remote: &str, branch: &BranchName) -> Result<(), GitError> {
        self.git(repo, &["fetch", "--quiet", remote, branch.as_str()])?;
        Ok(())
    }

    fn resolve_ref(&self, repo: &Path, refname: &str) -> Result<Option<Oid>, GitError> {
        Git::open(repo)?.try_resolve_ref(refname)
    }

    fn is_dirty(&self, repo: &Path) -> Result<bool, GitError> {
        Ok(Git::open(repo)?.worktree_status(false)?.is_dirty())
    }

    fn stash_push(&self, repo: &Path, label: &str) -> Result<bool, GitError> {
        self.git(repo, &["stash", "push", "--quiet", "-m", label])?;
        Ok(self
            .stash_list(repo)?
            .iter()
            .any(|entry| entry.has_label(label)))
    }

    fn stash_pop(&self, repo: &Path, label: &str) -> Result<(), GitError> {
        let entry = self
            .stash_list(repo)?
            .into_iter()
            .find(|entry| entry.has_label(label))
            .ok_or_else(|| GitError::RefNotFound {
                refname: format!("stash entry '{}'", label),
            })?;
        self.git(repo, &["stash", "pop", "--quiet", &entry.selector])?;
        Ok(())
    }

    fn stash_list(&self, repo: &Path) -> Result<Vec<StashEntry>, GitError> {
        let out = self.git(repo, &["stash", "list", "--format=%gd%x09%gs"])?;
        Ok(parse_stash_list(&out))
    }

    fn pull(&self, repo: &Path, remote: &str, branch: &BranchName) -> Result<(), GitError> {
        self.git(
            repo,
            &[
                "pull",
                "--quiet",
                self.pull_strategy.git_flag(),
                "--no-edit",
                remote,
                branch.as_str(),
            ],
        )?;
        Ok(())
    }

    fn operation_in_progress(&self, repo: &Path) -> Result<bool, GitError> {
        Ok(Git::open(repo)?.state().is_in_progress())
    }

    fn abort_operation(&self, repo: &Path) -> Result<(), GitError> {
        match Git::open(repo)?.state() {
            GitState::Clean => Ok(()),
            GitState::Merge => self.git(repo, &["merge", "--abort"]).map(|_| ()),
            GitState::Rebase => self.git(repo, &["rebase", "--abort"]).map(|_| ()),
            GitState::Other => Err(GitError::Internal {
                message: "unsupported operation in progress; resolve manually".into(),
            }),
        }
    }

    fn stage_all(&self, repo: &Path) -> Result<(), GitError> {
        self.git(repo, &["add", "-A"])?;
        Ok(())
    }

    fn commit(&self, repo: &Path, message: &str) -> Result<(), GitError> {
        self.git(repo, &["commit", "--quiet", "-m", message])?;
        Ok(())
    }

    fn push(&self, repo: &Path, remote: &str, branch: &BranchName) -> Result<(), GitError> {
        self.git(repo, &["push", "--quiet", remote, branch.as_str()])?;
        Ok(())
    }
}

/// Parse `git stash list --format=%gd%x09%gs` output.
fn parse_stash_list(out: &str) -> Vec<StashEntry> {
    out.lines()
        .filter_map(|line| {
            let (selector, message) = line.split_once('\t')?;
            Some(StashEntry {
                selector: selector.to_string(),
                message: message.to_string(),
            })
        })
        .collect()
}
