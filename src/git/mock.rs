//! git::mock
//!
//! In-memory [`Vcs`] for deterministic testing.
//!
//! # Design
//!
//! `MockVcs` models each registered working copy as a handful of values:
//! the checked-out branch, the local branch tip, the remote-tracking ref,
//! the commit the remote actually has, a dirty flag, and a stash stack.
//! Operations move those values the way git would (fetch copies the remote
//! tip into the tracking ref, pull fast-forwards onto it, push publishes the
//! local tip). Failures are injected per operation with [`FailOn`], and
//! every call is recorded so tests can assert that nothing mutating ran.
//!
//! The only real filesystem state is the metadata directory: a repository
//! is valid only when `<path>/.git` exists, so [`crate::core::ops::RepoLock`]
//! can place its marker there.
//!
//! # Example
//!
//! ```
//! use autosync::git::mock::{MockRepo, MockVcs};
//! use autosync::git::Vcs;
//! use std::path::Path;
//!
//! let vcs = MockVcs::new();
//! let path = Path::new("/work/notes");
//! vcs.add_repo(path, MockRepo::new("main", 1).remote_ahead(2));
//!
//! let branch = vcs.current_branch(path).unwrap();
//! assert_eq!(branch.as_str(), "main");
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::traits::{StashEntry, Vcs};
use super::GitError;
use crate::core::types::{BranchName, Oid};

/// Fake commit id for a small integer.
pub fn oid(n: u64) -> Oid {
    Oid::new(format!("{:040x}", n)).expect("40 hex digits is a valid oid")
}

/// State of one mocked working copy.
#[derive(Debug, Clone)]
pub struct MockRepo {
    /// Checked-out branch, `None` for detached HEAD
    pub branch: Option<String>,
    /// Local branch tip
    pub local: Oid,
    /// `refs/remotes/<remote>/<branch>`, `None` if never fetched
    pub tracking: Option<Oid>,
    /// Tip the remote really has, `None` if the branch does not exist there
    pub upstream: Option<Oid>,
    /// Tracked modifications present
    pub dirty: bool,
    /// Modifications staged for commit
    pub staged: bool,
    /// Stash stack, newest first
    pub stashes: Vec<String>,
    /// A merge or rebase is half-finished
    pub in_progress: bool,
}

impl MockRepo {
    /// Clean repository whose local tip, tracking ref and remote agree.
    pub fn new(branch: &str, local: u64) -> Self {
        Self {
            branch: Some(branch.to_string()),
            local: oid(local),
            tracking: Some(oid(local)),
            upstream: Some(oid(local)),
            dirty: false,
            staged: false,
            stashes: Vec::new(),
            in_progress: false,
        }
    }

    /// The remote has moved to `tip`.
    pub fn remote_ahead(mut self, tip: u64) -> Self {
        self.upstream = Some(oid(tip));
        self
    }

    /// The branch does not exist on the remote.
    pub fn no_remote_branch(mut self) -> Self {
        self.tracking = None;
        self.upstream = None;
        self
    }

    /// Working tree carries tracked modifications.
    pub fn dirty(mut self) -> Self {
        self.dirty = true;
        self
    }

    /// HEAD is detached.
    pub fn detached(mut self) -> Self {
        self.branch = None;
        self
    }
}

/// Operation to fail with an injected [`GitError::CommandFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailOn {
    Fetch,
    /// Pull fails cleanly
    Pull,
    /// Pull fails and leaves a merge in progress
    PullConflict,
    StashPush,
    /// Stash pop conflicts; the entry stays on the stack
    StashPop,
    Abort,
    StageAll,
    Commit,
    Push,
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    Fetch { repo: PathBuf, remote: String, branch: String },
    StashPush { repo: PathBuf, label: String },
    StashPop { repo: PathBuf, label: String },
    Pull { repo: PathBuf, remote: String, branch: String },
    Abort { repo: PathBuf },
    StageAll { repo: PathBuf },
    Commit { repo: PathBuf, message: String },
    Push { repo: PathBuf, remote: String, branch: String },
}

impl MockOperation {
    /// Whether the operation changes the working copy, history or remote.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, MockOperation::Fetch { .. })
    }
}

/// Mock version control for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockVcs {
    inner: Arc<Mutex<MockVcsInner>>,
}

#[derive(Debug, Default)]
struct MockVcsInner {
    repos: HashMap<PathBuf, MockRepo>,
    fail_on: HashSet<FailOn>,
    operations: Vec<MockOperation>,
    fetch_delay: Option<Duration>,
    next_commit: u64,
}

impl MockVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the working copy at `path`.
    pub fn add_repo(&self, path: &Path, repo: MockRepo) {
        let mut inner = self.inner.lock().unwrap();
        inner.repos.insert(path.to_path_buf(), repo);
    }

    /// Fail every call of `op` until cleared.
    pub fn fail_on(self, op: FailOn) -> Self {
        self.inner.lock().unwrap().fail_on.insert(op);
        self
    }

    /// Clear all injected failures.
    pub fn clear_fail_on(&self) {
        self.inner.lock().unwrap().fail_on.clear();
    }

    /// Sleep inside every fetch, to widen race windows in concurrency tests.
    pub fn with_fetch_delay(self, delay: Duration) -> Self {
        self.inner.lock().unwrap().fetch_delay = Some(delay);
        self
    }

    /// Snapshot of the working copy at `path`.
    pub fn repo(&self, path: &Path) -> Option<MockRepo> {
        self.inner.lock().unwrap().repos.get(path).cloned()
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().unwrap().operations.clone()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.inner.lock().unwrap().operations.clear();
    }

    fn record(&self, op: MockOperation) {
        self.inner.lock().unwrap().operations.push(op);
    }

    fn check_fail(&self, op: FailOn) -> Result<(), GitError> {
        if self.inner.lock().unwrap().fail_on.contains(&op) {
            return Err(GitError::CommandFailed {
                command: format!("git {:?}", op).to_lowercase(),
                code: Some(1),
                stderr: "injected failure".into(),
            });
        }
        Ok(())
    }

    /// Run `f` against the registered repository at `path`.
    fn with_repo<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&mut MockRepo, &mut u64) -> Result<T, GitError>,
    ) -> Result<T, GitError> {
        let mut inner = self.inner.lock().unwrap();
        let MockVcsInner {
            repos, next_commit, ..
        } = &mut *inner;
        let repo = repos.get_mut(path).ok_or_else(|| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;
        f(repo, next_commit)
    }
}

fn branch_of(repo: &MockRepo) -> Result<BranchName, GitError> {
    let name = repo.branch.as_deref().ok_or(GitError::DetachedHead)?;
    Ok(BranchName::new(name)?)
}

impl Vcs for MockVcs {
    fn metadata_dir(&self, repo: &Path) -> Result<PathBuf, GitError> {
        let dir = repo.join(".git");
        let registered = self.inner.lock().unwrap().repos.contains_key(repo);
        if registered && dir.is_dir() {
            Ok(dir)
        } else {
            Err(GitError::NotARepo {
                path: repo.to_path_buf(),
            })
        }
    }

    fn current_branch(&self, repo: &Path) -> Result<BranchName, GitError> {
        self.with_repo(repo, |r, _| branch_of(r))
    }

    fn fetch(&self, repo: &Path, remote: &str, branch: &BranchName) -> Result<(), GitError> {
        self.record(MockOperation::Fetch {
            repo: repo.to_path_buf(),
            remote: remote.to_string(),
            branch: branch.to_string(),
        });
        let delay = self.inner.lock().unwrap().fetch_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.check_fail(FailOn::Fetch)?;
        self.with_repo(repo, |r, _| {
            r.tracking = r.upstream.clone();
            Ok(())
        })
    }

    fn resolve_ref(&self, repo: &Path, refname: &str) -> Result<Option<Oid>, GitError> {
        self.with_repo(repo, |r, _| {
            let branch = branch_of(r)?;
            if refname == branch.local_ref() {
                Ok(Some(r.local.clone()))
            } else if refname.starts_with("refs/remotes/")
                && refname.ends_with(&format!("/{}", branch))
            {
                Ok(r.tracking.clone())
            } else {
                Ok(None)
            }
        })
    }

    fn is_dirty(&self, repo: &Path) -> Result<bool, GitError> {
        self.with_repo(repo, |r, _| Ok(r.dirty || r.staged))
    }

    fn stash_push(&self, repo: &Path, label: &str) -> Result<bool, GitError> {
        self.record(MockOperation::StashPush {
            repo: repo.to_path_buf(),
            label: label.to_string(),
        });
        self.check_fail(FailOn::StashPush)?;
        self.with_repo(repo, |r, _| {
            if !(r.dirty || r.staged) {
                return Ok(false);
            }
            let branch = r.branch.clone().unwrap_or_else(|| "(no branch)".into());
            r.stashes.insert(0, format!("On {}: {}", branch, label));
            r.dirty = false;
            r.staged = false;
            Ok(true)
        })
    }

    fn stash_pop(&self, repo: &Path, label: &str) -> Result<(), GitError> {
        self.record(MockOperation::StashPop {
            repo: repo.to_path_buf(),
            label: label.to_string(),
        });
        let conflict = self.check_fail(FailOn::StashPop);
        self.with_repo(repo, |r, _| {
            let idx = r
                .stashes
                .iter()
                .position(|m| m.ends_with(label))
                .ok_or_else(|| GitError::RefNotFound {
                    refname: format!("stash entry '{}'", label),
                })?;
            // Both outcomes leave modifications in the tree; only success
            // drops the entry.
            r.dirty = true;
            conflict?;
            r.stashes.remove(idx);
            Ok(())
        })
    }

    fn stash_list(&self, repo: &Path) -> Result<Vec<StashEntry>, GitError> {
        self.with_repo(repo, |r, _| {
            Ok(r.stashes
                .iter()
                .enumerate()
                .map(|(i, message)| StashEntry {
                    selector: format!("stash@{{{}}}", i),
                    message: message.clone(),
                })
                .collect())
        })
    }

    fn pull(&self, repo: &Path, remote: &str, branch: &BranchName) -> Result<(), GitError> {
        self.record(MockOperation::Pull {
            repo: repo.to_path_buf(),
            remote: remote.to_string(),
            branch: branch.to_string(),
        });
        if let Err(err) = self.check_fail(FailOn::PullConflict) {
            self.with_repo(repo, |r, _| {
                r.in_progress = true;
                r.dirty = true;
                Ok(())
            })?;
            return Err(err);
        }
        self.check_fail(FailOn::Pull)?;
        self.with_repo(repo, |r, _| {
            r.tracking = r.upstream.clone();
            if let Some(tip) = &r.tracking {
                r.local = tip.clone();
            }
            Ok(())
        })
    }

    fn operation_in_progress(&self, repo: &Path) -> Result<bool, GitError> {
        self.with_repo(repo, |r, _| Ok(r.in_progress))
    }

    fn abort_operation(&self, repo: &Path) -> Result<(), GitError> {
        self.record(MockOperation::Abort {
            repo: repo.to_path_buf(),
        });
        self.check_fail(FailOn::Abort)?;
        self.with_repo(repo, |r, _| {
            if r.in_progress {
                r.in_progress = false;
                r.dirty = false;
            }
            Ok(())
        })
    }

    fn stage_all(&self, repo: &Path) -> Result<(), GitError> {
        self.record(MockOperation::StageAll {
            repo: repo.to_path_buf(),
        });
        self.check_fail(FailOn::StageAll)?;
        self.with_repo(repo, |r, _| {
            if r.dirty {
                r.dirty = false;
                r.staged = true;
            }
            Ok(())
        })
    }

    fn commit(&self, repo: &Path, message: &str) -> Result<(), GitError> {
        self.record(MockOperation::Commit {
            repo: repo.to_path_buf(),
            message: message.to_string(),
        });
        self.check_fail(FailOn::Commit)?;
        self.with_repo(repo, |r, next| {
            if !r.staged {
                return Err(GitError::CommandFailed {
                    command: "git commit".into(),
                    code: Some(1),
                    stderr: "nothing to commit, working tree clean".into(),
                });
            }
            *next += 1;
            r.local = oid(0x1000 + *next);
            r.staged = false;
            Ok(())
        })
    }

    fn push(&self, repo: &Path, remote: &str, branch: &BranchName) -> Result<(), GitError> {
        self.record(MockOperation::Push {
            repo: repo.to_path_buf(),
            remote: remote.to_string(),
            branch: branch.to_string(),
        });
        self.check_fail(FailOn::Push)?;
        self.with_repo(repo, |r, _| {
            r.upstream = Some(r.local.clone());
            r.tracking = Some(r.local.clone());
            Ok(())
        })
    }
}
