//! engine
//!
//! Per-repository synchronization workflows.
//!
//! # Architecture
//!
//! [`SyncEngine`] runs one workflow against one repository:
//!
//! ```text
//! pull: Start -> Locked -> Probed -> UpToDate -> Done
//!       Start -> Locked -> Probed -> {Clean | Stashed} -> Fetched
//!         -> {Pulled | PullFailed} -> [Restored | RestoreConflict] -> Done
//! push: Start -> Locked -> Probed -> [Pulled | PullFailed | PullSkipped]
//!         -> {NoChanges | Committed} -> [Pushed | PushFailed] -> Done
//! ```
//!
//! Every stage reached is appended to the [`RepoReport`] trail. The
//! [`orchestrator`] drives the engine over a whole repository list.
//!
//! # Invariants
//!
//! - The repository lock is a scoped guard: it is released on every exit
//!   path, including panics, before the next repository is processed
//! - A pull never runs unless uncommitted edits were stashed first, and the
//!   stash is restored (or reported) on every exit path
//! - Every recoverable failure becomes an [`Outcome`] plus an audit event;
//!   nothing propagates past the repository boundary
//! - An up-to-date repository sees no mutating operation at all

pub mod orchestrator;
pub mod probe;
mod pull;
mod push;
pub mod stash;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::audit::{AuditEvent, AuditLog};
use crate::core::config::schema::DEFAULT_REMOTE;
use crate::core::ops::RepoLock;
use crate::core::types::{BranchName, LocalTimestamp, Oid};
use crate::git::{GitError, Vcs};

pub use orchestrator::{Orchestrator, RunSummary};
pub use probe::{inspect, probe, ProbeError, RemoteState};
pub use stash::{RestoreResult, StashError, StashGuard, StashHandle};

/// Which workflow a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Workflow {
    /// Bring remote changes in, protecting local edits.
    Pull,
    /// Commit local edits and publish them.
    Push,
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Workflow::Pull => write!(f, "pull"),
            Workflow::Push => write!(f, "push"),
        }
    }
}

/// A state reached while processing one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Start,
    Locked,
    Probed,
    Clean,
    Stashed,
    Fetched,
    UpToDate,
    Pulled,
    PullFailed,
    Restored,
    RestoreConflict,
    PullSkipped,
    NoChanges,
    Committed,
    Pushed,
    PushFailed,
    Done,
}

/// Final result for one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// Lock held by another invocation.
    Skipped,
    /// Path missing, not a working copy, or HEAD not on a branch.
    Invalid,
    /// Remote references could not be fetched.
    FetchFailed,
    /// Local and remote agree.
    UpToDate,
    /// Remote changes integrated.
    Pulled,
    /// Pull failed; a human must integrate.
    ManualMergeRequired,
    /// Pull succeeded but local edits could not be reapplied.
    RestoreConflict,
    /// Local edits could not be stashed; pull not attempted.
    StashFailed,
    /// Nothing to commit.
    NoChanges,
    /// Local edits committed and pushed.
    Pushed,
    /// Commit created but push failed.
    PushFailed,
    /// Commit could not be created.
    CommitFailed,
    /// Unexpected error while processing.
    Failed,
}

impl Outcome {
    /// Short human-readable description.
    pub fn describe(&self) -> &'static str {
        match self {
            Outcome::Skipped => "skipped",
            Outcome::Invalid => "invalid",
            Outcome::FetchFailed => "fetch failed",
            Outcome::UpToDate => "up to date",
            Outcome::Pulled => "pulled",
            Outcome::ManualMergeRequired => "manual merge required",
            Outcome::RestoreConflict => "restore conflict",
            Outcome::StashFailed => "stash failed",
            Outcome::NoChanges => "no changes",
            Outcome::Pushed => "pushed",
            Outcome::PushFailed => "push failed",
            Outcome::CommitFailed => "commit failed",
            Outcome::Failed => "failed",
        }
    }

    /// Whether the workflow did what it set out to do (including finding
    /// nothing to do).
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Outcome::UpToDate | Outcome::Pulled | Outcome::NoChanges | Outcome::Pushed
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// What happened to one repository during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoReport {
    pub path: PathBuf,
    pub outcome: Outcome,
    /// Stages reached, in order
    pub trail: Vec<Stage>,
    /// Local branch tip after the workflow, when known
    pub local_commit: Option<Oid>,
}

impl RepoReport {
    fn start(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            outcome: Outcome::Failed,
            trail: vec![Stage::Start],
            local_commit: None,
        }
    }

    fn reach(&mut self, stage: Stage) {
        tracing::debug!(repo = %self.path.display(), ?stage, "stage");
        self.trail.push(stage);
    }

    fn finish(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self.reach(Stage::Done);
        self
    }

    /// Whether `stage` was reached.
    pub fn reached(&self, stage: Stage) -> bool {
        self.trail.contains(&stage)
    }
}

/// Engine knobs that come from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Remote to fetch from and push to
    pub remote: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            remote: DEFAULT_REMOTE.to_string(),
        }
    }
}

/// Commit message for automated commits made at `at`.
///
/// # Example
///
/// ```
/// use autosync::engine::commit_message;
/// use autosync::core::types::LocalTimestamp;
///
/// let msg = commit_message(&LocalTimestamp::now());
/// assert!(msg.starts_with("Auto-sync: "));
/// assert!(msg.ends_with(" [automated]"));
/// ```
pub fn commit_message(at: &LocalTimestamp) -> String {
    format!("Auto-sync: {} [automated]", at)
}

/// Runs pull and push workflows against individual repositories.
pub struct SyncEngine<'a> {
    vcs: &'a dyn Vcs,
    audit: &'a AuditLog,
    settings: SyncSettings,
}

impl fmt::Debug for SyncEngine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("settings", &self.settings)
            .finish()
    }
}

impl<'a> SyncEngine<'a> {
    pub fn new(vcs: &'a dyn Vcs, audit: &'a AuditLog, settings: SyncSettings) -> Self {
        Self {
            vcs,
            audit,
            settings,
        }
    }

    pub fn audit(&self) -> &AuditLog {
        self.audit
    }

    /// Run `workflow` against the repository at `path`.
    pub fn run(&self, workflow: Workflow, path: &Path) -> RepoReport {
        match workflow {
            Workflow::Pull => self.pull(path),
            Workflow::Push => self.push(path),
        }
    }

    /// Validate the entry and take its lock.
    ///
    /// On `Err` the report is already finished and audited.
    fn enter(&self, path: &Path) -> Result<(RepoReport, RepoLock), RepoReport> {
        let report = RepoReport::start(path);

        let metadata_dir = match self.vcs.metadata_dir(path) {
            Ok(dir) => dir,
            Err(e) => {
                self.audit.record(&AuditEvent::InvalidRepository {
                    repo: path.to_path_buf(),
                    reason: invalid_reason(path, &e),
                });
                return Err(report.finish(Outcome::Invalid));
            }
        };

        match RepoLock::try_acquire(&metadata_dir) {
            Ok(Some(lock)) => {
                let mut report = report;
                report.reach(Stage::Locked);
                Ok((report, lock))
            }
            Ok(None) => {
                self.audit.record(&AuditEvent::LockContention {
                    repo: path.to_path_buf(),
                });
                Err(report.finish(Outcome::Skipped))
            }
            Err(e) => {
                self.audit.record(&AuditEvent::LockFailed {
                    repo: path.to_path_buf(),
                    error: e.to_string(),
                });
                Err(report.finish(Outcome::Failed))
            }
        }
    }

    /// Audit a probe failure that ends the workflow and pick its outcome.
    fn probe_failed(&self, path: &Path, err: &ProbeError) -> Outcome {
        match err {
            ProbeError::Fetch { .. } => {
                self.audit.record(&AuditEvent::FetchFailed {
                    repo: path.to_path_buf(),
                    error: err.to_string(),
                });
                Outcome::FetchFailed
            }
            ProbeError::Git(GitError::DetachedHead) => {
                self.audit.record(&AuditEvent::InvalidRepository {
                    repo: path.to_path_buf(),
                    reason: "HEAD is not on a branch".into(),
                });
                Outcome::Invalid
            }
            ProbeError::Git(e) => {
                self.audit.record(&AuditEvent::RepositoryError {
                    repo: path.to_path_buf(),
                    error: e.to_string(),
                });
                Outcome::Failed
            }
        }
    }

    /// Current local branch tip, logged rather than propagated on failure.
    fn local_tip(&self, path: &Path, branch: &BranchName) -> Option<Oid> {
        match self.vcs.resolve_ref(path, &branch.local_ref()) {
            Ok(oid) => oid,
            Err(e) => {
                tracing::warn!(repo = %path.display(), error = %e, "cannot re-read local commit");
                None
            }
        }
    }
}

fn invalid_reason(path: &Path, err: &GitError) -> String {
    if !path.exists() {
        "path does not exist".to_string()
    } else {
        match err {
            GitError::NotARepo { .. } => "not a git repository".to_string(),
            other => other.to_string(),
        }
    }
}
