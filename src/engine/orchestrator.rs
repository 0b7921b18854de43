//! engine::orchestrator
//!
//! Drives one workflow over every entry of a repository list.
//!
//! Entries are processed in list order, one at a time. Whatever happens to
//! one repository (an error outcome, or even a panic inside the engine) is
//! recorded and the run moves on to the next entry. The summary is for the
//! audit log only: a run that loaded its configuration always succeeds as a
//! process, so a scheduler does not alert on routine per-repository failures.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use serde::Serialize;

use super::{Outcome, RepoReport, Stage, SyncEngine, Workflow};
use crate::audit::AuditEvent;
use crate::core::repo_list::RepositoryList;

/// Aggregate result of one pass over the repository list.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub workflow: Workflow,
    pub reports: Vec<RepoReport>,
}

impl RunSummary {
    /// Number of repositories that ended with `outcome`.
    pub fn count(&self, outcome: Outcome) -> usize {
        self.reports.iter().filter(|r| r.outcome == outcome).count()
    }

    /// Count per outcome, in outcome order, omitting zeros.
    pub fn counts(&self) -> BTreeMap<Outcome, usize> {
        let mut counts = BTreeMap::new();
        for report in &self.reports {
            *counts.entry(report.outcome).or_insert(0) += 1;
        }
        counts
    }

    /// Repositories that did not end successfully (including skips).
    pub fn unsuccessful(&self) -> impl Iterator<Item = &RepoReport> {
        self.reports.iter().filter(|r| !r.outcome.is_success())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} repositories", self.reports.len())?;
        let counts = self.counts();
        if !counts.is_empty() {
            let parts: Vec<String> = counts
                .iter()
                .map(|(outcome, n)| format!("{} {}", n, outcome))
                .collect();
            write!(f, ": {}", parts.join(", "))?;
        }
        Ok(())
    }
}

/// Runs a workflow over a repository list.
#[derive(Debug)]
pub struct Orchestrator<'a> {
    engine: SyncEngine<'a>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(engine: SyncEngine<'a>) -> Self {
        Self { engine }
    }

    /// Process every entry of `list` with `workflow`.
    pub fn run(&self, workflow: Workflow, list: &RepositoryList) -> RunSummary {
        let audit = self.engine.audit();
        audit.record(&AuditEvent::RunStarted {
            workflow: workflow.to_string(),
            repos: list.len(),
        });

        let reports: Vec<RepoReport> = list
            .iter()
            .map(|path| self.run_one(workflow, path))
            .collect();

        let summary = RunSummary { workflow, reports };
        audit.record(&AuditEvent::RunFinished {
            workflow: workflow.to_string(),
            summary: summary.to_string(),
        });
        tracing::info!(%workflow, %summary, "run complete");
        summary
    }

    /// Run one repository, containing any panic at the repository boundary.
    ///
    /// Unwinding drops the lock guard and stash handle inside the engine, so
    /// the lock is released and local edits are restored before we get here.
    fn run_one(&self, workflow: Workflow, path: &Path) -> RepoReport {
        tracing::debug!(%workflow, repo = %path.display(), "processing");
        match panic::catch_unwind(AssertUnwindSafe(|| self.engine.run(workflow, path))) {
            Ok(report) => report,
            Err(payload) => {
                let error = panic_message(payload.as_ref());
                self.engine.audit().record(&AuditEvent::RepositoryError {
                    repo: path.to_path_buf(),
                    error: format!("internal error: {}", error),
                });
                RepoReport {
                    path: path.to_path_buf(),
                    outcome: Outcome::Failed,
                    trail: vec![Stage::Start, Stage::Done],
                    local_commit: None,
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::core::ops::RepoLock;
    use crate::core::types::{BranchName, Oid};
    use crate::engine::SyncSettings;
    use crate::git::mock::{MockRepo, MockVcs};
    use crate::git::{GitError, StashEntry, Vcs};
    use std::path::PathBuf;
    use std::sync::{Arc, Barrier};
    use std::time::Duration;
    use tempfile::TempDir;

    fn repo(root: &Path, name: &str, vcs: &MockVcs, state: MockRepo) -> PathBuf {
        let path = root.join(name);
        std::fs::create_dir_all(path.join(".git")).unwrap();
        vcs.add_repo(&path, state);
        path
    }

    #[test]
    fn processes_every_entry_in_order() {
        let temp = TempDir::new().unwrap();
        let vcs = MockVcs::new();
        let a = repo(temp.path(), "a", &vcs, MockRepo::new("main", 1).remote_ahead(2));
        let b = temp.path().join("missing");
        let c = repo(temp.path(), "c", &vcs, MockRepo::new("main", 1));
        let list = RepositoryList::from_paths([&a, &b, &c]);

        let audit = AuditLog::console(false);
        let orchestrator =
            Orchestrator::new(SyncEngine::new(&vcs, &audit, SyncSettings::default()));
        let summary = orchestrator.run(Workflow::Pull, &list);

        let outcomes: Vec<_> = summary.reports.iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![Outcome::Pulled, Outcome::Invalid, Outcome::UpToDate]
        );
        assert_eq!(summary.count(Outcome::Invalid), 1);
        assert_eq!(summary.unsuccessful().count(), 1);
    }

    #[test]
    fn skipped_repository_does_not_stop_run() {
        let temp = TempDir::new().unwrap();
        let vcs = MockVcs::new();
        let a = repo(temp.path(), "a", &vcs, MockRepo::new("main", 1).dirty());
        let b = repo(temp.path(), "b", &vcs, MockRepo::new("main", 1).dirty());
        let _held = RepoLock::acquire(&a.join(".git")).unwrap();

        let audit = AuditLog::console(false);
        let orchestrator =
            Orchestrator::new(SyncEngine::new(&vcs, &audit, SyncSettings::default()));
        let summary = orchestrator.run(Workflow::Push, &RepositoryList::from_paths([&a, &b]));

        assert_eq!(summary.reports[0].outcome, Outcome::Skipped);
        assert_eq!(summary.reports[1].outcome, Outcome::Pushed);
    }

    #[test]
    fn summary_line() {
        let temp = TempDir::new().unwrap();
        let vcs = MockVcs::new();
        let a = repo(temp.path(), "a", &vcs, MockRepo::new("main", 1));
        let b = repo(temp.path(), "b", &vcs, MockRepo::new("main", 1));
        let log_path = temp.path().join("audit.log");
        let audit = AuditLog::open(&log_path, false).unwrap();

        let orchestrator =
            Orchestrator::new(SyncEngine::new(&vcs, &audit, SyncSettings::default()));
        let summary = orchestrator.run(Workflow::Pull, &RepositoryList::from_paths([&a, &b]));

        assert_eq!(summary.to_string(), "2 repositories: 2 up to date");
        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("Starting pull sync of 2 repositories"));
        assert!(log.contains("Finished pull sync: 2 repositories: 2 up to date"));
    }

    /// Backend that panics when fetching one particular repository.
    struct Exploding {
        inner: MockVcs,
        target: PathBuf,
    }

    impl Vcs for Exploding {
        fn metadata_dir(&self, repo: &Path) -> Result<PathBuf, GitError> {
            self.inner.metadata_dir(repo)
        }
        fn current_branch(&self, repo: &Path) -> Result<BranchName, GitError> {
            self.inner.current_branch(repo)
        }
        fn fetch(&self, repo: &Path, remote: &str, branch: &BranchName) -> Result<(), GitError> {
            if repo == self.target {
                panic!("backend exploded");
            }
            self.inner.fetch(repo, remote, branch)
        }
        fn resolve_ref(&self, repo: &Path, refname: &str) -> Result<Option<Oid>, GitError> {
            self.inner.resolve_ref(repo, refname)
        }
        fn is_dirty(&self, repo: &Path) -> Result<bool, GitError> {
            self.inner.is_dirty(repo)
        }
        fn stash_push(&self, repo: &Path, label: &str) -> Result<bool, GitError> {
            self.inner.stash_push(repo, label)
        }
        fn stash_pop(&self, repo: &Path, label: &str) -> Result<(), GitError> {
            self.inner.stash_pop(repo, label)
        }
        fn stash_list(&self, repo: &Path) -> Result<Vec<StashEntry>, GitError> {
            self.inner.stash_list(repo)
        }
        fn pull(&self, repo: &Path, remote: &str, branch: &BranchName) -> Result<(), GitError> {
            self.inner.pull(repo, remote, branch)
        }
        fn operation_in_progress(&self, repo: &Path) -> Result<bool, GitError> {
            self.inner.operation_in_progress(repo)
        }
        fn abort_operation(&self, repo: &Path) -> Result<(), GitError> {
            self.inner.abort_operation(repo)
        }
        fn stage_all(&self, repo: &Path) -> Result<(), GitError> {
            self.inner.stage_all(repo)
        }
        fn commit(&self, repo: &Path, message: &str) -> Result<(), GitError> {
            self.inner.commit(repo, message)
        }
        fn push(&self, repo: &Path, remote: &str, branch: &BranchName) -> Result<(), GitError> {
            self.inner.push(repo, remote, branch)
        }
    }

    #[test]
    fn panic_contained_and_lock_released() {
        let temp = TempDir::new().unwrap();
        let mock = MockVcs::new();
        let a = repo(temp.path(), "a", &mock, MockRepo::new("main", 1));
        let b = repo(temp.path(), "b", &mock, MockRepo::new("main", 1).remote_ahead(2));
        let vcs = Exploding {
            inner: mock,
            target: a.clone(),
        };

        let audit = AuditLog::console(false);
        let orchestrator =
            Orchestrator::new(SyncEngine::new(&vcs, &audit, SyncSettings::default()));
        let summary = orchestrator.run(Workflow::Pull, &RepositoryList::from_paths([&a, &b]));

        assert_eq!(summary.reports[0].outcome, Outcome::Failed);
        assert_eq!(summary.reports[1].outcome, Outcome::Pulled);
        assert!(!RepoLock::is_locked(&a.join(".git")).unwrap());
        assert!(!a.join(".git").join("autosync.lock").exists());
    }

    #[test]
    fn concurrent_runs_single_winner() {
        let temp = TempDir::new().unwrap();
        let vcs = MockVcs::new().with_fetch_delay(Duration::from_millis(300));
        let path = repo(temp.path(), "shared", &vcs, MockRepo::new("main", 1).remote_ahead(2));
        let audit = Arc::new(AuditLog::console(false));
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let vcs = vcs.clone();
                let audit = Arc::clone(&audit);
                let barrier = Arc::clone(&barrier);
                let path = path.clone();
                std::thread::spawn(move || {
                    let engine = SyncEngine::new(&vcs, &audit, SyncSettings::default());
                    barrier.wait();
                    engine.pull(&path).outcome
                })
            })
            .collect();

        let mut outcomes: Vec<Outcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        outcomes.sort();

        assert_eq!(outcomes, vec![Outcome::Skipped, Outcome::Pulled]);
        assert!(!path.join(".git").join("autosync.lock").exists());
    }
}
