//! engine::push
//!
//! Push workflow: commit whatever changed locally and publish it.

use std::path::Path;

use super::probe::{probe, ProbeError};
use super::{commit_message, Outcome, RepoReport, Stage, SyncEngine};
use crate::audit::AuditEvent;
use crate::core::types::LocalTimestamp;

impl SyncEngine<'_> {
    /// Run the push workflow against the repository at `path`.
    ///
    /// A diverged remote is pulled first on a best-effort basis; a failed
    /// pull (or an unreachable remote) does not stop local edits from being
    /// committed. A clean tree ends the workflow without touching the remote.
    pub fn push(&self, path: &Path) -> RepoReport {
        let (mut report, _lock) = match self.enter(path) {
            Ok(entered) => entered,
            Err(report) => return report,
        };
        let remote = self.settings.remote.as_str();

        let branch = match probe(self.vcs, path, remote) {
            Ok(state) => {
                report.reach(Stage::Probed);
                report.local_commit = Some(state.local_commit.clone());

                if state.diverged() {
                    match self.vcs.pull(path, remote, &state.branch) {
                        Ok(()) => {
                            report.reach(Stage::Pulled);
                            let tip = self.local_tip(path, &state.branch);
                            if let Some(to) = &tip {
                                self.audit.record(&AuditEvent::Pulled {
                                    repo: path.to_path_buf(),
                                    branch: state.branch.clone(),
                                    from: state.local_commit.clone(),
                                    to: to.clone(),
                                });
                            }
                            report.local_commit = tip;
                        }
                        Err(e) => {
                            report.reach(Stage::PullFailed);
                            self.audit.record(&AuditEvent::PullWarning {
                                repo: path.to_path_buf(),
                                error: e.to_string(),
                            });
                            if let Err(outcome) = self.abort_unfinished(path) {
                                return report.finish(outcome);
                            }
                        }
                    }
                }
                state.branch
            }
            Err(ProbeError::Fetch {
                remote: from,
                branch,
                source,
            }) => {
                report.reach(Stage::Probed);
                report.reach(Stage::PullSkipped);
                self.audit.record(&AuditEvent::FetchFailed {
                    repo: path.to_path_buf(),
                    error: format!("{} (from {}); committing locally", source, from),
                });
                branch
            }
            Err(e) => {
                let outcome = self.probe_failed(path, &e);
                return report.finish(outcome);
            }
        };

        match self.vcs.is_dirty(path) {
            Ok(true) => {}
            Ok(false) => {
                report.reach(Stage::NoChanges);
                self.audit.record(&AuditEvent::NoChanges {
                    repo: path.to_path_buf(),
                });
                return report.finish(Outcome::NoChanges);
            }
            Err(e) => {
                self.audit.record(&AuditEvent::RepositoryError {
                    repo: path.to_path_buf(),
                    error: e.to_string(),
                });
                return report.finish(Outcome::Failed);
            }
        }

        let message = commit_message(&LocalTimestamp::now());
        let committed = self
            .vcs
            .stage_all(path)
            .and_then(|()| self.vcs.commit(path, &message));
        if let Err(e) = committed {
            self.audit.record(&AuditEvent::CommitFailed {
                repo: path.to_path_buf(),
                error: e.to_string(),
            });
            return report.finish(Outcome::CommitFailed);
        }
        report.reach(Stage::Committed);
        report.local_commit = self.local_tip(path, &branch);
        self.audit.record(&AuditEvent::Committed {
            repo: path.to_path_buf(),
            message,
        });

        match self.vcs.push(path, remote, &branch) {
            Ok(()) => {
                report.reach(Stage::Pushed);
                self.audit.record(&AuditEvent::Pushed {
                    repo: path.to_path_buf(),
                    remote: remote.to_string(),
                    branch,
                });
                report.finish(Outcome::Pushed)
            }
            Err(e) => {
                report.reach(Stage::PushFailed);
                self.audit.record(&AuditEvent::PushFailed {
                    repo: path.to_path_buf(),
                    error: e.to_string(),
                });
                report.finish(Outcome::PushFailed)
            }
        }
    }

    /// Abort a merge or rebase a failed pull left behind, so conflict
    /// markers never get committed.
    ///
    /// `Err` carries the outcome to end the workflow with.
    fn abort_unfinished(&self, path: &Path) -> Result<(), Outcome> {
        match self.vcs.operation_in_progress(path) {
            Ok(false) => Ok(()),
            Ok(true) => match self.vcs.abort_operation(path) {
                Ok(()) => {
                    self.audit.record(&AuditEvent::MergeAborted {
                        repo: path.to_path_buf(),
                    });
                    Ok(())
                }
                Err(e) => {
                    self.audit.record(&AuditEvent::ManualMergeRequired {
                        repo: path.to_path_buf(),
                        error: e.to_string(),
                    });
                    Err(Outcome::ManualMergeRequired)
                }
            },
            Err(e) => {
                self.audit.record(&AuditEvent::RepositoryError {
                    repo: path.to_path_buf(),
                    error: e.to_string(),
                });
                Err(Outcome::Failed)
            }
        }
    }
}
