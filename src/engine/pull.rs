//! engine::pull
//!
//! Pull workflow: bring remote changes into a working copy without losing
//! uncommitted edits.

use std::path::Path;

use super::probe::probe;
use super::stash::{RestoreResult, StashGuard};
use super::{Outcome, RepoReport, Stage, SyncEngine};
use crate::audit::AuditEvent;

impl SyncEngine<'_> {
    /// Run the pull workflow against the repository at `path`.
    ///
    /// An up-to-date repository is left untouched. Otherwise dirty edits are
    /// stashed, the remote branch is pulled, and the edits are restored
    /// whether or not the pull succeeded.
    pub fn pull(&self, path: &Path) -> RepoReport {
        let (mut report, _lock) = match self.enter(path) {
            Ok(entered) => entered,
            Err(report) => return report,
        };
        let remote = self.settings.remote.as_str();

        let state = match probe(self.vcs, path, remote) {
            Ok(state) => state,
            Err(e) => {
                let outcome = self.probe_failed(path, &e);
                return report.finish(outcome);
            }
        };
        report.reach(Stage::Probed);
        report.local_commit = Some(state.local_commit.clone());

        if !state.diverged() {
            report.reach(Stage::UpToDate);
            self.audit.record(&AuditEvent::UpToDate {
                repo: path.to_path_buf(),
                branch: state.branch.clone(),
            });
            return report.finish(Outcome::UpToDate);
        }

        let stash = match StashGuard::protect(self.vcs, path, state.dirty, self.audit) {
            Ok(handle) => handle,
            Err(e) => {
                self.audit.record(&AuditEvent::StashFailed {
                    repo: path.to_path_buf(),
                    error: e.to_string(),
                });
                return report.finish(Outcome::StashFailed);
            }
        };
        report.reach(if stash.is_stashed() {
            Stage::Stashed
        } else {
            Stage::Clean
        });
        report.reach(Stage::Fetched);

        let pulled = match self.vcs.pull(path, remote, &state.branch) {
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
                true
            }
            Err(e) => {
                report.reach(Stage::PullFailed);
                self.audit.record(&AuditEvent::ManualMergeRequired {
                    repo: path.to_path_buf(),
                    error: e.to_string(),
                });
                false
            }
        };

        let restored = stash.restore();
        match restored {
            RestoreResult::Restored => report.reach(Stage::Restored),
            RestoreResult::Conflict { .. } => report.reach(Stage::RestoreConflict),
            RestoreResult::NotNeeded => {}
        }

        let outcome = match (pulled, restored) {
            (false, _) => Outcome::ManualMergeRequired,
            (true, RestoreResult::Conflict { .. }) => Outcome::RestoreConflict,
            (true, _) => Outcome::Pulled,
        };
        report.finish(outcome)
    }
}
