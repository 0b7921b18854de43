//! engine::stash
//!
//! Scoped protection of uncommitted edits around a pull.
//!
//! # Protocol
//!
//! [`StashGuard::protect`] sets dirty edits aside under a unique label and
//! returns a [`StashHandle`]. The handle must give the edits back:
//! [`StashHandle::restore`] reapplies them explicitly, and if the handle is
//! dropped first (early return, panic unwinding) `Drop` does it instead.
//! A restore that conflicts leaves the labelled entry in the stash list,
//! where it is the recovery trail for a human, and records a
//! `ManualResolutionRequired` audit event.

use std::path::Path;

use thiserror::Error;

use crate::audit::{AuditEvent, AuditLog};
use crate::core::types::LocalTimestamp;
use crate::git::{GitError, Vcs};

/// Prefix shared by every auto-stash label.
pub const STASH_LABEL_PREFIX: &str = "autosync auto-stash";

/// Label for an auto-stash taken at `at` by process `pid`.
///
/// # Example
///
/// ```
/// use autosync::engine::stash::stash_label;
/// use autosync::core::types::LocalTimestamp;
///
/// let label = stash_label(&LocalTimestamp::now(), 42);
/// assert!(label.starts_with("autosync auto-stash "));
/// assert!(label.ends_with(" (pid 42)"));
/// ```
pub fn stash_label(at: &LocalTimestamp, pid: u32) -> String {
    format!("{} {} (pid {})", STASH_LABEL_PREFIX, at, pid)
}

/// Whether a stash message was written by autosync.
pub fn is_auto_stash(message: &str) -> bool {
    message.contains(STASH_LABEL_PREFIX)
}

/// Stash creation failed; the protected operation must not run.
#[derive(Debug, Error)]
#[error("failed to stash local changes: {0}")]
pub struct StashError(#[source] pub GitError);

/// Result of giving stashed edits back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreResult {
    /// Nothing was stashed.
    NotNeeded,
    /// Edits reapplied and the entry dropped.
    Restored,
    /// Reapplying failed; the entry is still in the stash list.
    Conflict { label: String, error: String },
}

/// Entry point for stash protection.
pub struct StashGuard;

impl StashGuard {
    /// Stash tracked edits if `dirty`, returning the handle that restores
    /// them.
    ///
    /// A clean tree (or one where git finds nothing to stash) yields a no-op
    /// handle.
    pub fn protect<'a>(
        vcs: &'a dyn Vcs,
        repo: &'a Path,
        dirty: bool,
        audit: &'a AuditLog,
    ) -> Result<StashHandle<'a>, StashError> {
        let mut handle = StashHandle {
            vcs,
            repo,
            audit,
            label: None,
        };
        if !dirty {
            return Ok(handle);
        }

        let label = stash_label(&LocalTimestamp::now(), std::process::id());
        if vcs.stash_push(repo, &label).map_err(StashError)? {
            audit.record(&AuditEvent::Stashed {
                repo: repo.to_path_buf(),
                label: label.clone(),
            });
            handle.label = Some(label);
        } else {
            tracing::debug!(repo = %repo.display(), "nothing to stash");
        }
        Ok(handle)
    }
}

/// Outstanding auto-stash for one repository.
#[must_use = "dropping the handle restores immediately"]
pub struct StashHandle<'a> {
    vcs: &'a dyn Vcs,
    repo: &'a Path,
    audit: &'a AuditLog,
    /// Set while an entry created by this handle is outstanding
    label: Option<String>,
}

impl std::fmt::Debug for StashHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StashHandle")
            .field("repo", &self.repo)
            .field("label", &self.label)
            .finish()
    }
}

impl StashHandle<'_> {
    /// Whether an auto-stash is outstanding.
    pub fn is_stashed(&self) -> bool {
        self.label.is_some()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Reapply the stashed edits.
    pub fn restore(mut self) -> RestoreResult {
        self.restore_inner()
    }

    fn restore_inner(&mut self) -> RestoreResult {
        let Some(label) = self.label.take() else {
            return RestoreResult::NotNeeded;
        };

        match self.vcs.stash_pop(self.repo, &label) {
            Ok(()) => {
                self.audit.record(&AuditEvent::Restored {
                    repo: self.repo.to_path_buf(),
                });
                RestoreResult::Restored
            }
            Err(e) => {
                let error = e.to_string();
                self.audit.record(&AuditEvent::ManualResolutionRequired {
                    repo: self.repo.to_path_buf(),
                    label: label.clone(),
                    error: error.clone(),
                });
                RestoreResult::Conflict { label, error }
            }
        }
    }
}

impl Drop for StashHandle<'_> {
    fn drop(&mut self) {
        if self.label.is_some() {
            tracing::debug!(repo = %self.repo.display(), "restoring stash on drop");
            let _ = self.restore_inner();
        }
    }
}
