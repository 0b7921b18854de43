//! audit
//!
//! Append-only, timestamped record of what each sync run did.
//!
//! # Architecture
//!
//! The audit log is the operator-facing trail of an unattended run: every
//! per-repository decision and failure becomes one line
//!
//! ```text
//! YYYY-MM-DD HH:MM:SS: <message>
//! ```
//!
//! appended to a process-wide log file and mirrored to stdout. Nothing
//! about it is global: an [`AuditLog`] is a value handed to the
//! orchestrator, so several runs with different logs can share a process.
//!
//! # Concurrency
//!
//! The file is opened in append mode and each line goes out in a single
//! `write_all`, so lines from concurrently running invocations interleave
//! but never split.
//!
//! # Example
//!
//! ```
//! use autosync::audit::{AuditEvent, AuditLog};
//!
//! let log = AuditLog::console(false);
//! log.record(&AuditEvent::RunStarted { workflow: "pull".into(), repos: 3 });
//! ```

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

use crate::core::types::{BranchName, LocalTimestamp, Oid};

/// Errors from audit log setup.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The log file (or its directory) could not be opened for appending.
    #[error("cannot open audit log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One auditable event.
///
/// Variants carry the repository path so every line identifies which
/// working copy it concerns.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditEvent {
    /// A workflow pass began.
    RunStarted { workflow: String, repos: usize },

    /// Entry is missing or has no git metadata.
    InvalidRepository { repo: PathBuf, reason: String },

    /// Another invocation holds the repository lock.
    LockContention { repo: PathBuf },

    /// Lock could not be taken for a reason other than contention.
    LockFailed { repo: PathBuf, error: String },

    /// Remote references could not be fetched.
    FetchFailed { repo: PathBuf, error: String },

    /// Local and remote agree; nothing to do.
    UpToDate { repo: PathBuf, branch: BranchName },

    /// Uncommitted edits were set aside.
    Stashed { repo: PathBuf, label: String },

    /// Stash creation failed; the pull was not attempted.
    StashFailed { repo: PathBuf, error: String },

    /// Remote changes were integrated.
    Pulled {
        repo: PathBuf,
        branch: BranchName,
        from: Oid,
        to: Oid,
    },

    /// Pull failed; a human has to integrate the remote changes.
    ManualMergeRequired { repo: PathBuf, error: String },

    /// Best-effort pull in the push workflow failed; continuing.
    PullWarning { repo: PathBuf, error: String },

    /// A half-finished merge or rebase left by a failed pull was aborted.
    MergeAborted { repo: PathBuf },

    /// Auto-stash reapplied cleanly.
    Restored { repo: PathBuf },

    /// Auto-stash could not be reapplied; it stays in the stash list.
    ManualResolutionRequired {
        repo: PathBuf,
        label: String,
        error: String,
    },

    /// Working tree clean; nothing committed or pushed.
    NoChanges { repo: PathBuf },

    /// Local changes committed.
    Committed { repo: PathBuf, message: String },

    /// Commit could not be created.
    CommitFailed { repo: PathBuf, error: String },

    /// Branch pushed to the remote.
    Pushed {
        repo: PathBuf,
        remote: String,
        branch: BranchName,
    },

    /// Push rejected or failed.
    PushFailed { repo: PathBuf, error: String },

    /// Processing a repository failed unexpectedly.
    RepositoryError { repo: PathBuf, error: String },

    /// A workflow pass finished.
    RunFinished { workflow: String, summary: String },
}

impl AuditEvent {
    /// Whether this event asks for human follow-up.
    pub fn needs_attention(&self) -> bool {
        matches!(
            self,
            AuditEvent::ManualMergeRequired { .. }
                | AuditEvent::ManualResolutionRequired { .. }
                | AuditEvent::RepositoryError { .. }
        )
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEvent::RunStarted { workflow, repos } => {
                write!(f, "Starting {} sync of {} repositories", workflow, repos)
            }
            AuditEvent::InvalidRepository { repo, reason } => {
                write!(f, "Skipping {}: {}", repo.display(), reason)
            }
            AuditEvent::LockContention { repo } => write!(
                f,
                "Skipping {}: locked by another sync in progress",
                repo.display()
            ),
            AuditEvent::LockFailed { repo, error } => {
                write!(f, "Skipping {}: cannot lock: {}", repo.display(), error)
            }
            AuditEvent::FetchFailed { repo, error } => {
                write!(f, "Fetch failed for {}: {}", repo.display(), error)
            }
            AuditEvent::UpToDate { repo, branch } => {
                write!(f, "{} ({}) is up to date", repo.display(), branch)
            }
            AuditEvent::Stashed { repo, label } => {
                write!(f, "Stashed local changes in {} as '{}'", repo.display(), label)
            }
            AuditEvent::StashFailed { repo, error } => write!(
                f,
                "Could not stash local changes in {}, not pulling: {}",
                repo.display(),
                error
            ),
            AuditEvent::Pulled {
                repo,
                branch,
                from,
                to,
            } => write!(
                f,
                "Pulled {} ({}): {}..{}",
                repo.display(),
                branch,
                from.short(7),
                to.short(7)
            ),
            AuditEvent::ManualMergeRequired { repo, error } => write!(
                f,
                "Pull failed for {}, manual merge required: {}",
                repo.display(),
                error
            ),
            AuditEvent::PullWarning { repo, error } => write!(
                f,
                "Warning: pull failed for {}, continuing with push: {}",
                repo.display(),
                error
            ),
            AuditEvent::MergeAborted { repo } => {
                write!(f, "Aborted unfinished merge in {}", repo.display())
            }
            AuditEvent::Restored { repo } => {
                write!(f, "Restored local changes in {}", repo.display())
            }
            AuditEvent::ManualResolutionRequired { repo, label, error } => write!(
                f,
                concat!(
                    "ManualResolutionRequired: could not restore stash '{}' in {}; ",
                    "it remains in the stash list: {}"
                ),
                label,
                repo.display(),
                error
            ),
            AuditEvent::NoChanges { repo } => {
                write!(f, "No changes to commit in {}", repo.display())
            }
            AuditEvent::Committed { repo, message } => {
                write!(f, "Committed in {}: {}", repo.display(), message)
            }
            AuditEvent::CommitFailed { repo, error } => {
                write!(f, "Commit failed for {}: {}", repo.display(), error)
            }
            AuditEvent::Pushed {
                repo,
                remote,
                branch,
            } => write!(f, "Pushed {} to {}/{}", repo.display(), remote, branch),
            AuditEvent::PushFailed { repo, error } => {
                write!(f, "Push failed for {}: {}", repo.display(), error)
            }
            AuditEvent::RepositoryError { repo, error } => {
                write!(f, "Error processing {}: {}", repo.display(), error)
            }
            AuditEvent::RunFinished { workflow, summary } => {
                write!(f, "Finished {} sync: {}", workflow, summary)
            }
        }
    }
}

/// Format one audit line, newline-terminated.
///
/// Embedded line breaks (multi-line git stderr) are folded so each event
/// stays on exactly one line.
pub fn format_line(timestamp: &LocalTimestamp, message: &str) -> String {
    let folded = message
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" | ");
    format!("{}: {}\n", timestamp, folded)
}

/// Timestamped event sink: an optional append-mode file plus console echo.
#[derive(Debug)]
pub struct AuditLog {
    file: Option<Mutex<File>>,
    path: Option<PathBuf>,
    echo: bool,
}

impl AuditLog {
    /// Open `path` for appending, creating it and its parent directory.
    ///
    /// With `echo`, every line is also printed to stdout.
    pub fn open(path: &Path, echo: bool) -> Result<Self, AuditError> {
        let open_err = |source| AuditError::Open {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(open_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(open_err)?;

        Ok(Self {
            file: Some(Mutex::new(file)),
            path: Some(path.to_path_buf()),
            echo,
        })
    }

    /// Log without a file; lines only reach stdout (if `echo`).
    pub fn console(echo: bool) -> Self {
        Self {
            file: None,
            path: None,
            echo,
        }
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record an event now.
    pub fn record(&self, event: &AuditEvent) {
        if event.needs_attention() {
            tracing::warn!(%event, "needs attention");
        }
        self.write_line(&format_line(&LocalTimestamp::now(), &event.to_string()));
    }

    /// Record a free-form message now.
    pub fn message(&self, message: impl fmt::Display) {
        self.write_line(&format_line(&LocalTimestamp::now(), &message.to_string()));
    }

    fn write_line(&self, line: &str) {
        if let Some(file) = &self.file {
            // A poisoned lock only means another thread panicked mid-write;
            // the file handle itself is still usable.
            let mut file = file.lock().unwrap_or_else(|p| p.into_inner());
            if let Err(e) = file.write_all(line.as_bytes()) {
                tracing::warn!(error = %e, "failed to append to audit log");
            }
        }
        if self.echo {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(line.as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use tempfile::TempDir;

    fn fixed_time() -> LocalTimestamp {
        LocalTimestamp::from_datetime(Local.with_ymd_and_hms(2025, 3, 9, 7, 5, 1).unwrap())
    }

    #[test]
    fn line_format() {
        assert_eq!(
            format_line(&fixed_time(), "Pushed /r to origin/main"),
            "2025-03-09 07:05:01: Pushed /r to origin/main\n"
        );
    }

    #[test]
    fn multi_line_message_folded() {
        let line = format_line(&fixed_time(), "push failed:\n  rejected\n\n  hint: pull first\n");
        assert_eq!(
            line,
            "2025-03-09 07:05:01: push failed: | rejected | hint: pull first\n"
        );
    }

    #[test]
    fn appends_to_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("logs").join("autosync.log");

        let log = AuditLog::open(&path, false).unwrap();
        log.record(&AuditEvent::NoChanges {
            repo: PathBuf::from("/r/one"),
        });
        drop(log);

        let log = AuditLog::open(&path, false).unwrap();
        log.message("second run");

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(": No changes to commit in /r/one"));
        assert!(lines[1].ends_with(": second run"));
        // "YYYY-MM-DD HH:MM:SS: " prefix
        assert_eq!(&lines[0][4..5], "-");
        assert_eq!(&lines[0][19..21], ": ");
    }

    #[test]
    fn open_fails_on_directory() {
        let temp = TempDir::new().unwrap();
        let result = AuditLog::open(temp.path(), false);
        assert!(matches!(result, Err(AuditError::Open { .. })));
    }

    #[test]
    fn console_log_has_no_path() {
        let log = AuditLog::console(false);
        assert!(log.path().is_none());
        log.message("dropped");
    }

    #[test]
    fn manual_resolution_message_names_event() {
        let event = AuditEvent::ManualResolutionRequired {
            repo: PathBuf::from("/r"),
            label: "autosync auto-stash 2025-03-09 07:05:01 (pid 4)".into(),
            error: "conflict".into(),
        };
        assert!(event.needs_attention());
        assert!(event.to_string().starts_with("ManualResolutionRequired"));
    }

    #[test]
    fn routine_events_need_no_attention() {
        assert!(!AuditEvent::NoChanges {
            repo: PathBuf::from("/r")
        }
        .needs_attention());
        assert!(!AuditEvent::LockContention {
            repo: PathBuf::from("/r")
        }
        .needs_attention());
    }
}
