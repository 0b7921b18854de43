//! status command - Report the sync state of every listed repository
//!
//! Read-only: never takes the repository lock, writes no audit line, and
//! only fetches with `--fetch` (which moves remote-tracking refs, never the
//! working tree). The lock check takes a momentary shared lock on an
//! existing marker; it never creates, removes, or holds the marker.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{backend, load_setup};
use crate::cli::Context;
use crate::core::ops::RepoLock;
use crate::core::repo_list::RepositoryList;
use crate::core::types::{BranchName, Oid};
use crate::engine::probe::{inspect, probe, ProbeError, RemoteState};
use crate::engine::stash::is_auto_stash;
use crate::git::Vcs;
use crate::ui::output;
use anyhow::{Context as _, Result};

/// Sync state of one repository.
#[derive(Debug, Clone, Serialize)]
pub struct RepoStatus {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_commit: Option<Oid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_commit: Option<Oid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_branch_exists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_sync: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dirty: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    /// Auto-stash messages awaiting manual recovery
    pub auto_stashes: Vec<String>,
    /// Why some fields are missing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RepoStatus {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            branch: None,
            local_commit: None,
            remote_commit: None,
            remote_branch_exists: None,
            in_sync: None,
            dirty: None,
            locked: None,
            auto_stashes: Vec::new(),
            error: None,
        }
    }

    fn apply(&mut self, state: RemoteState) {
        self.in_sync = Some(!state.diverged());
        self.dirty = Some(state.dirty);
        self.remote_branch_exists = Some(state.remote_branch_exists);
        self.branch = Some(state.branch);
        self.local_commit = Some(state.local_commit);
        self.remote_commit = Some(state.remote_commit);
    }
}

/// Show the sync state of every listed repository.
pub fn status(ctx: &Context, fetch: bool, json: bool) -> Result<()> {
    let setup = load_setup(ctx)?;
    let vcs = backend(&setup.config);
    let statuses = collect_status(&vcs, &setup.list, setup.config.remote(), fetch);

    if json {
        let rendered =
            serde_json::to_string_pretty(&statuses).context("Failed to serialize status")?;
        println!("{}", rendered);
        return Ok(());
    }

    let verbosity = ctx.verbosity();
    for status in &statuses {
        output::print(render(status, setup.config.remote()), verbosity);
    }
    Ok(())
}

/// Gather the status of every entry in `list`.
pub fn collect_status(
    vcs: &dyn Vcs,
    list: &RepositoryList,
    remote: &str,
    fetch: bool,
) -> Vec<RepoStatus> {
    list.iter()
        .map(|path| repo_status(vcs, path, remote, fetch))
        .collect()
}

fn repo_status(vcs: &dyn Vcs, path: &Path, remote: &str, fetch: bool) -> RepoStatus {
    let mut status = RepoStatus::new(path);

    let metadata_dir = match vcs.metadata_dir(path) {
        Ok(dir) => dir,
        Err(e) => {
            status.error = Some(e.to_string());
            return status;
        }
    };

    match RepoLock::is_locked(&metadata_dir) {
        Ok(locked) => status.locked = Some(locked),
        Err(e) => tracing::warn!(repo = %path.display(), error = %e, "cannot check lock"),
    }

    let state = if fetch {
        probe(vcs, path, remote).or_else(|e| match e {
            ProbeError::Fetch { .. } => {
                status.error = Some(e.to_string());
                inspect(vcs, path, remote)
            }
            other => Err(other),
        })
    } else {
        inspect(vcs, path, remote)
    };
    match state {
        Ok(state) => status.apply(state),
        Err(e) => status.error = Some(e.to_string()),
    }

    match vcs.stash_list(path) {
        Ok(entries) => {
            status.auto_stashes = entries
                .into_iter()
                .filter(|entry| is_auto_stash(&entry.message))
                .map(|entry| format!("{} {}", entry.selector, entry.message))
                .collect();
        }
        Err(e) => tracing::warn!(repo = %path.display(), error = %e, "cannot list stashes"),
    }

    status
}

fn render(status: &RepoStatus, remote: &str) -> String {
    let mut lines = Vec::new();

    match (&status.branch, &status.local_commit, &status.remote_commit) {
        (Some(branch), Some(local), Some(remote_commit)) => {
            let sync = match (status.remote_branch_exists, status.in_sync) {
                (Some(false), _) => format!("no {}/{}", remote, branch),
                (_, Some(true)) => "in sync".to_string(),
                _ => format!("differs from {}/{} ({})", remote, branch, remote_commit.short(7)),
            };
            let mut flags = Vec::new();
            if status.dirty == Some(true) {
                flags.push("dirty");
            }
            if status.locked == Some(true) {
                flags.push("locked");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };
            lines.push(format!(
                "{}: {} {} {}{}",
                status.path.display(),
                branch,
                local.short(7),
                sync,
                flags
            ));
        }
        _ => lines.push(format!("{}: unavailable", status.path.display())),
    }

    if let Some(error) = &status.error {
        lines.push(format!("  error: {}", error));
    }
    for stash in &status.auto_stashes {
        lines.push(format!("  needs recovery: {}", stash));
    }

    lines.join("\n")
}
