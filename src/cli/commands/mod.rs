//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Loads configuration and the repository list ([`load_setup`])
//! 2. Builds the git backend and, for workflows, the audit log
//! 3. Runs the engine and formats output
//!
//! Any error returned from here means the run could not start; it becomes
//! a non-zero exit status in `main`. Per-repository failures never do.

mod completion;
mod status;
mod sync;

pub use completion::{completion, write_completion};
pub use status::{collect_status, status, RepoStatus};
pub use sync::{pull, push};

use crate::cli::args::Command;
use crate::cli::Context;
use crate::core::config::Config;
use crate::core::repo_list::RepositoryList;
use crate::git::GitBackend;
use anyhow::{Context as _, Result};

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Pull => sync::pull(ctx),
        Command::Push => sync::push(ctx),
        Command::Status { fetch, json } => status::status(ctx, fetch, json),
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// Configuration and repository list for one run.
#[derive(Debug)]
pub struct Setup {
    pub config: Config,
    pub list: RepositoryList,
}

/// Load configuration (applying CLI overrides) and the repository list.
///
/// This is the only fatal step of a run.
pub fn load_setup(ctx: &Context) -> Result<Setup> {
    let config = Config::load(ctx.config.as_deref())
        .context("Failed to load configuration")?
        .with_overrides(ctx.repos.clone(), ctx.log_file.clone());

    if let Some(path) = config.loaded_from() {
        tracing::debug!(config = %path.display(), "loaded configuration");
    }

    let list_path = config.repo_list_path()?;
    let list = RepositoryList::load(&list_path).context("Failed to load repository list")?;
    tracing::debug!(list = %list_path.display(), entries = list.len(), "loaded repository list");

    Ok(Setup { config, list })
}

/// Production git backend configured from `config`.
pub fn backend(config: &Config) -> GitBackend {
    GitBackend::new(config.network_timeout(), config.pull_strategy())
}
