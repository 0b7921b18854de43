//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Configuration file to use
//! - `--repos <path>`: Repository list to use
//! - `--log-file <path>`: Audit log to append to
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Do not echo audit lines to stdout

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// autosync - keep many git working copies in step with their remotes
#[derive(Parser, Debug)]
#[command(name = "autosync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: $AUTOSYNC_CONFIG, then the XDG and
    /// ~/.autosync locations)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Repository list, one working-copy path per line
    #[arg(long, global = true, value_name = "PATH")]
    pub repos: Option<PathBuf>,

    /// Audit log to append to
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Do not echo audit lines to stdout
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pull remote changes into every listed repository
    #[command(
        long_about = "Pull remote changes into every listed repository.\n\n\
            Each repository is locked, fetched, and compared with its remote. \
            Repositories that are already up to date are left untouched. \
            Otherwise uncommitted edits are stashed, the remote branch is pulled, \
            and the edits are restored. A stash that cannot be restored stays in \
            the stash list and is reported in the audit log.",
        after_help = "\
EXAMPLES:
    # Run from cron every minute
    * * * * * autosync pull --quiet

    # Use a different list for one run
    autosync pull --repos ~/work/repos.txt"
    )]
    Pull,

    /// Commit and push local changes in every listed repository
    #[command(
        long_about = "Commit and push local changes in every listed repository.\n\n\
            Each repository is locked and fetched; a diverged remote is pulled \
            first on a best-effort basis. If tracked files changed, everything is \
            staged, committed as 'Auto-sync: <timestamp> [automated]', and the \
            current branch is pushed. Clean repositories are not touched.",
        after_help = "\
EXAMPLES:
    # Run from cron every 15 minutes
    */15 * * * * autosync push --quiet"
    )]
    Push,

    /// Show the sync state of every listed repository
    #[command(
        long_about = "Show the sync state of every listed repository.\n\n\
            Reports the branch, local and remote commits, whether the working \
            tree is dirty, whether a sync currently holds the repository lock, \
            and any auto-stashes waiting for manual recovery. Read-only: nothing \
            is fetched unless --fetch is given."
    )]
    Status {
        /// Fetch from the remote before comparing
        #[arg(long)]
        fetch: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
