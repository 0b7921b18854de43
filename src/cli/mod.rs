//! cli
//!
//! Command-line interface layer for autosync.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration and the repository list
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. Handlers resolve configuration, build the
//! [`crate::engine`] and the audit log, and report. They never touch a
//! repository except through [`crate::git`].

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use std::path::PathBuf;

use crate::ui::output::Verbosity;
use anyhow::Result;

/// Settings shared by every command, taken from global flags.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Explicit configuration file
    pub config: Option<PathBuf>,
    /// Repository list override
    pub repos: Option<PathBuf>,
    /// Audit log override
    pub log_file: Option<PathBuf>,
    pub debug: bool,
    pub quiet: bool,
}

impl Context {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }
}

impl From<&Cli> for Context {
    fn from(cli: &Cli) -> Self {
        Self {
            config: cli.config.clone(),
            repos: cli.repos.clone(),
            log_file: cli.log_file.clone(),
            debug: cli.debug,
            quiet: cli.quiet,
        }
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);
    let ctx = Context::from(&cli);
    commands::dispatch(cli.command, &ctx)
}

/// Install the diagnostic subscriber on stderr.
///
/// `--debug` enables everything from this crate; otherwise `RUST_LOG`
/// applies, defaulting to warnings only.
fn init_tracing(debug: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if debug {
        EnvFilter::new("autosync=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
