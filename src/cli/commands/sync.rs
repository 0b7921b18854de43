//! pull / push commands - Run a sync workflow over the repository list

use super::{backend, load_setup};
use crate::audit::AuditLog;
use crate::cli::Context;
use crate::core::config::Config;
use crate::engine::{Orchestrator, SyncEngine, SyncSettings, Workflow};
use crate::ui::output;
use anyhow::Result;

/// Pull remote changes into every listed repository.
pub fn pull(ctx: &Context) -> Result<()> {
    run(ctx, Workflow::Pull)
}

/// Commit and push local changes in every listed repository.
pub fn push(ctx: &Context) -> Result<()> {
    run(ctx, Workflow::Push)
}

fn run(ctx: &Context, workflow: Workflow) -> Result<()> {
    let setup = load_setup(ctx)?;
    let audit = open_audit(&setup.config, ctx)?;
    let vcs = backend(&setup.config);

    let settings = SyncSettings {
        remote: setup.config.remote().to_string(),
    };
    let engine = SyncEngine::new(&vcs, &audit, settings);
    let summary = Orchestrator::new(engine).run(workflow, &setup.list);

    let verbosity = ctx.verbosity();
    for report in summary.unsuccessful() {
        output::debug(
            format!("{}: {}", report.path.display(), report.outcome),
            verbosity,
        );
    }

    Ok(())
}

/// Open the configured audit log, falling back to console-only logging
/// when the file cannot be opened.
fn open_audit(config: &Config, ctx: &Context) -> Result<AuditLog> {
    let path = config.log_path()?;
    let echo = !ctx.quiet;
    match AuditLog::open(&path, echo) {
        Ok(log) => Ok(log),
        Err(e) => {
            output::warn(format!("{}; logging to console only", e), ctx.verbosity());
            Ok(AuditLog::console(echo))
        }
    }
}
