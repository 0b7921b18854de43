//! autosync - unattended synchronization of many git working copies
//!
//! autosync keeps a list of independently versioned working copies in step
//! with their remotes across periodic, possibly overlapping, scheduled
//! invocations. The pull workflow brings remote changes in without losing
//! uncommitted edits; the push workflow commits and publishes local edits.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, loads config)
//! - [`engine`] - Pull and push workflows and the run orchestrator
//! - [`audit`] - Append-only, timestamped record of every run
//! - [`core`] - Domain types, configuration, repository list, locking
//! - [`git`] - Single interface for all Git operations
//! - [`ui`] - Console output
//!
//! # Correctness Invariants
//!
//! autosync maintains the following invariants:
//!
//! 1. At most one invocation works on a repository at a time
//! 2. Uncommitted edits set aside for a pull are restored or reported,
//!    never silently abandoned
//! 3. An up-to-date repository is never written to
//! 4. One repository's failure never stops the rest of the run

pub mod audit;
pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod ui;
