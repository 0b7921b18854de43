//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the only doorway to Git. No other module imports `git2`
//! or spawns `git`.
//!
//! - `interface` reads repository state through git2 ([`Git`])
//! - [`command`] runs the git CLI with a time bound
//! - [`traits`] defines the [`Vcs`] capability set the engine consumes
//! - [`GitBackend`] implements [`Vcs`] on top of the two
//! - [`mock`] implements [`Vcs`] in memory for tests
//!
//! # Invariants
//!
//! - No repository state is cached between calls
//! - No git child process can prompt for input or run unbounded
//!
//! # Example
//!
//! ```no_run
//! use autosync::core::config::PullStrategy;
//! use autosync::git::{GitBackend, Vcs};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! let vcs = GitBackend::new(Duration::from_secs(60), PullStrategy::Merge);
//! let repo = Path::new("/home/me/notes");
//! let branch = vcs.current_branch(repo)?;
//! vcs.fetch(repo, "origin", &branch)?;
//! # Ok::<(), autosync::git::GitError>(())
//! ```

mod backend;
pub mod command;
mod interface;
pub mod mock;
pub mod traits;

pub use backend::GitBackend;
pub use command::{run_git, GitOutput};
pub use interface::{Git, GitError, GitState, WorktreeStatus};
pub use traits::{StashEntry, Vcs};
