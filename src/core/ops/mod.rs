//! core::ops
//!
//! Repository-scoped operation primitives.
//!
//! # Modules
//!
//! - [`lock`] - Per-repository exclusive lock
//!
//! # Architecture
//!
//! Every sync workflow:
//! 1. Acquires the repository lock (skipping the repository if held)
//! 2. Performs its reads and writes against the working tree
//! 3. Releases the lock on every exit path (guard drop)

pub mod lock;

pub use lock::{LockError, RepoLock};
