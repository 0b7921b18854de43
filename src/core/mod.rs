//! core
//!
//! Core domain types, configuration, and repository-scoped primitives.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, LocalTimestamp
//! - [`repo_list`] - The repository list a run iterates
//! - [`ops`] - Per-repository locking
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for autosync storage

pub mod config;
pub mod ops;
pub mod paths;
pub mod repo_list;
pub mod types;
