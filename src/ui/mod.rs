//! ui
//!
//! User-facing console output.
//!
//! # Modules
//!
//! - [`output`] - Verbosity-aware printing for command handlers

pub mod output;
