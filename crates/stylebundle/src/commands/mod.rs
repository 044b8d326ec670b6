//! Command implementations for the stylebundle CLI
//!
//! Each command module handles the CLI interface and delegates to
//! stylebundle-core for the actual work.

pub mod build;
