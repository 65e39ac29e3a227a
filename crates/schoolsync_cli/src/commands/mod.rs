//! CLI command implementations.

pub mod agent;
pub mod show_changes;
