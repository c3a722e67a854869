//! CLI module for the lifecycle orchestrator.
//!
//! This module provides the command-line interface for running
//! provisioning scenarios.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
