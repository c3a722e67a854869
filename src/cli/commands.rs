//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Lifecycle - provision, exercise, and tear down dependent cloud resources.
#[derive(Parser, Debug)]
#[command(name = "lifecycle")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the scenario file.
    #[arg(short, long, global = true, env = "LIFECYCLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Log format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub log_format: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter scenario.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the scenario file.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Show creation and deletion order without calling the provider.
    Plan,

    /// Provision, apply updates, and clean up.
    Run {
        /// Write the JSON run report to this file.
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_with_report() {
        let cli = Cli::try_parse_from([
            "lifecycle",
            "--config",
            "scenario.yaml",
            "run",
            "--report",
            "out.json",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("scenario.yaml")));
        assert!(matches!(
            cli.command,
            Commands::Run { report: Some(ref p) } if p == &PathBuf::from("out.json")
        ));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["lifecycle", "plan", "--output", "json", "-v"]).unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(cli.verbose);
        assert_eq!(cli.log_format, OutputFormat::Text);
    }
}
