//! CLI command definitions.

use crate::config::OutputFormat;
use clap::{Subcommand, ValueEnum};

#[derive(Subcommand)]
pub enum Commands {
    /// Check a benchmark list and print its shape
    Validate {
        /// Task variable file with a `benchmarks` list
        path: String,
    },

    /// Build the workflow for a release and print it
    Render {
        /// Release descriptor (YAML or JSON)
        #[arg(short, long)]
        release: String,

        /// What to build
        #[arg(short, long, value_enum, default_value_t = RenderOperation::Benchmarks)]
        operation: RenderOperation,

        /// Task group of a standalone benchmark run
        #[arg(short, long)]
        task_group: Option<String>,

        /// Output format; defaults to the configured one
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Print the JSON schema of the release descriptor
    Schema,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RenderOperation {
    Install,
    Scaleup,
    Benchmarks,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },
}
