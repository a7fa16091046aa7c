//! CLI argument parsing using clap
//!
//! The monitoring agent invokes the plugin with a single positional verb, or with
//! none at all to fetch values. Each verb maps to a [`Command`] variant.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// stressmon - stress-ng throughput sampler for a polling monitoring agent
#[derive(Parser, Debug)]
#[command(name = "stressmon")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Optional TOML configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verb; omit to emit the metric report
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Invocation verbs
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print graph and field definitions
    Config,
    /// Print the installation hint
    Suggest,
    /// Report whether the workload program is installed
    Autoconf,
    /// Launch the sampling daemon unless it is already running
    Start,
    /// Terminate the running sampling daemon
    Stop,
    /// Print the daemon state
    Status,
    /// Run the sampling loop in the foreground (used by `start`)
    #[command(hide = true)]
    Run,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
