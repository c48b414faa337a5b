//! CLI module for syncstack
//!
//! This module provides the command-line interface for syncstack,
//! including argument parsing and subcommand handling.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// syncstack - synthesize the S3 sync server deployment
///
/// Builds the network, bastion, and private host stacks from the deployment
/// context and writes them as a cloud assembly.
#[derive(Parser, Debug, Clone)]
#[command(name = "syncstack")]
#[command(author = "syncstack Contributors")]
#[command(version)]
#[command(about = "Synthesize the S3 sync server deployment", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Context overrides (key=value or @file.yml)
    #[arg(short = 'c', long = "context", global = true, action = clap::ArgAction::Append)]
    pub context: Vec<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long = "output-format", global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// App file holding the deployment context
    #[arg(long, global = true, env = "SYNCSTACK_APP")]
    pub app: Option<PathBuf>,

    /// Path to configuration file, read instead of the default locations
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Synthesize every stack into a cloud assembly
    Synth(commands::synth::SynthArgs),

    /// List stacks in deployment order
    List(commands::list::ListArgs),

    /// Print the stack dependency graph in DOT format
    Graph(commands::graph::GraphArgs),

    /// Print the private host's rendered user data
    #[command(name = "user-data")]
    UserData(commands::user_data::UserDataArgs),
}

impl Commands {
    /// The command to run
    pub fn runnable(&self) -> &dyn commands::Runnable {
        match self {
            Commands::Synth(args) => args,
            Commands::List(args) => args,
            Commands::Graph(args) => args,
            Commands::UserData(args) => args,
        }
    }
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output_format, OutputFormat::Json)
    }
}
