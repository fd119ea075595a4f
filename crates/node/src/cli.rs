//! CLI argument assembly and top-level parser.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub use crate::args::{ApiArgs, LogArgs};

/// Stowage - Storage Deal Node
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Logging configuration.
    #[command(flatten)]
    pub logs: LogArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Stowage node commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a stowage node.
    Node(NodeArgs),
}

/// Arguments for the 'node' command.
#[derive(Debug, Args)]
pub struct NodeArgs {
    /// Path to a TOML config file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// API configuration.
    #[command(flatten)]
    pub api: ApiArgs,
}
