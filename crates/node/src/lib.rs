//! Stowage node CLI.
//!
//! This crate provides the command-line surface of the node:
//! - [`Cli`] - top-level parser
//! - [`Commands`] - available subcommands
//! - [`NodeConfig`] - layered configuration
//!
//! Configuration is loaded with Figment with the following priority
//! (highest wins):
//!
//! 1. CLI arguments
//! 2. Config file (TOML)
//! 3. Environment variables (`STOWAGE_` prefix)
//! 4. Defaults

pub mod args;
mod cli;
pub mod commands;
mod config;
pub mod logging;
pub mod version;

pub use cli::{Cli, Commands, NodeArgs};
pub use config::NodeConfig;

use clap::Parser;
use color_eyre::eyre;
use tracing::info;

/// Run the stowage node with the given CLI arguments.
///
/// This is the main entry point called from the binary.
pub async fn run() -> eyre::Result<()> {
    // Setup error handling
    color_eyre::install()?;

    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    logging::init_logging(&cli.logs)?;

    info!("Starting stowage {}", version::VERSION);

    // Dispatch command
    match cli.command {
        Commands::Node(args) => {
            commands::node::run(args).await?;
        }
    }

    Ok(())
}
