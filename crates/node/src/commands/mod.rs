//! Node subcommands.

pub mod node;
