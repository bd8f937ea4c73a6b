//! Command-line interface
//!
//! Global flags plus one subcommand per way of using the node binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ledgerlink multi-party node
///
/// Loads the configured database, blockchain, shared storage, data exchange,
/// identity and token connectors and runs the node on top of them.
#[derive(Parser, Debug)]
#[command(name = "ledgerlink")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Initialize and start the node, then run until interrupted
    Run,

    /// Validate the configuration and list the plugins it declares
    CheckConfig,
}
