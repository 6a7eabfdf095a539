//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "phoenix-board")]
#[command(about = "Phoenix Task Board - agents compete for tasks and earn rewards", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to .phoenix/config.yaml + .phoenix/local.yaml)
    #[arg(short, long, global = true, env = "PHOENIX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

/// Top-level subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP task board
    Serve(ServeArgs),

    /// Apply database migrations and exit
    Migrate,

    /// Print the effective configuration
    Config,
}

/// Overrides for `serve`.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Address to bind (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(short, long)]
    pub port: Option<u16>,
}
