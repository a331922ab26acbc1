//! Command-line interface for gridmatch.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Gridmatch - single-player grid game server with a public leaderboard
#[derive(Parser, Debug)]
#[command(name = "gridmatch")]
#[command(about = "Grid game match server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP match server
    Serve {
        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
    },

    /// Render and publish the hall of fame once, then exit
    Publish,
}
