//! # Grafter CLI Module
//!
//! This module implements the CLI interface for Grafter.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `run` - Apply a transform chain to a graph file and report the result
//! - `check` - Validate a transform chain file

mod commands;

use crate::settings::Settings;
use clap::{Parser, Subcommand};
use grafter_core::GrafterError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Grafter - interactive graph analysis engine
///
/// Derives working graphs through filter and %-NN transform chains, with
/// undoable, cancellable commands.
#[derive(Parser, Debug)]
#[command(name = "grafter")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Settings file (default: grafter.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Graph file to load (JSON)
        #[arg(short, long)]
        graph: Option<PathBuf>,

        /// Host to bind to (overrides settings)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides settings)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Apply a transform chain to a graph
    Run {
        /// Graph file (JSON)
        #[arg(short, long)]
        graph: PathBuf,

        /// Transform chain file (TOML or JSON)
        #[arg(short, long)]
        transforms: Option<PathBuf>,
    },

    /// Validate a transform chain
    Check {
        /// Transform chain file (TOML or JSON)
        #[arg(short, long)]
        transforms: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments and loaded settings.
pub async fn execute(cli: Cli, mut settings: Settings) -> Result<(), GrafterError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Server { graph, host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            cmd_server(&settings, graph.as_deref()).await
        }
        Commands::Run { graph, transforms } => {
            cmd_run(&settings, json_mode, &graph, transforms.as_deref())
        }
        Commands::Check { transforms } => cmd_check(json_mode, &transforms),
    }
}
