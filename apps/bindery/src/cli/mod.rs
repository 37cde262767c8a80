//! # Bindery CLI Module
//!
//! This module implements the CLI interface for Bindery.
//!
//! ## Available Commands
//!
//! - `check` - Evaluate the requested bindings without creating them
//! - `sync` - Connect bindings, mirror networks and report derived parameters
//! - `mirror` - Mirror flow networks into geometry only

mod commands;

use bindery_core::BinderyError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Bindery - keeps semantic components, geometry and flow networks in step
#[derive(Parser, Debug)]
#[command(name = "bindery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the TOML configuration file (defaults to ./bindery.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Debounce derived-parameter updates (flushed before reporting)
    #[arg(long, global = true)]
    pub async_updates: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate every requested binding without creating it
    Check {
        /// Path to the project document (JSON)
        project: PathBuf,
    },

    /// Connect bindings, mirror networks and report derived parameters
    Sync {
        /// Path to the project document (JSON)
        project: PathBuf,
    },

    /// Mirror flow networks into their geometric models
    Mirror {
        /// Path to the project document (JSON)
        project: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), BinderyError> {
    let mut config = crate::config::load_config(cli.config.as_deref())?;
    if cli.async_updates {
        config.enable_async_updates = true;
    }
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Check { project } => cmd_check(&project, config, json_mode),
        Commands::Sync { project } => cmd_sync(&project, config, json_mode),
        Commands::Mirror { project } => cmd_mirror(&project, config, json_mode),
    }
}
