//! # cellgraph CLI Module
//!
//! ## Available Commands
//!
//! - `init` - Create an empty telemetry store
//! - `simulate` - Fill the store with synthetic cells and a ring topology
//! - `ingest` - Sync telemetry rows from a JSON file
//! - `link` - Append connectivity edges from a JSON file
//! - `run` - Run the congestion pipeline once
//! - `status` - Show store counts
//! - `segments` - List segment predictions
//! - `server` - Start the dashboard API

mod commands;

use cellgraph_core::CellGraphError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// cellgraph - congestion prediction over a cell connectivity graph
///
/// Labels cells from their KPIs, trains a classifier on graph embeddings,
/// and flags weak network segments.
#[derive(Parser, Debug)]
#[command(name = "cellgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the redb store (overrides config and CELLGRAPH_DB)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Pipeline configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an empty store
    Init {
        /// Replace an existing store
        #[arg(short, long)]
        force: bool,
    },

    /// Generate synthetic telemetry and connectivity
    Simulate {
        /// Number of cells
        #[arg(short = 'n', long, default_value = "20")]
        cells: u64,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Random edges added on top of the ring
        #[arg(long, default_value = "0")]
        chords: usize,
    },

    /// Sync telemetry rows from a JSON array
    Ingest {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Append connectivity edges from a JSON array of {source, target}
    ///
    /// Cells are numeric ids (`1`) or store keys (`"1"`).
    Link {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Run the pipeline once
    Run,

    /// Show store counts
    Status,

    /// List segment predictions
    Segments,

    /// Start the dashboard API
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), CellGraphError> {
    let config = resolve_config(cli.config.as_deref(), cli.database.as_deref())?;
    let json_mode = cli.json_mode;

    if cli.verbose {
        tracing::info!(store = %config.store.path.display(), "using store");
    }

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&config, json_mode, force),
        Some(Commands::Simulate {
            cells,
            seed,
            chords,
        }) => cmd_simulate(&config, json_mode, cells, seed, chords),
        Some(Commands::Ingest { file }) => cmd_ingest(&config, json_mode, &file),
        Some(Commands::Link { file }) => cmd_link(&config, json_mode, &file),
        Some(Commands::Run) => cmd_run(&config, json_mode),
        Some(Commands::Segments) => cmd_segments(&config, json_mode),
        Some(Commands::Server { host, port }) => cmd_server(&config, &host, port).await,
        Some(Commands::Status) | None => cmd_status(&config, json_mode),
    }
}
