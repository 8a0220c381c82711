//! SegFile CLI
//!
//! Command-line tools for inspecting segmented data files.
//!
//! # Commands
//!
//! - `inspect` - Display file length, bounds and segment layout
//! - `verify` - Read every row and cell of a data file
//! - `slice` - Print a row's cells up to a stop bound

mod commands;

use clap::{Parser, Subcommand};
use commands::OpenOptions;
use segfile_core::{Config, DiskAccessMode};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// SegFile command-line data file tools.
#[derive(Parser)]
#[command(name = "segfile")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Disk access mode (auto, mmap, mmap_index_only, standard)
    #[arg(global = true, long, default_value = "auto")]
    access_mode: DiskAccessMode,

    /// Largest segment that is memory-mapped, in bytes
    #[arg(global = true, long)]
    max_segment_size: Option<u64>,

    /// Cell name comparator (bytes, long)
    #[arg(global = true, long, default_value = "bytes")]
    comparator: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display data file length, bounds and segments
    Inspect {
        /// Show planned segments
        #[arg(short, long)]
        segments: bool,

        /// List every row
        #[arg(short, long)]
        rows: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify every row of a data file
    Verify,

    /// Print a row's cells up to a stop bound
    Slice {
        /// Absolute offset of the row
        #[arg(long)]
        position: u64,

        /// Last cell name to include (default: whole row)
        #[arg(long)]
        finish: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::new().disk_access_mode(cli.access_mode);
    if let Some(size) = cli.max_segment_size {
        config = config.max_segment_size(size);
    }
    config.validate()?;
    let options = OpenOptions {
        config,
        comparator: cli.comparator,
    };

    match cli.command {
        Commands::Inspect {
            segments,
            rows,
            format,
        } => {
            let path = cli.path.ok_or("Data file path required for inspect")?;
            commands::inspect::run(&path, &options, segments, rows, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Data file path required for verify")?;
            commands::verify::run(&path, &options)?;
        }
        Commands::Slice {
            position,
            finish,
            format,
        } => {
            let path = cli.path.ok_or("Data file path required for slice")?;
            commands::slice::run(&path, &options, position, finish.as_deref(), &format)?;
        }
        Commands::Version => {
            println!("SegFile CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("SegFile Core v{}", segfile_core::VERSION);
        }
    }

    Ok(())
}
