//! logvault CLI
//!
//! Read-only tools for inspecting finished archives.
//!
//! # Commands
//!
//! - `inspect` - Display the manifest and stream sizes of an archive
//! - `verify` - Re-read every stream and cross-check it
//! - `files` - List file rows, optionally decoding their messages
//! - `dict` - Dump a dictionary
//! - `archives` - List archives recorded in a catalog

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// logvault command-line archive tools.
#[derive(Parser)]
#[command(name = "logvault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the archive directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Shared catalog database to read file rows from instead of the
    /// archive's own metadata.db
    #[arg(global = true, long)]
    catalog: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Which dictionary to dump.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DictArg {
    /// Logtype templates
    Logtype,
    /// Variable values
    Var,
}

#[derive(Subcommand)]
enum Commands {
    /// Display archive manifest and stream sizes
    Inspect {
        /// Show per-segment details
        #[arg(short, long)]
        segments: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Verify archive integrity
    Verify,

    /// List file rows
    Files {
        /// Print decoded messages of each file
        #[arg(short, long)]
        messages: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Dump a dictionary
    Dict {
        /// Dictionary to dump
        #[arg(value_enum)]
        which: DictArg,

        /// Maximum number of entries
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List archives in a catalog (requires --catalog)
    Archives {
        /// Only archives of this creator, in creation order
        #[arg(long)]
        creator: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
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
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let catalog = cli.catalog.as_deref();
    match cli.command {
        Commands::Inspect { segments, format } => {
            let path = cli.path.ok_or("Archive path required for inspect")?;
            commands::inspect::run(&path, catalog, segments, format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Archive path required for verify")?;
            commands::verify::run(&path, catalog)?;
        }
        Commands::Files { messages, format } => {
            let path = cli.path.ok_or("Archive path required for files")?;
            commands::files::run(&path, catalog, messages, format)?;
        }
        Commands::Dict { which, limit } => {
            let path = cli.path.ok_or("Archive path required for dict")?;
            commands::dict::run(&path, catalog, which, limit)?;
        }
        Commands::Archives { creator, format } => {
            let catalog = catalog.ok_or("--catalog required for archives")?;
            commands::archives::run(catalog, creator.as_deref(), format)?;
        }
        Commands::Version => {
            println!("logvault CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("logvault core v{}", logvault_core::VERSION);
            println!("archive format {}", logvault_core::FormatVersion::CURRENT);
        }
    }

    Ok(())
}
