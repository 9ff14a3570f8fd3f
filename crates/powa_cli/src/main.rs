//! POWA CLI
//!
//! Offline tools for a POWA database directory. Every command reads the
//! record log directly and never writes to it.
//!
//! # Commands
//!
//! - `inspect` - Display schema version, stores and indexes
//! - `dump` - Print every record of a store
//! - `query` - Look records up through an index
//! - `verify` - Check every log frame

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// POWA command-line database tools.
#[derive(Parser)]
#[command(name = "powa")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Storage root containing the database directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Database name
    #[arg(global = true, short, long, default_value = powa_core::DEFAULT_DATABASE_NAME)]
    name: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display schema version, stores and indexes
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print every record of a store in key order
    Dump {
        /// Store name
        store: String,

        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print the records whose indexed field equals a key
    Query {
        /// Store name
        store: String,

        /// Index name
        index: String,

        /// Key to match; integers are matched as integers
        key: String,
    },

    /// Verify every frame of the record log
    Verify,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let root = cli.path.ok_or("Storage root required for inspect")?;
            commands::inspect::run(&root.join(&cli.name), &format)?;
        }
        Commands::Dump { store, limit } => {
            let root = cli.path.ok_or("Storage root required for dump")?;
            commands::dump::run(&root.join(&cli.name), &store, limit)?;
        }
        Commands::Query { store, index, key } => {
            let root = cli.path.ok_or("Storage root required for query")?;
            commands::query::run(&root.join(&cli.name), &store, &index, &key)?;
        }
        Commands::Verify => {
            let root = cli.path.ok_or("Storage root required for verify")?;
            commands::verify::run(&root.join(&cli.name))?;
        }
        Commands::Version => {
            println!("POWA CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Record log format v{}", powa_core::log::LOG_VERSION);
        }
    }

    Ok(())
}
