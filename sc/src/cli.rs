//! CLI argument parsing for sercount

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::codec::Format;

#[derive(Parser, Debug)]
#[command(name = "sercount")]
#[command(author, version, about = "Serialize large collections with item-level progress", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Also forward progress over a bounded channel and report what it delivered
    #[arg(long, global = true)]
    pub channel: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate sample records and write them with progress
    Write {
        /// Number of records to generate
        #[arg(short = 'n', long, default_value = "1000")]
        items: u64,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Encoding (default: from extension, then config)
        #[arg(short, long)]
        format: Option<Format>,

        /// Label prefix for generated records
        #[arg(long, default_value = "record")]
        prefix: String,
    },

    /// Read records back with progress
    Read {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Encoding (default: from extension, then config)
        #[arg(short, long)]
        format: Option<Format>,
    },

    /// Show the declared item total without decoding the payload
    Inspect {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Encoding (default: from extension, then config)
        #[arg(short, long)]
        format: Option<Format>,
    },
}
