//! CLI Module
//!
//! Command-line host for browsing the node catalog and patch library and
//! rendering WAV files through a patch.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Patchcord - modular DSP graph engine
#[derive(Parser, Debug)]
#[command(name = "patchcord")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// User patch directory (overrides config and environment)
    #[arg(long, global = true)]
    pub patch_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered node types by category
    #[command(name = "nodes")]
    Nodes,

    /// List factory and user patches
    #[command(name = "patches")]
    Patches {
        /// Only show patches whose name, description or tags contain this text
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Print a patch document
    #[command(name = "show")]
    Show {
        /// Patch name or id
        patch: String,
    },

    /// Run a WAV file through a patch
    #[command(name = "render")]
    Render {
        /// Patch name or id
        patch: String,

        /// Input WAV file (mixed down to mono)
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file (mono, 32-bit float)
        #[arg(short, long)]
        output: PathBuf,

        /// Samples per processing block
        #[arg(short, long)]
        block_size: Option<usize>,
    },

    /// Write editable copies of the factory patches
    #[command(name = "export-factory")]
    ExportFactory {
        /// Destination directory
        #[arg(short, long)]
        dir: PathBuf,
    },
}
