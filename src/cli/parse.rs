//! CLI parse: clap types for infinite-hd. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Infinite HD - library volume builder and chunk publisher
#[derive(Parser)]
#[command(name = "infinite-hd")]
#[command(about = "Merge library sources into HD volume images and publish them as chunks")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List import units in build order and the volumes receiving them
    Plan {
        /// Only units whose id contains this string (overrides config)
        #[arg(long)]
        filter: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Build every configured volume from the library and publish it as chunks
    Build {
        /// Only units whose id contains this string (overrides config)
        #[arg(long)]
        filter: Option<String>,
    },
    /// Chunk an image into the store and write its manifest
    Chunk {
        /// Image file
        image: PathBuf,
        /// Name recorded in the manifest (default: file stem)
        #[arg(long)]
        name: Option<String>,
    },
    /// Split an image into numbered chunk files
    Sequential {
        /// Image file
        image: PathBuf,
        /// Output directory for chunk files and the manifest
        out: PathBuf,
        /// Compress chunk files with brotli
        #[arg(long)]
        compress: bool,
    },
    /// Check that a manifest can be reassembled, optionally against an image
    Verify {
        /// Manifest JSON file
        manifest: PathBuf,
        /// Original image to compare with
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Remove every chunk from the store
    ClearStore,
}
