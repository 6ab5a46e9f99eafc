//! Command-line interface definitions for dupfinder.
//!
//! This module defines all CLI arguments and subcommands using the clap
//! derive API. Global options (verbosity, config file) apply to every
//! subcommand.
//!
//! # Example
//!
//! ```bash
//! # Find duplicates and remember hashes for the next run
//! dupfinder scan ~/Pictures --inventory pictures.json
//!
//! # Same, moving duplicates to the trash
//! dupfinder scan ~/Pictures --inventory pictures.json --delete
//!
//! # Forget files that no longer exist
//! dupfinder prune ~/Pictures --inventory pictures.json
//!
//! # Remember the current flags as defaults, keep a log
//! dupfinder --log-file dupfinder.log scan ~/Pictures --alg sha256 --save-config
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::scanner::HashAlgorithm;

/// Duplicate file finder with a persistent hash inventory.
///
/// Files are compared by size, then by a hash of their first 4 KiB, then by
/// a hash of their full content. Hashes are kept in an inventory file so
/// unchanged files are not read again on the next run.
#[derive(Debug, Parser)]
#[command(name = "dupfinder")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (TOML)
    ///
    /// If not specified, a default platform-specific path is used.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Append log records to this file instead of stderr
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a directory for duplicate files
    Scan(ScanArgs),
    /// Remove inventory records of files that no longer exist
    Prune(PruneArgs),
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory path to scan for duplicates
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Inventory file (.csv or .json) to load and update
    #[arg(short = 'f', long, value_name = "FILE")]
    pub inventory: Option<PathBuf>,

    /// Hash algorithm
    #[arg(short = 'a', long = "alg", value_enum, value_name = "ALG")]
    pub algorithm: Option<HashAlgorithm>,

    /// Delete duplicates, keeping the first path of each group
    #[arg(long)]
    pub delete: bool,

    /// Use permanent deletion instead of moving to trash
    ///
    /// Warning: Files cannot be recovered after permanent deletion.
    #[arg(long, requires = "delete")]
    pub permanent: bool,

    /// Number of I/O threads for hashing (default: 4)
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// File extension to skip (can be specified multiple times)
    #[arg(short = 'x', long = "exclude-ext", value_name = "EXT")]
    pub exclude_extensions: Vec<String>,

    /// Treat empty files as duplicates of each other
    #[arg(long)]
    pub include_empty: bool,

    /// Follow symbolic links during scan
    ///
    /// Warning: May cause infinite loops if symlinks form cycles.
    #[arg(long, overrides_with = "no_follow_symlinks")]
    pub follow_symlinks: bool,

    /// Do not follow symbolic links (overrides config)
    #[arg(long, overrides_with = "follow_symlinks")]
    pub no_follow_symlinks: bool,

    /// Write the effective settings to the config file before scanning
    #[arg(long)]
    pub save_config: bool,
}

/// Arguments for the prune subcommand.
#[derive(Debug, Args)]
pub struct PruneArgs {
    /// Base directory the inventory keys are relative to
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Inventory file (.csv or .json) to prune
    #[arg(short = 'f', long, value_name = "FILE")]
    pub inventory: Option<PathBuf>,
}
