//! Sift CLI Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Command-line interface for change detection over upstream artifacts.
//!
//! # Overview
//!
//! - **Checking**: run the pipeline for the sources in `sift.yml` (`sift check`)
//! - **Local fingerprints**: hash a directory with inclusion patterns (`sift hash`)
//! - **Filter preview**: list what the patterns select (`sift files`)
//! - **Status**: show stored fingerprints and conditions (`sift status`)

pub mod commands;
pub mod config;
pub mod error;
pub mod manifest;
pub mod state;

// Re-export commonly used types
pub use config::Config;
pub use error::{CliError, Result};
pub use manifest::Manifest;
pub use state::{StateFile, StateStore};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sift - content change detection for upstream artifacts
#[derive(Parser, Debug)]
#[command(name = "sift")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Manifest file [env: SIFT_MANIFEST, default: sift.yml]
    #[arg(long, global = true)]
    pub manifest: Option<PathBuf>,

    /// State file [env: SIFT_STATE_FILE, default: .sift/state.json]
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Print the command reference as Markdown
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline for sources in the manifest
    Check {
        /// Source names to check (defaults to all)
        names: Vec<String>,
    },

    /// Fingerprint the filtered files of a local directory
    Hash {
        /// Directory to fingerprint
        dir: PathBuf,

        #[command(flatten)]
        include: IncludeArgs,

        /// Also print the included files
        #[arg(short, long)]
        list: bool,
    },

    /// List the files of a local directory selected by inclusion patterns
    Files {
        /// Directory to list
        dir: PathBuf,

        #[command(flatten)]
        include: IncludeArgs,
    },

    /// Show stored fingerprints and conditions
    Status,
}

/// Where the inclusion patterns come from
#[derive(clap::Args, Debug, Clone)]
pub struct IncludeArgs {
    /// Inclusion patterns, one per line (defaults to every file)
    #[arg(short, long, conflicts_with = "include_file")]
    pub include: Option<String>,

    /// File holding inclusion patterns
    #[arg(long)]
    pub include_file: Option<PathBuf>,
}

impl IncludeArgs {
    pub fn with_dir(&self, dir: &std::path::Path) -> commands::LocalArgs {
        commands::LocalArgs {
            dir: dir.to_path_buf(),
            include: self.include.clone(),
            include_file: self.include_file.clone(),
        }
    }
}
