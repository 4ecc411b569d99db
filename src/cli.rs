// src/cli.rs
//! CLI definitions for formulary
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "formulary")]
#[command(author = "Formulary Contributors")]
#[command(version)]
#[command(about = "Fetch, verify, build and install packages from declarative formulas", long_about = None)]
pub struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a formula and install it under a prefix
    Install {
        /// Path to the formula file
        formula: String,

        /// Install root directory
        #[arg(short, long)]
        prefix: String,

        /// Build in this directory (must be empty) instead of a temporary one
        #[arg(long)]
        build_root: Option<String>,

        /// Keep the run workspace after completion (for debugging)
        #[arg(long)]
        keep_build_root: bool,

        /// Directory for caching verified source archives
        #[arg(long)]
        source_cache: Option<String>,

        /// Execution path for build tools (default: inherit PATH)
        #[arg(long)]
        path: Option<String>,

        /// Timeout for each build command, in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Skip the post-install self-test
        #[arg(long)]
        skip_test: bool,
    },

    /// Fetch and verify a formula's source archive
    Fetch {
        /// Path to the formula file
        formula: String,

        /// Directory to place the archive in
        #[arg(short, long, default_value = ".")]
        dest: String,

        /// Directory for caching verified source archives
        #[arg(long)]
        source_cache: Option<String>,
    },

    /// Check a formula for errors and print warnings
    Validate {
        /// Path to the formula file
        formula: String,
    },

    /// Run a formula's self-test against an existing install
    Test {
        /// Path to the formula file
        formula: String,

        /// Install root the formula was installed into
        #[arg(short, long)]
        prefix: String,
    },

    /// Print the checksum of a local file, for pinning in a formula
    Checksum {
        /// File to hash
        file: String,

        /// Hash algorithm
        #[arg(short, long, default_value = "sha256",
              value_parser = ["sha256", "sha512", "sha1", "xxh128"])]
        algorithm: String,
    },

    /// Show formula metadata
    Show {
        /// Path to the formula file
        formula: String,
    },
}
