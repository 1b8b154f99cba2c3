// src/cli/mod.rs
//! CLI definitions for kiln
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! - `cook` - Fetch, build, install and test a formula
//! - `fetch` - Download and verify a formula's source only
//! - `flags` - Show the resolved build variables and linker flags
//! - `deps` - Show how a formula's dependencies are classified on this host
//! - `validate` - Check a formula without touching the network

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(version)]
#[command(about = "Declarative build-recipe execution engine", long_about = None)]
pub struct Cli {
    /// Kitchen configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by commands that fetch sources
#[derive(Args, Debug, Clone, Default)]
pub struct SourceOptions {
    /// Directory for caching downloaded sources
    #[arg(long)]
    pub source_cache: Option<PathBuf>,

    /// Do not read or write the source cache
    #[arg(long, conflicts_with = "source_cache")]
    pub no_cache: bool,

    /// Skip the PATH check for build and test dependencies
    #[arg(long)]
    pub no_probe: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch, build, install and smoke-test a formula
    Cook {
        /// Path to the formula file
        formula: PathBuf,

        /// Installation prefix (default: <prefix_root>/<name>/<version>)
        #[arg(short, long)]
        prefix: Option<PathBuf>,

        #[command(flatten)]
        source: SourceOptions,

        /// Number of parallel build jobs
        #[arg(short, long)]
        jobs: Option<u32>,

        /// Keep the build directory after completion
        #[arg(long)]
        keep_builddir: bool,

        /// Print the cook report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download and verify a formula's source without building
    Fetch {
        /// Path to the formula file
        formula: PathBuf,

        #[command(flatten)]
        source: SourceOptions,
    },

    /// Resolve build variables and print the rendered linker flags
    Flags {
        /// Path to the formula file
        formula: PathBuf,

        #[command(flatten)]
        source: SourceOptions,

        /// Print variables and flags as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show dependency contexts and host-provided decisions
    Deps {
        /// Path to the formula file
        formula: PathBuf,

        /// Print the classification as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a formula
    Validate {
        /// Path to the formula file
        formula: PathBuf,
    },
}
