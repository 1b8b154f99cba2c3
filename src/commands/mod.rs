// src/commands/mod.rs
//! Command handlers for the kiln CLI

mod cook;
mod inspect;

pub use cook::{cmd_cook, cmd_fetch};
pub use inspect::{cmd_deps, cmd_flags, cmd_validate};

use crate::cli::SourceOptions;
use anyhow::{Context, Result};
use kiln::{Formula, KitchenConfig, parse_formula_file};
use std::path::Path;

/// Load the kitchen configuration, from a file when one is given
pub fn load_config(path: Option<&Path>) -> Result<KitchenConfig> {
    match path {
        Some(path) => KitchenConfig::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => Ok(KitchenConfig::default()),
    }
}

/// Apply source-related command-line overrides
pub fn apply_source_options(config: &mut KitchenConfig, options: &SourceOptions) {
    if options.no_cache {
        config.source_cache = None;
    } else if let Some(dir) = &options.source_cache {
        config.source_cache = Some(dir.clone());
    }
    if options.no_probe {
        config.probe_dependencies = false;
    }
}

/// Read a formula file
pub fn load_formula(path: &Path) -> Result<Formula> {
    parse_formula_file(path).with_context(|| format!("Failed to parse formula: {}", path.display()))
}
