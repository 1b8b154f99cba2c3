// src/commands/cook.rs

//! Cook command - build and install a formula

use super::{apply_source_options, load_config, load_formula};
use crate::cli::SourceOptions;
use anyhow::{Context, Result};
use kiln::Kitchen;
use std::path::{Path, PathBuf};
use tracing::info;

/// Cook a formula
///
/// Returns the process exit code: 0 when the cook reached `Done`,
/// otherwise the code of the failure kind.
pub fn cmd_cook(
    config_path: Option<&Path>,
    formula_path: &Path,
    prefix: Option<PathBuf>,
    source: &SourceOptions,
    jobs: Option<u32>,
    keep_builddir: bool,
    json: bool,
) -> Result<i32> {
    let formula = load_formula(formula_path)?;

    let mut config = load_config(config_path)?;
    apply_source_options(&mut config, source);
    if let Some(j) = jobs {
        config.jobs = j;
    }
    config.keep_builddir = keep_builddir;

    let prefix = prefix.unwrap_or_else(|| config.prefix_for(&formula));
    let kitchen = Kitchen::new(config).context("Failed to set up the kitchen")?;

    if !json {
        println!(
            "Cooking {} {} into {}",
            formula.formula.name,
            formula.pkg_version().unwrap_or_default(),
            prefix.display()
        );
        if kitchen.source_cached(&formula) {
            println!("  - Source already cached");
        }
    }

    let report = kitchen.cook(&formula, &prefix);

    if json {
        println!("{}", report.to_json().context("Failed to serialize report")?);
    } else {
        println!("\n{}", report);
    }

    if report.succeeded() {
        info!("Successfully cooked {} into {}", formula.formula.name, prefix.display());
    }
    Ok(report.exit_code())
}

/// Fetch and verify a formula's source only
pub fn cmd_fetch(
    config_path: Option<&Path>,
    formula_path: &Path,
    source: &SourceOptions,
) -> Result<()> {
    let formula = load_formula(formula_path)?;
    let mut config = load_config(config_path)?;
    apply_source_options(&mut config, source);

    let kitchen = Kitchen::new(config).context("Failed to set up the kitchen")?;
    let archive = kitchen
        .fetch(&formula)
        .with_context(|| format!("Failed to fetch source for {}", formula.formula.name))?;

    println!(
        "[OK] {} ({} bytes, {})",
        formula.source.url,
        archive.bytes().len(),
        archive.digest()
    );
    if kitchen.source_cached(&formula) {
        println!("[OK] Source is cached. Ready for offline build.");
    }
    Ok(())
}
