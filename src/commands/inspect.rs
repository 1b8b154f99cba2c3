// src/commands/inspect.rs

//! Commands that inspect a formula without installing it

use super::{apply_source_options, load_config, load_formula};
use crate::cli::SourceOptions;
use anyhow::{Context, Result};
use kiln::host::HostPlatform;
use kiln::kitchen::depends::{check_host, classify};
use kiln::{Kitchen, validate_formula};
use serde_json::json;
use std::path::Path;

/// Validate a formula and print its warnings
pub fn cmd_validate(formula_path: &Path) -> Result<()> {
    let formula = load_formula(formula_path)?;
    let warnings = validate_formula(&formula).context("Formula validation failed")?;

    println!(
        "Formula: {} {}",
        formula.formula.name,
        formula.pkg_version().unwrap_or_default()
    );
    for warning in &warnings {
        println!("Warning: {}", warning);
    }

    if warnings.is_empty() {
        println!("[OK] No issues found");
    } else {
        println!("[OK] {} warning(s)", warnings.len());
    }
    Ok(())
}

/// Show dependency classification and host decisions
pub fn cmd_deps(formula_path: &Path, json: bool) -> Result<()> {
    let formula = load_formula(formula_path)?;
    let contexts = classify(&formula.dependencies);

    let host_check = if contexts.host_provided.is_empty() {
        None
    } else {
        let host = HostPlatform::detect().context("Failed to detect host platform")?;
        Some(check_host(&contexts, &host).context("Host check failed")?)
    };

    if json {
        let value = json!({ "contexts": contexts, "host": host_check });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Dependencies of {}:", formula.formula.name);
    println!("  build:   {}", contexts.build.join(", "));
    println!("  test:    {}", contexts.test.join(", "));
    println!("  runtime: {}", contexts.runtime.join(", "));
    for requirement in &contexts.host_provided {
        println!(
            "  host:    {} ({} >= {})",
            requirement.name, requirement.condition.os, requirement.condition.since
        );
    }
    if let Some(check) = host_check {
        for name in &check.satisfied {
            println!("  [OK] {} provided by the host", name);
        }
        for name in &check.must_build {
            println!("  [BUILD] {} must be built on this host", name);
        }
    }
    Ok(())
}

/// Resolve build variables and print the rendered flags
pub fn cmd_flags(
    config_path: Option<&Path>,
    formula_path: &Path,
    source: &SourceOptions,
    json: bool,
) -> Result<()> {
    let formula = load_formula(formula_path)?;
    let mut config = load_config(config_path)?;
    apply_source_options(&mut config, source);

    let kitchen = Kitchen::new(config).context("Failed to set up the kitchen")?;
    let (variables, flags) = kitchen
        .render_flags(&formula)
        .with_context(|| format!("Failed to render flags for {}", formula.formula.name))?;

    if json {
        let value = json!({ "variables": variables, "flags": flags });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for (name, value) in variables.as_map() {
        println!("{} = {}", name, value);
    }
    println!("\n{}", kiln::kitchen::flags::join_flags(&flags));
    Ok(())
}
