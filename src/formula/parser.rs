// src/formula/parser.rs

//! Formula file parsing and validation

use crate::error::{Error, Result};
use crate::formula::format::{BUILTIN_VARIABLES, Formula, Provenance};
use crate::checksum::Checksum;
use crate::kitchen::install::check_destination;
use crate::version::OsVersion;
use std::path::{Component, Path};

/// Parse a formula from a TOML string
pub fn parse_formula(content: &str) -> Result<Formula> {
    toml::from_str(content).map_err(|e| Error::ParseError(format!("Invalid formula: {}", e)))
}

/// Parse a formula from a file
pub fn parse_formula_file(path: &Path) -> Result<Formula> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::ParseError(format!("Failed to read formula file {}: {}", path.display(), e))
    })?;

    parse_formula(&content)
}

/// Validate a formula for completeness and correctness
///
/// Structural problems are errors; missing descriptive metadata and
/// suspicious but legal declarations come back as warnings.
pub fn validate_formula(formula: &Formula) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    if formula.formula.name.trim().is_empty() {
        return Err(Error::ParseError("Formula name cannot be empty".to_string()));
    }
    if formula.version().is_none() {
        return Err(Error::ParseError(format!(
            "Formula {} declares no version and none can be derived from {}",
            formula.formula.name, formula.source.url
        )));
    }

    formula.source.checksum.parse::<Checksum>().map_err(|e| {
        Error::ParseError(format!("Invalid checksum '{}': {}", formula.source.checksum, e))
    })?;

    if formula.build.command.is_empty() {
        return Err(Error::ParseError("Build command cannot be empty".to_string()));
    }
    if formula.build.output.trim().is_empty() {
        return Err(Error::ParseError("Build output name cannot be empty".to_string()));
    }

    if let Some(workdir) = &formula.build.workdir
        && Path::new(workdir)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(Error::ParseError(format!(
            "Build workdir '{}' must stay inside the source tree",
            workdir
        )));
    }

    for name in formula.variables.keys() {
        if BUILTIN_VARIABLES.contains(&name.as_str()) {
            return Err(Error::ParseError(format!(
                "[variables] may not redefine built-in variable '{}'",
                name
            )));
        }
    }

    for entry in &formula.build.flags {
        let known = BUILTIN_VARIABLES.contains(&entry.variable.as_str())
            || formula.variables.contains_key(&entry.variable);
        if !known {
            return Err(Error::TemplateError(format!(
                "flag for {} references unknown variable '{}'",
                entry.symbol, entry.variable
            )));
        }
    }

    for dep in &formula.dependencies {
        if dep.contexts.is_empty() {
            return Err(Error::ParseError(format!(
                "Dependency {} declares no contexts",
                dep.name
            )));
        }
        if let Some(condition) = &dep.host {
            OsVersion::parse(&condition.since).map_err(|e| {
                Error::ParseError(format!("Dependency {}: {}", dep.name, e))
            })?;
        }
        if dep.provenance == Provenance::Host && dep.effective_provenance() == Provenance::Formula {
            warnings.push(format!(
                "Dependency {} is host-provided without a host condition; it will be built",
                dep.name
            ));
        }
    }

    let artifacts = formula.install.artifact_specs();
    if artifacts.is_empty() {
        warnings.push("No install artifacts declared".to_string());
    }
    for artifact in &artifacts {
        check_destination(&artifact.dest).map_err(|e| Error::ParseError(e.to_string()))?;
    }

    if formula.formula.description.is_none() {
        warnings.push("Missing formula description".to_string());
    }
    if formula.formula.license.is_none() {
        warnings.push("Missing formula license".to_string());
    }
    if formula.formula.homepage.is_none() {
        warnings.push("Missing formula homepage".to_string());
    }

    match &formula.test {
        None => warnings.push("No test procedure declared".to_string()),
        Some(test) if test.stub => {
            warnings.push("Test procedure is a declared stub and will always fail".to_string())
        }
        Some(test) if test.commands.is_empty() => {
            return Err(Error::ParseError("Test section declares no commands".to_string()));
        }
        Some(_) => {}
    }

    Ok(warnings)
}
