// src/kitchen/variables.rs

//! Build variable resolution
//!
//! Computes the values injected into the build: the release version, the
//! revision of the checked-out source, its branch, the toolchain version
//! and the build timestamp. Every required value must resolve; nothing is
//! ever replaced with a placeholder.

use crate::error::{Error, Result};
use crate::formula::Formula;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Resolved build variables, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BuildVariables {
    values: BTreeMap<String, String>,
}

impl BuildVariables {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, replacing any previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// All variables
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if no variable is set
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, String)> for BuildVariables {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Source of environment-dependent build metadata
///
/// `None` means the value is unavailable; the resolver decides whether that
/// is fatal.
pub trait BuildMetadata {
    /// Short revision identifier of the source tree
    fn commit(&self, source: &Path) -> Option<String>;

    /// Branch of the source tree
    fn branch(&self, source: &Path) -> Option<String>;

    /// Version of the toolchain that will build the formula
    fn toolchain_version(&self, formula: &Formula, source: &Path) -> Option<String>;

    /// Current time
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Metadata read from the host: `git` and the formula's toolchain probe
#[derive(Debug, Clone, Copy, Default)]
pub struct HostMetadata;

impl HostMetadata {
    fn git(&self, source: &Path, args: &[&str]) -> Option<String> {
        let ceiling = source.parent().unwrap_or(source);
        let output = Command::new("git")
            .args(args)
            .current_dir(source)
            // Never pick up a repository enclosing the build directory
            .env("GIT_CEILING_DIRECTORIES", ceiling)
            .output()
            .ok()?;

        if !output.status.success() {
            debug!("git {:?} failed in {}", args, source.display());
            return None;
        }

        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!value.is_empty()).then_some(value)
    }
}

impl BuildMetadata for HostMetadata {
    fn commit(&self, source: &Path) -> Option<String> {
        self.git(source, &["rev-parse", "--short", "HEAD"])
    }

    fn branch(&self, source: &Path) -> Option<String> {
        self.git(source, &["rev-parse", "--abbrev-ref", "HEAD"])
    }

    fn toolchain_version(&self, formula: &Formula, source: &Path) -> Option<String> {
        let (program, args) = formula.build.toolchain.split_first()?;
        let output = Command::new(program)
            .args(args)
            .current_dir(source)
            .output()
            .ok()?;

        if !output.status.success() {
            debug!("Toolchain probe {} exited with {}", program, output.status);
            return None;
        }

        parse_toolchain_version(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Fixed metadata, for reproducible builds and tests
#[derive(Debug, Clone, Default)]
pub struct FixedMetadata {
    pub commit: Option<String>,
    pub branch: Option<String>,
    pub toolchain_version: Option<String>,
    pub now: Option<DateTime<Utc>>,
}

impl BuildMetadata for FixedMetadata {
    fn commit(&self, _source: &Path) -> Option<String> {
        self.commit.clone()
    }

    fn branch(&self, _source: &Path) -> Option<String> {
        self.branch.clone()
    }

    fn toolchain_version(&self, _formula: &Formula, _source: &Path) -> Option<String> {
        self.toolchain_version.clone()
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }
}

/// Pick the version token out of a toolchain's version banner
///
/// `go version go1.22.3 darwin/arm64` → `go1.22.3`,
/// `rustc 1.79.0 (129f3b996 2024-06-10)` → `1.79.0`.
pub fn parse_toolchain_version(output: &str) -> Option<String> {
    let line = output.lines().find(|l| !l.trim().is_empty())?;
    line.split_whitespace()
        .find(|token| token.starts_with("go") && token[2..].starts_with(|c: char| c.is_ascii_digit()))
        .or_else(|| {
            line.split_whitespace()
                .find(|token| token.starts_with(|c: char| c.is_ascii_digit()))
        })
        .or_else(|| {
            line.split_whitespace()
                .find(|token| token.chars().any(|c| c.is_ascii_digit()))
        })
        .map(str::to_string)
}

/// The `[source] commit` pin, provided it was recorded for `version`
fn pinned_commit(formula: &Formula, version: &str) -> Result<String> {
    let pin = formula.source.commit.as_ref().ok_or_else(|| {
        Error::ResolveError(format!(
            "commit of {} is unavailable: source has no VCS metadata and no [source] commit is pinned",
            formula.formula.name
        ))
    })?;

    if pin.version.trim() != version {
        return Err(Error::ResolveError(format!(
            "commit {} is pinned for {} {} but the source is version {}",
            pin.id, formula.formula.name, pin.version, version
        )));
    }

    let id = pin.id.trim();
    if id.is_empty() {
        return Err(Error::ResolveError(format!(
            "commit pin for {} {} is empty",
            formula.formula.name, version
        )));
    }
    Ok(id.to_string())
}

/// Resolves the build variables for one cook
pub struct VariableResolver<'a> {
    metadata: &'a dyn BuildMetadata,
}

impl<'a> VariableResolver<'a> {
    pub fn new(metadata: &'a dyn BuildMetadata) -> Self {
        Self { metadata }
    }

    /// Resolve every variable for `formula` built from `source`
    ///
    /// `build_time` is read once here; all later uses see the same value.
    pub fn resolve(&self, formula: &Formula, source: &Path) -> Result<BuildVariables> {
        let mut vars = BuildVariables::new();

        let version = formula.version().ok_or_else(|| {
            Error::ResolveError(format!(
                "version of {} is not declared and cannot be derived from {}",
                formula.formula.name, formula.source.url
            ))
        })?;
        vars.insert("version", version.clone());

        let commit = match self.metadata.commit(source) {
            Some(commit) => commit,
            None => pinned_commit(formula, &version)?,
        };
        vars.insert("commit", commit);

        let branch = self
            .metadata
            .branch(source)
            .unwrap_or_else(|| "HEAD".to_string());
        vars.insert("branch", branch);

        let toolchain = self
            .metadata
            .toolchain_version(formula, source)
            .ok_or_else(|| {
                let probe = if formula.build.toolchain.is_empty() {
                    "no [build] toolchain probe is declared".to_string()
                } else {
                    format!("probe {:?} gave no version", formula.build.toolchain)
                };
                Error::ResolveError(format!("toolchain version is unavailable: {}", probe))
            })?;
        vars.insert("toolchain_version", toolchain);

        let build_time = self
            .metadata
            .now()
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        vars.insert("build_time", build_time);

        for (name, value) in &formula.variables {
            vars.insert(name.clone(), value.clone());
        }

        debug!("Resolved {} build variables", vars.len());
        Ok(vars)
    }
}
