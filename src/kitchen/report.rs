// src/kitchen/report.rs

//! Outcome of a cook, for printing and for machine consumption

use crate::error::{Error, ErrorKind};
use crate::kitchen::depends::{DependencyContexts, HostCheck};
use crate::kitchen::install::InstalledArtifacts;
use crate::kitchen::sandbox::TestOutcome;
use crate::kitchen::state::{CookState, Phase};
use crate::kitchen::variables::BuildVariables;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Where and why a cook halted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub phase: Phase,
    pub kind: ErrorKind,
    pub message: String,
}

impl Failure {
    pub fn new(phase: Phase, error: &Error) -> Self {
        Self {
            phase,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Everything observed while cooking one formula
#[derive(Debug, Clone, Serialize)]
pub struct CookReport {
    pub formula: String,
    pub version: Option<String>,
    pub prefix: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Every state passed through, ending in `Done` or `Failed`
    pub trail: Vec<CookState>,
    pub dependencies: Option<DependencyContexts>,
    pub host: Option<HostCheck>,
    /// Files in the extracted source tree
    pub source_files: Option<usize>,
    pub variables: Option<BuildVariables>,
    pub flags: Vec<String>,
    pub installed: Option<InstalledArtifacts>,
    pub test: Option<TestOutcome>,
    pub failure: Option<Failure>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub log: String,
}

impl CookReport {
    pub fn new(formula: impl Into<String>, version: Option<String>, prefix: PathBuf) -> Self {
        Self {
            formula: formula.into(),
            version,
            prefix,
            started_at: Utc::now(),
            finished_at: None,
            trail: vec![CookState::At(Phase::Init)],
            dependencies: None,
            host: None,
            source_files: None,
            variables: None,
            flags: Vec::new(),
            installed: None,
            test: None,
            failure: None,
            warnings: Vec::new(),
            log: String::new(),
        }
    }

    /// Final state
    pub fn state(&self) -> CookState {
        self.trail
            .last()
            .copied()
            .unwrap_or(CookState::At(Phase::Init))
    }

    /// True only when the cook reached `Done`
    pub fn succeeded(&self) -> bool {
        self.state() == CookState::At(Phase::Done)
    }

    /// Process exit status: 0 for `Done`, the failure kind's code otherwise
    pub fn exit_code(&self) -> i32 {
        match (&self.failure, self.succeeded()) {
            (Some(failure), _) => failure.kind.exit_code(),
            (None, true) => 0,
            // Halted without a recorded failure; should not happen
            (None, false) => 1,
        }
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        let name = match &self.version {
            Some(version) => format!("{} {}", self.formula, version),
            None => self.formula.clone(),
        };
        match &self.failure {
            None if self.succeeded() => {
                format!("{}: cooked into {}", name, self.prefix.display())
            }
            None => format!("{}: halted in {}", name, self.state()),
            Some(failure) if failure.kind == ErrorKind::TestFailure => format!(
                "{}: installed into {}, but the smoke test did not pass ({})",
                name,
                self.prefix.display(),
                failure.message
            ),
            Some(failure) => format!(
                "{}: {} during {}: {}",
                name, failure.kind, failure.phase, failure.message
            ),
        }
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for CookReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;

        let trail: Vec<String> = self.trail.iter().map(|s| s.to_string()).collect();
        writeln!(f, "  Phases: {}", trail.join(" -> "))?;

        if let Some(deps) = &self.dependencies {
            if !deps.build.is_empty() {
                writeln!(f, "  Build dependencies: {}", deps.build.join(", "))?;
            }
            if !deps.test.is_empty() {
                writeln!(f, "  Test dependencies: {}", deps.test.join(", "))?;
            }
            if !deps.runtime.is_empty() {
                writeln!(f, "  Runtime dependencies: {}", deps.runtime.join(", "))?;
            }
        }

        if let Some(vars) = &self.variables {
            writeln!(f, "  Variables:")?;
            for (name, value) in vars.as_map() {
                writeln!(f, "    {} = {}", name, value)?;
            }
        }

        if !self.flags.is_empty() {
            writeln!(f, "  Flags: {}", self.flags.join(" "))?;
        }

        if let Some(installed) = &self.installed {
            writeln!(f, "  Installed:")?;
            for file in &installed.files {
                writeln!(f, "    {} ({})", file.path.display(), file.mode)?;
            }
        }

        if let Some(test) = &self.test {
            writeln!(f, "  Test: {}", test)?;
        }

        for warning in &self.warnings {
            writeln!(f, "  Warning: {}", warning)?;
        }

        if let Some(failure) = &self.failure {
            write!(f, "  FAILED in {}: {}", failure.phase, failure.kind)?;
        }

        Ok(())
    }
}
