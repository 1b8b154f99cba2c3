// src/kitchen/procedure.rs

//! Install and test strategies
//!
//! The Kitchen drives a cook through [`InstallProcedure`] and
//! [`TestProcedure`]. [`CommandInstall`] and [`CommandTest`] implement them
//! from a formula's `[build]`, `[install]` and `[test]` tables; callers may
//! supply their own.

use crate::error::{Error, Result};
use crate::formula::{ArtifactMode, ArtifactSpec, Formula, TestSection};
use crate::kitchen::variables::BuildVariables;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Everything a build needs, passed explicitly
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Root of the extracted source tree
    pub source_dir: PathBuf,
    /// Directory the build tool runs in
    pub workdir: PathBuf,
    /// Name of the file the build produces
    pub output: String,
    /// Rendered linker flags
    pub flags: Vec<String>,
    /// Flags joined into one string
    pub ldflags: String,
    /// Environment for the build tool
    pub environment: BTreeMap<String, String>,
    /// Build-context dependencies
    pub dependencies: Vec<String>,
    /// Resolved build variables
    pub variables: BuildVariables,
    /// Parallel jobs
    pub jobs: u32,
    /// Installation prefix
    pub prefix: PathBuf,
}

impl BuildContext {
    /// Values available as `%(name)s` in build commands
    pub fn substitutions(&self) -> BTreeMap<String, String> {
        let mut values = self.variables.as_map().clone();
        values.insert("ldflags".to_string(), self.ldflags.clone());
        values.insert("output".to_string(), self.output.clone());
        values.insert("jobs".to_string(), self.jobs.to_string());
        values.insert("prefix".to_string(), self.prefix.display().to_string());
        values
    }
}

/// Builds the formula and names the artifacts to install
pub trait InstallProcedure {
    /// Run the build, returning its log
    fn build(&self, ctx: &BuildContext) -> Result<String>;

    /// Artifacts to place into the prefix, relative to `ctx.workdir`
    fn artifacts(&self, ctx: &BuildContext) -> Vec<ArtifactSpec>;
}

/// Paths a smoke test may use
#[derive(Debug, Clone)]
pub struct TestContext {
    /// Sandbox directory the test runs in
    pub workdir: PathBuf,
    /// Installation prefix under test
    pub prefix: PathBuf,
}

impl TestContext {
    /// Directory holding the installed executables
    pub fn bin(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    /// Values available as `%(name)s` in test commands
    pub fn substitutions(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("prefix".to_string(), self.prefix.display().to_string()),
            ("bin".to_string(), self.bin().display().to_string()),
            ("testpath".to_string(), self.workdir.display().to_string()),
        ])
    }
}

/// Smoke-tests an installation
pub trait TestProcedure {
    /// Whether this procedure is a declared placeholder that always fails
    fn is_stub(&self) -> bool {
        false
    }

    /// Run the test, returning its output
    ///
    /// Implementations must use `ctx.workdir` as their working directory
    /// and must not change the process working directory.
    fn run(&self, ctx: &TestContext) -> Result<String>;
}

/// Install procedure backed by the formula's `[build]` and `[install]` tables
pub struct CommandInstall<'a> {
    formula: &'a Formula,
}

impl<'a> CommandInstall<'a> {
    pub fn new(formula: &'a Formula) -> Self {
        Self { formula }
    }
}

impl InstallProcedure for CommandInstall<'_> {
    fn build(&self, ctx: &BuildContext) -> Result<String> {
        let substitutions = ctx.substitutions();
        let argv: Vec<String> = self
            .formula
            .build
            .command
            .iter()
            .map(|arg| self.formula.substitute(arg, &substitutions))
            .collect();

        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::BuildError("build command is empty".to_string()))?;

        info!("Running build: {}", program);
        debug!("Command: {:?}", argv);

        let output = Command::new(program)
            .args(args)
            .current_dir(&ctx.workdir)
            .envs(&ctx.environment)
            .output()
            .map_err(|e| Error::BuildError(format!("Failed to run {}: {}", program, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let log = command_log("build", &argv, &stdout, &stderr);

        if !output.status.success() {
            return Err(Error::BuildError(format!(
                "{} exited with {:?}\nstderr: {}",
                program,
                output.status.code(),
                stderr.trim()
            )));
        }

        Ok(log)
    }

    fn artifacts(&self, ctx: &BuildContext) -> Vec<ArtifactSpec> {
        let specs = self.formula.install.artifact_specs();
        if !specs.is_empty() {
            return specs;
        }
        // Nothing declared: install the build output as an executable
        vec![ArtifactSpec {
            path: ctx.output.clone(),
            dest: format!("bin/{}", ctx.output),
            mode: ArtifactMode::Executable,
        }]
    }
}

/// Test procedure backed by the formula's `[test]` table
pub struct CommandTest<'a> {
    formula: &'a Formula,
    section: &'a TestSection,
}

impl<'a> CommandTest<'a> {
    /// Returns `None` when the formula declares no test
    pub fn new(formula: &'a Formula) -> Option<Self> {
        formula
            .test
            .as_ref()
            .map(|section| Self { formula, section })
    }

    fn failure(&self, reason: String) -> Error {
        Error::TestFailure {
            reason,
            stub: self.section.stub,
        }
    }
}

impl TestProcedure for CommandTest<'_> {
    fn is_stub(&self) -> bool {
        self.section.stub
    }

    fn run(&self, ctx: &TestContext) -> Result<String> {
        if self.section.commands.is_empty() {
            return Err(self.failure("no test commands declared".to_string()));
        }

        let substitutions = ctx.substitutions();
        let path = match std::env::var_os("PATH") {
            Some(existing) => {
                let mut dirs = vec![ctx.bin()];
                dirs.extend(std::env::split_paths(&existing));
                std::env::join_paths(dirs).map_err(|e| self.failure(e.to_string()))?
            }
            None => ctx.bin().into_os_string(),
        };

        let mut log = String::new();
        let mut last_stdout = String::new();

        for command in &self.section.commands {
            let argv: Vec<String> = command
                .iter()
                .map(|arg| self.formula.substitute(arg, &substitutions))
                .collect();
            let Some((program, args)) = argv.split_first() else {
                return Err(self.failure("empty test command".to_string()));
            };

            debug!("Test command: {:?}", argv);
            let output = Command::new(program)
                .args(args)
                .current_dir(&ctx.workdir)
                .env("HOME", &ctx.workdir)
                .env("PATH", &path)
                .output()
                .map_err(|e| self.failure(format!("failed to run {}: {}", program, e)))?;

            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            let stderr = String::from_utf8_lossy(&output.stderr);
            log.push_str(&command_log("test", &argv, &stdout, &stderr));

            if !output.status.success() {
                return Err(self.failure(format!(
                    "{} exited with {:?}",
                    argv.join(" "),
                    output.status.code()
                )));
            }
            last_stdout = stdout;
        }

        if let Some(expected) = &self.section.expect_output
            && !last_stdout.contains(expected.as_str())
        {
            return Err(self.failure(format!("output does not contain '{}'", expected)));
        }

        Ok(log)
    }
}

fn command_log(phase: &str, argv: &[String], stdout: &str, stderr: &str) -> String {
    let mut log = format!("=== {} ===\n$ {}\n", phase, argv.join(" "));
    for stream in [stdout, stderr] {
        if !stream.is_empty() {
            log.push_str(stream);
            if !stream.ends_with('\n') {
                log.push('\n');
            }
        }
    }
    log
}

/// Convenience for running a test procedure outside a sandbox, in `dir`
pub fn test_context(dir: &Path, prefix: &Path) -> TestContext {
    TestContext {
        workdir: dir.to_path_buf(),
        prefix: prefix.to_path_buf(),
    }
}
