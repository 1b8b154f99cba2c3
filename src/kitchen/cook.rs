// src/kitchen/cook.rs

//! Cook: the phase-by-phase execution of a single formula

use crate::error::{Error, Result};
use crate::formula::{Formula, validate_formula};
use crate::kitchen::archive::{SourceTree, VerifiedArchive, extract, fetch_verified};
use crate::kitchen::depends::{self, DependencyContexts, classify, check_host};
use crate::kitchen::flags::{join_flags, render};
use crate::kitchen::install::install_artifacts;
use crate::kitchen::procedure::{BuildContext, InstallProcedure, TestProcedure};
use crate::kitchen::report::{CookReport, Failure};
use crate::kitchen::sandbox::run_test_in;
use crate::kitchen::state::{Lifecycle, Phase};
use crate::kitchen::variables::{BuildVariables, VariableResolver};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use super::Kitchen;

/// A single cook operation
pub struct Cook<'a> {
    kitchen: &'a Kitchen,
    formula: &'a Formula,
    prefix: PathBuf,
    lifecycle: Lifecycle,
    report: CookReport,
    contexts: DependencyContexts,
    /// Temporary build directory, created when the source is unpacked
    build_dir: Option<TempDir>,
    source: Option<SourceTree>,
    variables: BuildVariables,
    flags: Vec<String>,
}

impl<'a> Cook<'a> {
    pub(super) fn new(
        kitchen: &'a Kitchen,
        formula: &'a Formula,
        prefix: &Path,
        has_test: bool,
    ) -> Self {
        Self {
            kitchen,
            formula,
            prefix: prefix.to_path_buf(),
            lifecycle: Lifecycle::new(has_test),
            report: CookReport::new(
                formula.formula.name.clone(),
                formula.pkg_version(),
                prefix.to_path_buf(),
            ),
            contexts: DependencyContexts::default(),
            build_dir: None,
            source: None,
            variables: BuildVariables::new(),
            flags: Vec::new(),
        }
    }

    /// Run every phase, stopping at the first failure
    pub(super) fn run(
        mut self,
        install: &dyn InstallProcedure,
        test: Option<&dyn TestProcedure>,
    ) -> CookReport {
        let result: Result<()> = (|| {
            self.preflight()?;
            let archive = self.prep()?;
            self.unpack(&archive)?;
            self.season()?;
            self.simmer(install)?;
            self.plate(install)?;
            if let Some(test) = test {
                self.taste(test)?;
            }
            self.enter(Phase::Done);
            Ok(())
        })();

        match result {
            Ok(()) => info!("Cooked {} into {}", self.formula.formula.name, self.prefix.display()),
            Err(e) => self.fail(e),
        }
        self.finish()
    }

    /// Init: validate, classify dependencies and check the host, before any network access
    pub(super) fn preflight(&mut self) -> Result<()> {
        // Tests run from inside the sandbox, so a relative prefix would dangle
        self.prefix = std::path::absolute(&self.prefix).map_err(|e| {
            Error::InstallError(format!("prefix {}: {}", self.prefix.display(), e))
        })?;
        self.report.prefix = self.prefix.clone();

        let warnings = validate_formula(self.formula)?;
        for warning in &warnings {
            warn!("{}: {}", self.formula.formula.name, warning);
        }
        self.report.warnings.extend(warnings);

        self.contexts = classify(&self.formula.dependencies);
        self.report.dependencies = Some(self.contexts.clone());

        let host_check = if self.contexts.host_provided.is_empty() {
            Default::default()
        } else {
            let host = self.kitchen.host()?;
            check_host(&self.contexts, &host)?
        };

        if self.kitchen.config.probe_dependencies {
            depends::probe(&self.formula.dependencies, &host_check, self.kitchen.probe.as_ref())?;
        }
        self.report.host = Some(host_check);
        Ok(())
    }

    /// Fetching: retrieve the source and verify its checksum
    pub(super) fn prep(&mut self) -> Result<VerifiedArchive> {
        self.enter(Phase::Fetching);
        let formula = self.formula;
        let source = &formula.source;
        let archive = fetch_verified(
            self.kitchen.fetcher.as_ref(),
            &source.url,
            &source.checksum,
            self.kitchen.config.source_cache.as_deref(),
        )?;
        self.log_line(&format!("Fetched source: {}", source.url));
        Ok(archive)
    }

    /// Verifying: unpack the verified payload into a fresh build directory
    pub(super) fn unpack(&mut self, archive: &VerifiedArchive) -> Result<()> {
        self.enter(Phase::Verifying);

        let mut builder = tempfile::Builder::new();
        builder.prefix("kiln-build-");
        let build_dir = match &self.kitchen.config.build_root {
            Some(root) => std::fs::create_dir_all(root).and_then(|_| builder.tempdir_in(root)),
            None => builder.tempdir(),
        }
        .map_err(|e| Error::ExtractionError(format!("Failed to create build directory: {e}")))?;

        let tree = extract(archive, &build_dir.path().join("source"))?;
        let files = WalkDir::new(&tree.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .count();
        self.log_line(&format!(
            "Extracted {} entries to {}",
            tree.entries,
            tree.root.display()
        ));
        debug!("Source tree has {} files", files);

        self.report.source_files = Some(files);
        self.build_dir = Some(build_dir);
        self.source = Some(tree);
        Ok(())
    }

    /// Resolving: compute build variables and render the flag list
    pub(super) fn season(&mut self) -> Result<Vec<String>> {
        self.enter(Phase::Resolving);
        let source_root = self.source_root()?;

        let resolver = VariableResolver::new(self.kitchen.metadata.as_ref());
        self.variables = resolver.resolve(self.formula, &source_root)?;
        self.report.variables = Some(self.variables.clone());

        self.flags = render(&self.formula.build.flags, &self.variables)?;
        self.report.flags = self.flags.clone();
        info!("Flags: {}", join_flags(&self.flags));
        Ok(self.flags.clone())
    }

    /// Building: run the install procedure's build
    pub(super) fn simmer(&mut self, install: &dyn InstallProcedure) -> Result<()> {
        self.enter(Phase::Building);
        let ctx = self.build_context()?;
        if !ctx.workdir.is_dir() {
            return Err(Error::BuildError(format!(
                "build workdir {} does not exist",
                ctx.workdir.display()
            )));
        }

        let log = install.build(&ctx)?;
        self.report.log.push_str(&log);
        Ok(())
    }

    /// Installing: place the artifacts into the prefix
    pub(super) fn plate(&mut self, install: &dyn InstallProcedure) -> Result<()> {
        self.enter(Phase::Installing);
        let ctx = self.build_context()?;
        let specs = install.artifacts(&ctx);

        let installed = install_artifacts(&ctx.workdir, &self.prefix, &specs)?;
        self.log_line(&format!(
            "Installed {} files into {}",
            installed.files.len(),
            self.prefix.display()
        ));
        self.report.installed = Some(installed);
        Ok(())
    }

    /// Testing: run the smoke test in a sandbox; a failure keeps the install
    pub(super) fn taste(&mut self, test: &dyn TestProcedure) -> Result<()> {
        self.enter(Phase::Testing);
        let outcome = run_test_in(
            test,
            &self.prefix,
            self.kitchen.config.sandbox_root.as_deref(),
        )?;
        self.report.test = Some(outcome.clone());
        outcome.into_result()
    }

    /// Variables resolved so far
    pub(super) fn variables(&self) -> &BuildVariables {
        &self.variables
    }

    fn build_context(&self) -> Result<BuildContext> {
        let source_dir = self.source_root()?;
        let build = &self.formula.build;
        let workdir = match &build.workdir {
            Some(dir) => source_dir.join(dir),
            None => source_dir.clone(),
        };
        let ldflags = join_flags(&self.flags);

        let mut ctx = BuildContext {
            source_dir,
            workdir,
            output: build.output.clone(),
            flags: self.flags.clone(),
            ldflags,
            environment: Default::default(),
            dependencies: self.contexts.build.clone(),
            variables: self.variables.clone(),
            jobs: build.jobs.unwrap_or(self.kitchen.config.jobs),
            prefix: self.prefix.clone(),
        };

        let substitutions = ctx.substitutions();
        ctx.environment = build
            .environment
            .iter()
            .map(|(key, value)| (key.clone(), self.formula.substitute(value, &substitutions)))
            .collect();
        Ok(ctx)
    }

    fn source_root(&self) -> Result<PathBuf> {
        self.source
            .as_ref()
            .map(|tree| tree.root.clone())
            .ok_or_else(|| Error::ExtractionError("source tree is not available".to_string()))
    }

    fn enter(&mut self, phase: Phase) {
        let advanced = self.lifecycle.advance(phase);
        debug_assert!(advanced, "illegal transition to {}", phase);
        debug!("{}: entering {}", self.formula.formula.name, phase);
    }

    fn fail(&mut self, e: Error) {
        let phase = self.lifecycle.phase();
        error!("{} failed in {}: {}", self.formula.formula.name, phase, e);
        self.lifecycle.fail(e.kind());
        self.report.failure = Some(Failure::new(phase, &e));
    }

    fn finish(mut self) -> CookReport {
        if let Some(build_dir) = self.build_dir.take() {
            if self.kitchen.config.keep_builddir {
                let kept = build_dir.keep();
                info!("Keeping build directory: {}", kept.display());
                self.report
                    .warnings
                    .push(format!("Build directory kept at {}", kept.display()));
            } else if let Err(e) = build_dir.close() {
                warn!("Failed to remove build directory: {}", e);
            }
        }

        self.report.trail = self.lifecycle.into_trail();
        self.report.finished_at = Some(Utc::now());
        self.report
    }

    fn log_line(&mut self, line: &str) {
        self.report.log.push_str(line);
        self.report.log.push('\n');
    }
}
