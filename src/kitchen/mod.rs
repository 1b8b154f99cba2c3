// src/kitchen/mod.rs

//! Kitchen: where formulas are cooked
//!
//! The Kitchen drives one formula through its lifecycle:
//! - Preflight: classify dependencies, check the host, probe build tools
//! - Fetch the source archive and verify its checksum
//! - Unpack the verified archive into a fresh build directory
//! - Resolve build variables and render linker flags
//! - Build, install into the prefix, and smoke-test in a sandbox
//!
//! Every step is recorded in a [`CookReport`]; a failure halts the cook in
//! the phase where it happened.

pub mod archive;
mod config;
mod cook;
pub mod depends;
pub mod flags;
pub mod install;
pub mod procedure;
pub mod report;
pub mod sandbox;
pub mod state;
pub mod variables;

pub use archive::{HttpFetcher, SourceFetcher, SourceTree, VerifiedArchive};
pub use config::KitchenConfig;
pub use cook::Cook;
pub use depends::{DependencyContexts, DependencyProbe, HostCheck, NoopProbe, PathProbe};
pub use install::{InstalledArtifacts, InstalledFile};
pub use procedure::{
    BuildContext, CommandInstall, CommandTest, InstallProcedure, TestContext, TestProcedure,
};
pub use report::{CookReport, Failure};
pub use sandbox::TestOutcome;
pub use state::{CookState, Lifecycle, Phase};
pub use variables::{BuildMetadata, BuildVariables, FixedMetadata, HostMetadata};

use crate::error::Result;
use crate::formula::Formula;
use crate::host::HostPlatform;
use std::path::Path;
use tracing::info;

/// The Kitchen: where formulas are cooked
pub struct Kitchen {
    pub(crate) config: KitchenConfig,
    fetcher: Box<dyn SourceFetcher>,
    metadata: Box<dyn BuildMetadata>,
    probe: Box<dyn DependencyProbe>,
    /// Fixed host description; detected on demand when unset
    host: Option<HostPlatform>,
}

impl Kitchen {
    /// Create a new Kitchen with the given configuration
    ///
    /// Sources are fetched over HTTP, metadata comes from the host and build
    /// tools are looked up on `PATH`.
    pub fn new(config: KitchenConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.user_agent)?;
        Ok(Self {
            config,
            fetcher: Box::new(fetcher),
            metadata: Box::new(HostMetadata),
            probe: Box::new(PathProbe),
            host: None,
        })
    }

    /// Create a Kitchen with default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(KitchenConfig::default())
    }

    /// Replace the source fetcher
    pub fn with_fetcher(mut self, fetcher: impl SourceFetcher + 'static) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    /// Replace the build metadata provider
    pub fn with_metadata(mut self, metadata: impl BuildMetadata + 'static) -> Self {
        self.metadata = Box::new(metadata);
        self
    }

    /// Replace the dependency probe
    pub fn with_probe(mut self, probe: impl DependencyProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    /// Use a fixed host description instead of detecting it
    pub fn with_host(mut self, host: HostPlatform) -> Self {
        self.host = Some(host);
        self
    }

    /// The configuration this Kitchen runs with
    pub fn config(&self) -> &KitchenConfig {
        &self.config
    }

    pub(crate) fn host(&self) -> Result<HostPlatform> {
        match &self.host {
            Some(host) => Ok(host.clone()),
            None => HostPlatform::detect(),
        }
    }

    /// Cook a formula into `prefix` using its own build and test tables
    ///
    /// This is the main entry point for building from source.
    ///
    /// ## Cooking Process
    /// 1. **Preflight** (Init): dependencies and host conditions, no network
    /// 2. **Prep** (Fetching): download and verify the source archive
    /// 3. **Unpack** (Verifying): extract into a fresh build directory
    /// 4. **Season** (Resolving): build variables and linker flags
    /// 5. **Simmer** (Building): run the build command
    /// 6. **Plate** (Installing): copy artifacts into the prefix
    /// 7. **Taste** (Testing): smoke test in a sandbox, when declared
    pub fn cook(&self, formula: &Formula, prefix: &Path) -> CookReport {
        let install = CommandInstall::new(formula);
        let test = CommandTest::new(formula);
        self.cook_with(
            formula,
            &install,
            test.as_ref().map(|t| t as &dyn TestProcedure),
            prefix,
        )
    }

    /// Cook a formula with caller-supplied install and test procedures
    pub fn cook_with(
        &self,
        formula: &Formula,
        install: &dyn InstallProcedure,
        test: Option<&dyn TestProcedure>,
        prefix: &Path,
    ) -> CookReport {
        info!(
            "Cooking {} version {}",
            formula.formula.name,
            formula.pkg_version().as_deref().unwrap_or("?")
        );
        Cook::new(self, formula, prefix, test.is_some()).run(install, test)
    }

    /// Fetch and verify a formula's source without building
    ///
    /// Runs the preflight first, so an unusable host fails before any
    /// download. Useful for warming the source cache.
    pub fn fetch(&self, formula: &Formula) -> Result<VerifiedArchive> {
        info!("Fetching source for {}", formula.formula.name);
        let prefix = self.config.prefix_for(formula);
        let mut cook = Cook::new(self, formula, &prefix, false);
        cook.preflight()?;
        cook.prep()
    }

    /// Resolve build variables and render the linker flags, without building
    pub fn render_flags(&self, formula: &Formula) -> Result<(BuildVariables, Vec<String>)> {
        let prefix = self.config.prefix_for(formula);
        let mut cook = Cook::new(self, formula, &prefix, false);
        cook.preflight()?;
        let archive = cook.prep()?;
        cook.unpack(&archive)?;
        let flags = cook.season()?;
        Ok((cook.variables().clone(), flags))
    }

    /// Check if the formula's source is already in the cache
    pub fn source_cached(&self, formula: &Formula) -> bool {
        self.config
            .source_cache
            .as_ref()
            .map(|dir| dir.join(archive::cache_key(&formula.source.checksum)).is_file())
            .unwrap_or(false)
    }
}
