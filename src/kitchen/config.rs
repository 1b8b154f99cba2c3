// src/kitchen/config.rs

//! Configuration for the Kitchen

use crate::error::{Error, Result};
use crate::formula::Formula;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration for the Kitchen
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KitchenConfig {
    /// Directory for downloaded sources, keyed by checksum (`None` disables caching)
    pub source_cache: Option<PathBuf>,
    /// Parent directory for build directories (system temp dir when unset)
    pub build_root: Option<PathBuf>,
    /// Parent directory for test sandboxes (system temp dir when unset)
    pub sandbox_root: Option<PathBuf>,
    /// Keep build directory after completion (for debugging)
    pub keep_builddir: bool,
    /// Number of parallel jobs
    pub jobs: u32,
    /// Check that build and test tools are on PATH before fetching
    pub probe_dependencies: bool,
    /// User-Agent for source downloads
    pub user_agent: String,
    /// Root under which default prefixes `<name>/<pkg_version>` are created
    pub prefix_root: PathBuf,
}

impl Default for KitchenConfig {
    fn default() -> Self {
        let jobs = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);

        Self {
            source_cache: dirs::cache_dir().map(|d| d.join("kiln").join("sources")),
            build_root: None,
            sandbox_root: None,
            keep_builddir: false,
            jobs,
            probe_dependencies: true,
            user_agent: format!("kiln/{}", env!("CARGO_PKG_VERSION")),
            prefix_root: dirs::data_local_dir()
                .map(|d| d.join("kiln").join("cellar"))
                .unwrap_or_else(|| PathBuf::from("/usr/local/kiln/cellar")),
        }
    }
}

impl KitchenConfig {
    /// Load a configuration file (TOML)
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ParseError(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::ParseError(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Configuration for hermetic, self-contained runs
    ///
    /// No source cache and no dependency probe; used when the caller
    /// provisions the toolchain and wants every fetch to hit the source.
    pub fn isolated() -> Self {
        Self {
            source_cache: None,
            probe_dependencies: false,
            ..Self::default()
        }
    }

    /// Set the source cache directory
    pub fn with_source_cache(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_cache = Some(dir.into());
        self
    }

    /// Set the parent directory for build directories
    pub fn with_build_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.build_root = Some(dir.into());
        self
    }

    /// Set the parent directory for test sandboxes
    pub fn with_sandbox_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sandbox_root = Some(dir.into());
        self
    }

    /// Keep the build directory after the cook
    pub fn with_keep_builddir(mut self, keep: bool) -> Self {
        self.keep_builddir = keep;
        self
    }

    /// Default prefix for a formula: `<prefix_root>/<name>/<pkg_version>`
    pub fn prefix_for(&self, formula: &Formula) -> PathBuf {
        let version = formula
            .pkg_version()
            .unwrap_or_else(|| "unversioned".to_string());
        self.prefix_root.join(&formula.formula.name).join(version)
    }
}
