// src/formula/format.rs

//! Formula file format definitions
//!
//! Formulas are TOML files that describe how to obtain, build, install and
//! smoke-test one versioned artifact. They are read once at startup and
//! never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{AsRefStr, Display};

/// Names the Kitchen resolves itself; `[variables]` may not shadow them
pub const BUILTIN_VARIABLES: &[&str] = &[
    "version",
    "commit",
    "branch",
    "toolchain_version",
    "build_time",
];

/// A complete formula
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    /// Identity and descriptive metadata
    pub formula: FormulaSection,

    /// Canonical source archive
    pub source: SourceSection,

    /// Declared dependencies, in declaration order
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,

    /// Build instructions
    pub build: BuildSection,

    /// Artifacts to place into the prefix
    #[serde(default)]
    pub install: InstallSection,

    /// Smoke test run against the installed prefix (optional)
    #[serde(default)]
    pub test: Option<TestSection>,

    /// Static variables for substitution and flag templates
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl Formula {
    /// The declared version, or the one derived from the source URL
    pub fn version(&self) -> Option<String> {
        self.formula
            .version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .or_else(|| version_from_url(&self.source.url))
    }

    /// Version including the revision suffix (`0.6.40_1`)
    pub fn pkg_version(&self) -> Option<String> {
        let version = self.version()?;
        Some(match self.formula.revision {
            Some(revision) if revision > 0 => format!("{}_{}", version, revision),
            _ => version,
        })
    }

    /// Substitute variables in a string
    ///
    /// Replaces `%(name)s` patterns with their values from:
    /// 1. Built-in values (`name`, `version`)
    /// 2. The supplied `extra` values (ldflags, output, prefix, ...)
    /// 3. Custom variables from the [variables] section
    pub fn substitute(&self, template: &str, extra: &BTreeMap<String, String>) -> String {
        let mut result = template.replace("%(name)s", &self.formula.name);

        if let Some(version) = self.version() {
            result = result.replace("%(version)s", &version);
        }

        for (key, value) in extra.iter().chain(self.variables.iter()) {
            result = result.replace(&format!("%({})s", key), value);
        }

        result
    }
}

/// Derive a version from a source URL
///
/// Looks at the last path segment, strips archive extensions and any
/// `name-` prefix, and drops a leading `v`:
/// - `.../archive/refs/tags/0.6.40.tar.gz` → `0.6.40`
/// - `.../nginx-1.24.0.tar.gz` → `1.24.0`
/// - `.../v2.1.tar.xz` → `2.1`
pub fn version_from_url(url: &str) -> Option<String> {
    const EXTENSIONS: &[&str] = &[
        ".tar.gz", ".tgz", ".tar.xz", ".txz", ".tar.bz2", ".tbz2", ".tar.zst", ".tar", ".zip",
    ];

    let segment = url.split(['?', '#']).next()?.trim_end_matches('/').rsplit('/').next()?;
    let stem = EXTENSIONS
        .iter()
        .find_map(|ext| segment.strip_suffix(ext))
        .unwrap_or(segment);

    let candidate = match stem.rfind('-') {
        Some(pos) => &stem[pos + 1..],
        None => stem,
    };
    let candidate = candidate
        .strip_prefix('v')
        .or_else(|| candidate.strip_prefix('V'))
        .unwrap_or(candidate);

    candidate
        .starts_with(|c: char| c.is_ascii_digit())
        .then(|| candidate.to_string())
}

/// Formula identity section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaSection {
    /// Formula name
    pub name: String,

    /// Version; derived from the source URL when omitted
    #[serde(default)]
    pub version: Option<String>,

    /// Short description
    #[serde(default)]
    pub description: Option<String>,

    /// Homepage URL
    #[serde(default)]
    pub homepage: Option<String>,

    /// License identifier (SPDX)
    #[serde(default)]
    pub license: Option<String>,

    /// Rebuild counter for the same upstream version
    #[serde(default)]
    pub revision: Option<u32>,
}

/// Source archive section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    /// Archive URL (`https://`, `http://` or `file://`)
    pub url: String,

    /// Checksum for the archive (`sha256:...`, `sha512:...` or bare SHA-256 hex)
    pub checksum: String,

    /// Revision of the archive, for sources without VCS metadata
    #[serde(default)]
    pub commit: Option<CommitPin>,
}

/// A revision identifier recorded for one specific release
///
/// The pin only applies while `version` matches the formula's version, so
/// bumping the source without re-pinning fails instead of baking the old
/// revision into the new build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPin {
    /// Release the revision belongs to
    pub version: String,
    /// Short revision identifier
    pub id: String,
}

/// Lifecycle stage during which a dependency must be available
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DependencyContext {
    Build,
    Test,
    Runtime,
}

/// Where a dependency comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Provenance {
    /// Must be built from its own formula
    #[default]
    Formula,
    /// May be satisfied by the host OS when the host condition holds
    Host,
}

/// Platform condition under which a host copy is acceptable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCondition {
    /// OS family the condition applies to ("macos", "linux")
    pub os: String,
    /// Minimum OS version, numeric or a macOS release name
    pub since: String,
}

/// One declared dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Dependency name
    pub name: String,

    /// Lifecycle contexts (defaults to runtime)
    #[serde(default = "default_contexts")]
    pub contexts: Vec<DependencyContext>,

    /// Declared provenance
    #[serde(default)]
    pub provenance: Provenance,

    /// Host condition, required for host provenance to take effect
    #[serde(default)]
    pub host: Option<HostCondition>,

    /// Program probed on PATH for build/test availability (defaults to `name`)
    #[serde(default)]
    pub executable: Option<String>,
}

fn default_contexts() -> Vec<DependencyContext> {
    vec![DependencyContext::Runtime]
}

impl DependencySpec {
    /// Provenance after applying the host-condition rule
    ///
    /// A host-provided dependency without a condition is treated as one
    /// that must be built from its formula.
    pub fn effective_provenance(&self) -> Provenance {
        match (self.provenance, &self.host) {
            (Provenance::Host, Some(_)) => Provenance::Host,
            _ => Provenance::Formula,
        }
    }

    /// Check if the dependency is declared for a context
    pub fn has_context(&self, context: DependencyContext) -> bool {
        self.contexts.contains(&context)
    }

    /// Program name used when probing for this dependency
    pub fn executable(&self) -> &str {
        self.executable.as_deref().unwrap_or(&self.name)
    }
}

/// Where a value is injected into the linked binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagEntry {
    /// Fully-qualified symbol path (e.g. `github.com/ericwq/aprilsh/frontend.GitTag`)
    pub symbol: String,
    /// Build variable whose value is injected
    pub variable: String,
}

/// Build instructions section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSection {
    /// Build tool argv
    ///
    /// Supports `%(variable)s` substitution; `%(ldflags)s` and `%(output)s`
    /// are always available.
    pub command: Vec<String>,

    /// Name of the file the build produces
    pub output: String,

    /// Environment passed to the build tool
    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// Command printing the toolchain version (e.g. `["go", "version"]`)
    #[serde(default)]
    pub toolchain: Vec<String>,

    /// Symbol injections, in link order
    #[serde(default)]
    pub flags: Vec<FlagEntry>,

    /// Working directory within the source tree (relative path)
    #[serde(default)]
    pub workdir: Option<String>,

    /// Number of parallel jobs (default: auto)
    #[serde(default)]
    pub jobs: Option<u32>,
}

/// How an installed artifact may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ArtifactMode {
    /// Installed with mode 0755
    Executable,
    /// Installed with mode 0644
    #[default]
    Readable,
}

impl ArtifactMode {
    /// Unix permission bits for this mode
    pub fn permissions(&self) -> u32 {
        match self {
            Self::Executable => 0o755,
            Self::Readable => 0o644,
        }
    }
}

/// A file the install phase places into the prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Path relative to the source root after the build
    pub path: String,
    /// Destination relative to the prefix
    pub dest: String,
    /// Declared mode
    #[serde(default)]
    pub mode: ArtifactMode,
}

/// Install section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallSection {
    /// Executables installed into `bin/` under their own file name
    #[serde(default)]
    pub bin: Vec<String>,

    /// Explicit artifact placements
    #[serde(default)]
    pub artifacts: Vec<ArtifactSpec>,
}

impl InstallSection {
    /// All artifact placements, `bin` entries first
    pub fn artifact_specs(&self) -> Vec<ArtifactSpec> {
        let bins = self.bin.iter().map(|path| {
            let file_name = path.rsplit('/').next().unwrap_or(path);
            ArtifactSpec {
                path: path.clone(),
                dest: format!("bin/{}", file_name),
                mode: ArtifactMode::Executable,
            }
        });
        bins.chain(self.artifacts.iter().cloned()).collect()
    }
}

/// Smoke test section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestSection {
    /// Declared placeholder that is known to always fail
    #[serde(default)]
    pub stub: bool,

    /// Commands run in order inside the sandbox
    ///
    /// Supports `%(prefix)s`, `%(bin)s` and `%(testpath)s`.
    #[serde(default)]
    pub commands: Vec<Vec<String>>,

    /// Substring that must appear in the last command's stdout
    #[serde(default)]
    pub expect_output: Option<String>,
}
