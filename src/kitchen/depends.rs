// src/kitchen/depends.rs

//! Dependency classification for formula cooks
//!
//! Sorts declared dependencies into the lifecycle contexts they are needed
//! in, decides which host-provided copies are acceptable on this machine,
//! and probes for the build and test tools.

use crate::error::{Error, Result};
use crate::formula::{DependencyContext, DependencySpec, HostCondition, Provenance};
use crate::host::HostPlatform;
use crate::version::OsVersion;
use serde::Serialize;
use tracing::{debug, info};

/// A dependency whose host copy is acceptable under a condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRequirement {
    pub name: String,
    pub condition: HostCondition,
}

/// Dependencies grouped by lifecycle context
///
/// A dependency declared for several contexts appears in each of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyContexts {
    pub build: Vec<String>,
    pub test: Vec<String>,
    pub runtime: Vec<String>,
    /// Host-provided dependencies that carry a host condition
    pub host_provided: Vec<HostRequirement>,
}

impl DependencyContexts {
    /// Names in one context
    pub fn in_context(&self, context: DependencyContext) -> &[String] {
        match context {
            DependencyContext::Build => &self.build,
            DependencyContext::Test => &self.test,
            DependencyContext::Runtime => &self.runtime,
        }
    }
}

/// Classify declared dependencies by context and provenance
///
/// Order within each context follows declaration order; a context listed
/// twice for the same dependency is recorded once.
pub fn classify(declarations: &[DependencySpec]) -> DependencyContexts {
    let mut contexts = DependencyContexts::default();

    for dep in declarations {
        for context in [
            DependencyContext::Build,
            DependencyContext::Test,
            DependencyContext::Runtime,
        ] {
            if !dep.has_context(context) {
                continue;
            }
            let set = match context {
                DependencyContext::Build => &mut contexts.build,
                DependencyContext::Test => &mut contexts.test,
                DependencyContext::Runtime => &mut contexts.runtime,
            };
            if !set.contains(&dep.name) {
                set.push(dep.name.clone());
            }
        }

        if dep.effective_provenance() == Provenance::Host
            && let Some(condition) = &dep.host
        {
            contexts.host_provided.push(HostRequirement {
                name: dep.name.clone(),
                condition: condition.clone(),
            });
        }
    }

    contexts
}

/// Outcome of checking host-provided dependencies against the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostCheck {
    /// Host copies that will be used
    pub satisfied: Vec<String>,
    /// Host conditions for another OS; these must be built on this host
    pub must_build: Vec<String>,
}

/// Check host-provided dependencies against the running platform
///
/// A condition naming this host's OS must be met; a host older than the
/// minimum is an `UnsatisfiedDependency`. A condition for another OS makes
/// the dependency must-build here.
pub fn check_host(contexts: &DependencyContexts, host: &HostPlatform) -> Result<HostCheck> {
    let mut check = HostCheck::default();

    for requirement in &contexts.host_provided {
        let condition = &requirement.condition;
        if !host.is_os(&condition.os) {
            debug!(
                "{}: host condition is for {}, building on {}",
                requirement.name, condition.os, host.os
            );
            check.must_build.push(requirement.name.clone());
            continue;
        }

        let minimum = OsVersion::parse(&condition.since)?;
        if !host.version.satisfies_minimum(&minimum) {
            return Err(Error::UnsatisfiedDependency(format!(
                "{} requires {} {} ({}) or newer, host is {}",
                requirement.name, condition.os, minimum, condition.since, host.version
            )));
        }

        debug!("{}: using host copy ({} >= {})", requirement.name, host.version, minimum);
        check.satisfied.push(requirement.name.clone());
    }

    Ok(check)
}

/// Checks that build and test tools are available before cooking
///
/// This keeps the Kitchen independent of how availability is decided.
pub trait DependencyProbe: Send + Sync {
    /// Return the dependencies that are missing
    fn check_missing(&self, deps: &[&DependencySpec]) -> Result<Vec<String>>;
}

/// Probe that looks for each dependency's executable on `PATH`
#[derive(Debug, Clone, Copy, Default)]
pub struct PathProbe;

impl DependencyProbe for PathProbe {
    fn check_missing(&self, deps: &[&DependencySpec]) -> Result<Vec<String>> {
        Ok(deps
            .iter()
            .filter(|dep| match which::which(dep.executable()) {
                Ok(path) => {
                    debug!("Found {} at {}", dep.name, path.display());
                    false
                }
                Err(_) => true,
            })
            .map(|dep| dep.name.clone())
            .collect())
    }
}

/// A probe that assumes all dependencies are available
///
/// Use this when the toolchain is provisioned outside kiln.
pub struct NoopProbe;

impl DependencyProbe for NoopProbe {
    fn check_missing(&self, _deps: &[&DependencySpec]) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Probe every build or test dependency that is not satisfied by the host
pub fn probe(
    declarations: &[DependencySpec],
    host_check: &HostCheck,
    probe: &dyn DependencyProbe,
) -> Result<()> {
    let wanted: Vec<&DependencySpec> = declarations
        .iter()
        .filter(|dep| {
            dep.has_context(DependencyContext::Build) || dep.has_context(DependencyContext::Test)
        })
        .filter(|dep| !host_check.satisfied.contains(&dep.name))
        .collect();

    if wanted.is_empty() {
        return Ok(());
    }

    let missing = probe.check_missing(&wanted)?;
    if !missing.is_empty() {
        return Err(Error::UnsatisfiedDependency(format!(
            "missing build/test dependencies: {}",
            missing.join(", ")
        )));
    }

    info!("All {} build/test dependencies available", wanted.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn dep(name: &str, contexts: &[DependencyContext]) -> DependencySpec {
        DependencySpec {
            name: name.to_string(),
            contexts: contexts.to_vec(),
            provenance: Provenance::Formula,
            host: None,
            executable: None,
        }
    }

    fn host_dep(name: &str, os: &str, since: &str) -> DependencySpec {
        DependencySpec {
            provenance: Provenance::Host,
            host: Some(HostCondition {
                os: os.to_string(),
                since: since.to_string(),
            }),
            ..dep(name, &[DependencyContext::Runtime])
        }
    }

    /// A probe that knows a fixed set of installed tools
    struct MockProbe {
        installed: HashSet<String>,
    }

    impl MockProbe {
        fn new(installed: &[&str]) -> Self {
            Self {
                installed: installed.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    impl DependencyProbe for MockProbe {
        fn check_missing(&self, deps: &[&DependencySpec]) -> Result<Vec<String>> {
            Ok(deps
                .iter()
                .filter(|d| !self.installed.contains(d.executable()))
                .map(|d| d.name.clone())
                .collect())
        }
    }

    #[test]
    fn test_build_and_test_dependency_in_both_sets() {
        use DependencyContext::*;
        let contexts = classify(&[dep("go", &[Build, Test])]);

        assert_eq!(contexts.build, vec!["go"]);
        assert_eq!(contexts.test, vec!["go"]);
        assert!(contexts.runtime.is_empty());
        assert!(contexts.host_provided.is_empty());
    }

    #[test]
    fn test_classify_keeps_declaration_order() {
        use DependencyContext::*;
        let contexts = classify(&[
            dep("protobuf", &[Build]),
            dep("go", &[Build, Build, Test]),
            dep("openssl", &[Runtime]),
        ]);
        assert_eq!(contexts.build, vec!["protobuf", "go"]);
        assert_eq!(contexts.in_context(Runtime), ["openssl"]);
    }

    #[test]
    fn test_host_without_condition_not_host_provided() {
        let mut zlib = dep("zlib", &[DependencyContext::Runtime]);
        zlib.provenance = Provenance::Host;
        let contexts = classify(&[zlib]);
        assert!(contexts.host_provided.is_empty());
        assert_eq!(contexts.runtime, vec!["zlib"]);
    }

    #[test]
    fn test_check_host_satisfied() {
        let contexts = classify(&[host_dep("ncurses", "macos", "monterey")]);
        let host = HostPlatform::new("macos", "14.2").unwrap();

        let check = check_host(&contexts, &host).unwrap();
        assert_eq!(check.satisfied, vec!["ncurses"]);
    }

    #[test]
    fn test_check_host_below_minimum() {
        let contexts = classify(&[host_dep("ncurses", "macos", "sonoma")]);
        let host = HostPlatform::new("macos", "12.6").unwrap();

        let err = check_host(&contexts, &host).unwrap_err();
        assert!(matches!(err, Error::UnsatisfiedDependency(_)));
    }

    #[test]
    fn test_check_host_other_os_must_build() {
        let contexts = classify(&[host_dep("ncurses", "macos", "monterey")]);
        let host = HostPlatform::new("linux", "6.1").unwrap();

        let check = check_host(&contexts, &host).unwrap();
        assert!(check.satisfied.is_empty());
        assert_eq!(check.must_build, vec!["ncurses"]);
    }

    #[test]
    fn test_probe_reports_missing() {
        use DependencyContext::*;
        let mut protobuf = dep("protobuf", &[Build]);
        protobuf.executable = Some("protoc".to_string());
        let deps = [dep("go", &[Build, Test]), protobuf, dep("openssl", &[Runtime])];

        let err = probe(&deps, &HostCheck::default(), &MockProbe::new(&["go"])).unwrap_err();
        assert!(err.to_string().contains("protobuf"));
        assert!(!err.to_string().contains("openssl"));

        probe(&deps, &HostCheck::default(), &MockProbe::new(&["go", "protoc"])).unwrap();
    }

    #[test]
    fn test_noop_probe() {
        let deps = [dep("go", &[DependencyContext::Build])];
        assert!(probe(&deps, &HostCheck::default(), &NoopProbe).is_ok());
    }

    #[test]
    fn test_path_probe_finds_shell() {
        let mut sh = dep("shell", &[DependencyContext::Build]);
        sh.executable = Some("sh".to_string());
        let missing = PathProbe
            .check_missing(&[&sh, &dep("kiln-no-such-tool", &[DependencyContext::Build])])
            .unwrap();
        assert_eq!(missing, vec!["kiln-no-such-tool"]);
    }
}
