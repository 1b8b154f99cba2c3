// src/host.rs

//! Description of the machine a formula is cooked on
//!
//! Only two facts matter to the Kitchen: the operating system family and
//! its version, used to decide whether a host-provided dependency is
//! acceptable.

use crate::error::{Error, Result};
use crate::version::OsVersion;
use std::fs;
use std::process::Command;
use tracing::debug;

/// Operating system and version of the build host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    /// OS family as reported by `std::env::consts::OS` ("macos", "linux", ...)
    pub os: String,
    /// OS version (product version on macOS, distribution version on Linux)
    pub version: OsVersion,
}

impl HostPlatform {
    /// Create a platform description explicitly
    pub fn new(os: impl Into<String>, version: &str) -> Result<Self> {
        Ok(Self {
            os: os.into().to_lowercase(),
            version: OsVersion::parse(version)?,
        })
    }

    /// Detect the platform of the running host
    pub fn detect() -> Result<Self> {
        let os = std::env::consts::OS;
        let version = match os {
            "macos" => command_output("sw_vers", &["-productVersion"])?,
            "linux" => linux_version()?,
            _ => command_output("uname", &["-r"])?,
        };
        debug!("Detected host platform: {} {}", os, version);
        Self::new(os, &version)
    }

    /// Check whether an OS name from a formula refers to this host
    ///
    /// "darwin" and "osx" are accepted as aliases for macOS.
    pub fn is_os(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        let canonical = match name.as_str() {
            "darwin" | "osx" | "mac" => "macos",
            other => other,
        };
        canonical == self.os
    }
}

fn linux_version() -> Result<String> {
    if let Ok(content) = fs::read_to_string("/etc/os-release")
        && let Some(version) = parse_os_release_version(&content)
    {
        return Ok(version);
    }
    command_output("uname", &["-r"])
}

/// Extract `VERSION_ID` from an os-release document
fn parse_os_release_version(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        line.strip_prefix("VERSION_ID=")
            .map(|v| v.trim().trim_matches('"').to_string())
            .filter(|v| v.starts_with(|c: char| c.is_ascii_digit()))
    })
}

fn command_output(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program).args(args).output().map_err(|e| {
        Error::UnsatisfiedDependency(format!("Cannot determine host version ({program}): {e}"))
    })?;

    if !output.status.success() {
        return Err(Error::UnsatisfiedDependency(format!(
            "Cannot determine host version: {} exited with {}",
            program, output.status
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_os_aliases() {
        let host = HostPlatform::new("macos", "14.2").unwrap();
        assert!(host.is_os("macos"));
        assert!(host.is_os("Darwin"));
        assert!(!host.is_os("linux"));
    }

    #[test]
    fn test_parse_os_release() {
        let content = "NAME=\"Ubuntu\"\nVERSION_ID=\"22.04\"\nID=ubuntu\n";
        assert_eq!(parse_os_release_version(content).as_deref(), Some("22.04"));
        assert_eq!(parse_os_release_version("ID=arch\n"), None);
        assert_eq!(parse_os_release_version("VERSION_ID=rolling\n"), None);
    }

    #[test]
    fn test_detect_current_host() {
        let host = HostPlatform::detect().unwrap();
        assert_eq!(host.os, std::env::consts::OS);
    }
}
