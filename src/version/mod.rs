// src/version/mod.rs

//! Host OS version parsing and comparison
//!
//! Host-provided dependencies carry a minimum platform version. Those are
//! written either numerically (`12`, `10.15`, `22.04`) or, for macOS, by
//! release name (`monterey`). Both forms normalize to a [`semver::Version`]
//! so they can be ordered.

use crate::error::{Error, Result};
use semver::Version;
use std::cmp::Ordering;
use std::fmt;

/// macOS release names and their major (or major.minor) version
const MACOS_RELEASES: &[(&str, &str)] = &[
    ("el_capitan", "10.11"),
    ("sierra", "10.12"),
    ("high_sierra", "10.13"),
    ("mojave", "10.14"),
    ("catalina", "10.15"),
    ("big_sur", "11"),
    ("monterey", "12"),
    ("ventura", "13"),
    ("sonoma", "14"),
    ("sequoia", "15"),
    ("tahoe", "26"),
];

/// Look up the numeric version of a macOS release name
pub fn macos_release_version(name: &str) -> Option<&'static str> {
    let key = name.trim().to_lowercase().replace([' ', '-'], "_");
    MACOS_RELEASES
        .iter()
        .find(|(release, _)| *release == key)
        .map(|(_, version)| *version)
}

/// A platform version such as `12.7.1` or `22.04`
///
/// Equality and ordering are numeric: `12` equals `12.0.0`.
#[derive(Debug, Clone)]
pub struct OsVersion {
    /// Version as written (after release-name expansion)
    pub raw: String,
}

impl OsVersion {
    /// Parse a version string or macOS release name
    ///
    /// Examples:
    /// - "12" → 12.0.0
    /// - "10.15.7" → 10.15.7
    /// - "monterey" → 12.0.0
    /// - "22.04" → 22.4.0
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::ParseError("Empty platform version".to_string()));
        }

        let raw = macos_release_version(s).unwrap_or(s).to_string();

        if !raw.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            return Err(Error::ParseError(format!(
                "Invalid platform version '{}': expected a number or a known release name",
                s
            )));
        }

        Ok(Self { raw })
    }

    /// Convert to a semver::Version for comparison
    ///
    /// Platform versions are rarely semver-compliant, so missing components
    /// default to zero and non-numeric suffixes (`5.15.0-91-generic`) are
    /// ignored.
    fn to_semver(&self) -> Version {
        let mut parts = self.raw.split('.').map(|part| {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<u64>().unwrap_or(0)
        });
        let major = parts.next().unwrap_or(0);
        let minor = parts.next().unwrap_or(0);
        let patch = parts.next().unwrap_or(0);
        Version::new(major, minor, patch)
    }

    /// Check whether this version is at least `minimum`
    pub fn satisfies_minimum(&self, minimum: &OsVersion) -> bool {
        self >= minimum
    }
}

impl fmt::Display for OsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl PartialEq for OsVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OsVersion {}

impl Ord for OsVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_semver().cmp(&other.to_semver())
    }
}

impl PartialOrd for OsVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
