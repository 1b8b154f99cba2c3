// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use kiln::checksum::sha256;
use kiln::kitchen::{FixedMetadata, NoopProbe};
use kiln::{Formula, HostPlatform, Kitchen, KitchenConfig, parse_formula};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Build script shipped in the test source archive.
///
/// Writes a shell program named by `$1` that prints the greeting from the
/// environment and the linker flags it was "linked" with (`$2`).
pub const BUILD_SCRIPT: &str = r#"#!/bin/sh
set -e
printf '#!/bin/sh\necho "hello %s: %s"\n' "$GREETING" "$2" > "$1"
"#;

/// Create a gzipped tarball with a single top-level `hello-1.0/` directory.
pub fn source_tarball(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("hello-1.0/{}", path), *content)
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// A scratch area holding a source archive, a cache-free kitchen layout and
/// an installation prefix.
pub struct Fixture {
    pub dir: TempDir,
    pub archive: PathBuf,
    pub checksum: String,
    pub url: String,
}

impl Fixture {
    /// Fixture whose archive contains the standard build script.
    pub fn new() -> Self {
        Self::with_files(&[
            ("build.sh", BUILD_SCRIPT.as_bytes()),
            ("README.md", b"hello\n"),
        ])
    }

    pub fn with_files(files: &[(&str, &[u8])]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("hello-1.0.tar.gz");
        let payload = source_tarball(files);
        fs::write(&archive, &payload).unwrap();

        let url = url::Url::from_file_path(&archive).unwrap().to_string();
        Self {
            checksum: format!("sha256:{}", sha256(&payload)),
            dir,
            archive,
            url,
        }
    }

    pub fn prefix(&self) -> PathBuf {
        self.dir.path().join("prefix")
    }

    pub fn sandbox_root(&self) -> PathBuf {
        self.dir.path().join("sandbox")
    }

    pub fn build_root(&self) -> PathBuf {
        self.dir.path().join("build")
    }

    /// A formula for the fixture's archive with `extra` TOML appended.
    pub fn formula(&self, extra: &str) -> Formula {
        self.formula_with_checksum(&self.checksum, extra)
    }

    pub fn formula_with_checksum(&self, checksum: &str, extra: &str) -> Formula {
        parse_formula(&formula_toml(&self.url, checksum, extra)).unwrap()
    }

    /// Kitchen with fixed metadata, no probing and a macOS 14 host.
    pub fn kitchen(&self) -> Kitchen {
        self.kitchen_on(HostPlatform::new("macos", "14.2").unwrap())
    }

    pub fn kitchen_on(&self, host: HostPlatform) -> Kitchen {
        let config = KitchenConfig::isolated()
            .with_build_root(self.build_root())
            .with_sandbox_root(self.sandbox_root());
        Kitchen::new(config)
            .unwrap()
            .with_metadata(fixed_metadata())
            .with_probe(NoopProbe)
            .with_host(host)
    }
}

/// Metadata that does not depend on the machine running the tests.
pub fn fixed_metadata() -> FixedMetadata {
    FixedMetadata {
        commit: Some("a1b2c3d".to_string()),
        branch: Some("main".to_string()),
        toolchain_version: Some("go1.22.3".to_string()),
        now: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap()),
    }
}

/// Formula TOML for the standard `hello` source.
pub fn formula_toml(url: &str, checksum: &str, extra: &str) -> String {
    format!(
        r#"
[formula]
name = "hello"
version = "1.0"
description = "Prints a greeting"
homepage = "https://example.com/hello"
license = "MIT"

[source]
url = "{url}"
checksum = "{checksum}"

[[dependencies]]
name = "sh"
contexts = ["build", "test"]

[build]
command = ["sh", "build.sh", "%(output)s", "%(ldflags)s"]
output = "hello"
environment = {{ GREETING = "from kiln" }}
flags = [
    {{ symbol = "main.Version", variable = "version" }},
    {{ symbol = "main.Commit", variable = "commit" }},
]

[install]
bin = ["hello"]
{extra}
"#
    )
}

/// Count the entries directly under `dir` (0 when it does not exist).
pub fn entries_in(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}
