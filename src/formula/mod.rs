// src/formula/mod.rs

//! Formulas: declarative descriptions of one buildable artifact
//!
//! A formula names its source archive and checksum, the dependencies it
//! needs in each lifecycle context, how to build and install it, and how to
//! smoke-test the result.
//!
//! # Example Formula
//!
//! ```toml
//! [formula]
//! name = "aprilsh"
//! description = "Remote shell support intermittent or mobile network"
//! homepage = "https://github.com/ericwq/aprilsh"
//! license = "MIT"
//!
//! [source]
//! url = "https://github.com/ericwq/aprilsh/archive/refs/tags/0.6.40.tar.gz"
//! checksum = "sha256:938876efe036eb149d458c4952a989d0864ea9984a22ef704d02a902d1896826"
//!
//! [[dependencies]]
//! name = "go"
//! contexts = ["build", "test"]
//!
//! [build]
//! command = ["go", "build", "-o", "%(output)s", "-ldflags=%(ldflags)s", "./frontend/client/"]
//! output = "apsh"
//! toolchain = ["go", "version"]
//! flags = [{ symbol = "github.com/ericwq/aprilsh/frontend.GitTag", variable = "version" }]
//!
//! [install]
//! bin = ["apsh"]
//! ```

mod format;
pub mod parser;

pub use format::{
    ArtifactMode, ArtifactSpec, BUILTIN_VARIABLES, BuildSection, CommitPin, DependencyContext,
    DependencySpec, FlagEntry, Formula, FormulaSection, HostCondition, InstallSection,
    Provenance, SourceSection, TestSection, version_from_url,
};
pub use parser::{parse_formula, parse_formula_file, validate_formula};
