// src/lib.rs

//! kiln: declarative build-recipe execution engine
//!
//! A formula describes how to obtain, verify, build, install and smoke-test
//! one versioned artifact. The [`Kitchen`] reproduces that installation on
//! the local machine, injecting version and build metadata into the link
//! step.
//!
//! # Architecture
//!
//! - Formulas: immutable TOML descriptions, parsed and validated up front
//! - Integrity first: sources are only extracted after their digest matches
//! - Explicit lifecycle: every cook is a sequence of phases ending in
//!   `Done` or `Failed`, recorded in a [`CookReport`]
//! - Ephemeral tests: smoke tests run in a fresh directory that never
//!   outlives the test

pub mod checksum;
pub mod compression;
mod error;
pub mod formula;
pub mod host;
pub mod kitchen;
pub mod version;

pub use checksum::{Checksum, DigestAlgorithm};
pub use error::{Error, ErrorKind, Result};
pub use formula::{Formula, parse_formula, parse_formula_file, validate_formula};
pub use host::HostPlatform;
pub use kitchen::{CookReport, Kitchen, KitchenConfig};
