// src/error.rs

//! Error types for the kiln build engine
//!
//! Every failure surfaced by the Kitchen is one variant of [`Error`]. The
//! orchestrator only needs the coarse [`ErrorKind`] to decide what to report,
//! so each variant maps to exactly one kind.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while loading or cooking a formula
#[derive(Error, Debug)]
pub enum Error {
    /// Source payload does not match the declared checksum
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    IntegrityError { expected: String, actual: String },

    /// Source could not be retrieved
    #[error("fetch failed: {0}")]
    FetchError(String),

    /// Verified payload could not be unpacked
    #[error("extraction failed: {0}")]
    ExtractionError(String),

    /// Dependency missing, or host below the declared minimum
    #[error("unsatisfied dependency: {0}")]
    UnsatisfiedDependency(String),

    /// Flag template references a variable that was never resolved
    #[error("flag template error: {0}")]
    TemplateError(String),

    /// A required build variable could not be determined
    #[error("could not resolve build variable: {0}")]
    ResolveError(String),

    /// Build tool failed
    #[error("build failed: {0}")]
    BuildError(String),

    /// Placing artifacts into the prefix failed
    #[error("install failed: {0}")]
    InstallError(String),

    /// Smoke test did not pass; the installation is left in place
    #[error("{}", test_failure_message(.reason, .stub))]
    TestFailure { reason: String, stub: bool },

    /// Formula or configuration could not be parsed or is invalid
    #[error("parse error: {0}")]
    ParseError(String),

    /// Filesystem error outside of a phase with its own error kind
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn test_failure_message(reason: &str, stub: &bool) -> String {
    if *stub {
        format!("smoke test is a declared stub and always fails: {reason}")
    } else {
        format!("smoke test failed: {reason}")
    }
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize)]
pub enum ErrorKind {
    IntegrityError,
    FetchError,
    ExtractionError,
    UnsatisfiedDependencyError,
    TemplateError,
    ResolveError,
    BuildError,
    InstallError,
    TestFailure,
    ParseError,
    IoError,
}

impl ErrorKind {
    /// Process exit status for a cook that failed with this kind
    ///
    /// Zero is reserved for a cook that reached `Done`.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ParseError => 2,
            Self::IoError => 3,
            Self::UnsatisfiedDependencyError => 10,
            Self::FetchError => 11,
            Self::IntegrityError => 12,
            Self::ExtractionError => 13,
            Self::ResolveError => 14,
            Self::TemplateError => 15,
            Self::BuildError => 16,
            Self::InstallError => 17,
            Self::TestFailure => 18,
        }
    }
}

impl Error {
    /// The kind reported for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IntegrityError { .. } => ErrorKind::IntegrityError,
            Self::FetchError(_) => ErrorKind::FetchError,
            Self::ExtractionError(_) => ErrorKind::ExtractionError,
            Self::UnsatisfiedDependency(_) => ErrorKind::UnsatisfiedDependencyError,
            Self::TemplateError(_) => ErrorKind::TemplateError,
            Self::ResolveError(_) => ErrorKind::ResolveError,
            Self::BuildError(_) => ErrorKind::BuildError,
            Self::InstallError(_) => ErrorKind::InstallError,
            Self::TestFailure { .. } => ErrorKind::TestFailure,
            Self::ParseError(_) => ErrorKind::ParseError,
            Self::Io(_) => ErrorKind::IoError,
        }
    }
}
