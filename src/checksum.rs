// src/checksum.rs

//! Source checksums
//!
//! A formula pins its source archive with a checksum written as
//! `algorithm:hex` (`sha256:938876...`). Bare hex is read as SHA-256, the
//! digest upstream release pages usually publish. Hex digits compare
//! case-insensitively.

use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Digest algorithms a checksum may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Length of the hex-encoded digest
    pub const fn hex_len(&self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }

    /// Hex-encoded digest of `data`
    pub fn digest_hex(&self, data: &[u8]) -> String {
        match self {
            Self::Sha256 => hex::encode(Sha256::digest(data)),
            Self::Sha512 => hex::encode(Sha512::digest(data)),
        }
    }
}

/// Why a checksum string is unusable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChecksumError {
    #[error("unknown digest algorithm '{0}'")]
    UnknownAlgorithm(String),

    #[error("{algorithm} digest must be {expected} hex digits, got {got}")]
    Length {
        algorithm: DigestAlgorithm,
        expected: usize,
        got: usize,
    },

    #[error("digest contains non-hex characters: {0}")]
    NotHex(String),
}

/// A payload whose digest differs from the declared one
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{expected} does not match payload digest {actual}")]
pub struct Mismatch {
    pub expected: Checksum,
    pub actual: Checksum,
}

/// An expected or computed digest, normalized to lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    algorithm: DigestAlgorithm,
    hex: String,
}

impl Checksum {
    /// Digest `data` with `algorithm`
    pub fn of(algorithm: DigestAlgorithm, data: &[u8]) -> Self {
        Self {
            algorithm,
            hex: algorithm.digest_hex(data),
        }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Check `data` against this checksum
    pub fn verify(&self, data: &[u8]) -> Result<(), Mismatch> {
        let actual = Self::of(self.algorithm, data);
        if actual.hex == self.hex {
            Ok(())
        } else {
            Err(Mismatch {
                expected: self.clone(),
                actual,
            })
        }
    }

    /// File-system safe form, used to key the source cache
    pub fn cache_key(&self) -> String {
        format!("{}_{}", self.algorithm, self.hex)
    }
}

impl FromStr for Checksum {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (algorithm, hex) = match s.split_once(':') {
            Some((name, hex)) => {
                let algorithm = name
                    .parse::<DigestAlgorithm>()
                    .map_err(|_| ChecksumError::UnknownAlgorithm(name.to_string()))?;
                (algorithm, hex)
            }
            None => (DigestAlgorithm::Sha256, s),
        };

        if hex.len() != algorithm.hex_len() {
            return Err(ChecksumError::Length {
                algorithm,
                expected: algorithm.hex_len(),
                got: hex.len(),
            });
        }
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ChecksumError::NotHex(hex.to_string()));
        }

        Ok(Self {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

/// Lowercase SHA-256 hex of `data`
pub fn sha256(data: &[u8]) -> String {
    DigestAlgorithm::Sha256.digest_hex(data)
}
