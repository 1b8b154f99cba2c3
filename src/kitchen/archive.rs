// src/kitchen/archive.rs

//! Source retrieval, integrity verification and extraction
//!
//! The only way to obtain a [`VerifiedArchive`] is [`verify_checksum`], and
//! [`extract`] only accepts a `VerifiedArchive`, so a payload can never be
//! unpacked before its digest has been checked.

use crate::checksum::Checksum;
use crate::compression::decompress;
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;

/// Retrieves raw source payloads
///
/// Implementations report every retrieval problem as `FetchError` and do
/// not retry; retry policy belongs to the caller.
pub trait SourceFetcher: Send + Sync {
    /// Fetch the bytes behind `url`
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetcher for `http(s)://` and `file://` URLs
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with the given User-Agent
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::FetchError(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl SourceFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let parsed =
            Url::parse(url).map_err(|e| Error::FetchError(format!("Invalid URL {url}: {e}")))?;

        match parsed.scheme() {
            "file" => {
                let path = parsed
                    .to_file_path()
                    .map_err(|_| Error::FetchError(format!("Invalid file URL: {url}")))?;
                debug!("Reading local source {}", path.display());
                fs::read(&path)
                    .map_err(|e| Error::FetchError(format!("Failed to read {}: {e}", path.display())))
            }
            "http" | "https" => {
                info!("Downloading: {}", url);
                let response = self
                    .client
                    .get(parsed)
                    .send()
                    .map_err(|e| Error::FetchError(format!("Failed to download {url}: {e}")))?;

                if !response.status().is_success() {
                    return Err(Error::FetchError(format!(
                        "HTTP {} from {}",
                        response.status(),
                        url
                    )));
                }

                let bytes = response
                    .bytes()
                    .map_err(|e| Error::FetchError(format!("Failed to read response: {e}")))?;
                Ok(bytes.to_vec())
            }
            scheme => Err(Error::FetchError(format!(
                "Unsupported URL scheme '{scheme}' in {url}"
            ))),
        }
    }
}

/// A source payload whose digest matched the formula's checksum
#[derive(Debug, Clone)]
pub struct VerifiedArchive {
    bytes: Vec<u8>,
    digest: Checksum,
}

impl VerifiedArchive {
    /// The verified bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The digest the payload was verified against
    pub fn digest(&self) -> &Checksum {
        &self.digest
    }
}

/// Verify `bytes` against an expected checksum
///
/// The checksum is `algo:hex` or bare SHA-256 hex, compared
/// case-insensitively. A malformed checksum fails closed just like a
/// mismatch does.
pub fn verify_checksum(bytes: Vec<u8>, expected: &str) -> Result<VerifiedArchive> {
    let digest: Checksum = expected.parse().map_err(|e| Error::IntegrityError {
        expected: expected.to_string(),
        actual: format!("<unusable checksum: {e}>"),
    })?;

    digest.verify(&bytes).map_err(|m| Error::IntegrityError {
        expected: m.expected.to_string(),
        actual: m.actual.to_string(),
    })?;

    debug!("Checksum verified: {}", digest);
    Ok(VerifiedArchive { bytes, digest })
}

/// Fetch a source payload and verify it, using the cache when possible
///
/// The cache is keyed by checksum. A cached payload is re-verified on every
/// use; a mismatching entry is discarded and the source fetched again.
/// Cache write failures are logged and otherwise ignored.
pub fn fetch_verified(
    fetcher: &dyn SourceFetcher,
    url: &str,
    checksum: &str,
    cache: Option<&Path>,
) -> Result<VerifiedArchive> {
    let cached_path = cache.map(|dir| dir.join(cache_key(checksum)));

    if let Some(path) = &cached_path
        && path.exists()
    {
        debug!("Using cached source: {}", path.display());
        match fs::read(path) {
            Ok(bytes) => match verify_checksum(bytes, checksum) {
                Ok(archive) => return Ok(archive),
                Err(e) => {
                    warn!("Cached source {} is invalid ({}), re-fetching", path.display(), e);
                    let _ = fs::remove_file(path);
                }
            },
            Err(e) => warn!("Failed to read cached source {}: {}", path.display(), e),
        }
    }

    let bytes = fetcher.fetch(url)?;
    let archive = verify_checksum(bytes, checksum)?;

    if let Some(path) = &cached_path {
        if let Err(e) = store_in_cache(path, archive.bytes()) {
            warn!("Failed to cache source {}: {}", url, e);
        }
    }

    Ok(archive)
}

pub(crate) fn cache_key(checksum: &str) -> String {
    match checksum.parse::<Checksum>() {
        Ok(digest) => digest.cache_key(),
        Err(_) => checksum.trim().replace([':', '/'], "_"),
    }
}

fn store_in_cache(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, bytes)?;
    fs::rename(&temp_path, path)
}

/// An extracted, trusted source tree
#[derive(Debug, Clone)]
pub struct SourceTree {
    /// Directory the archive was unpacked into
    pub extract_dir: PathBuf,
    /// Source root: the archive's single top-level directory, if it has one
    pub root: PathBuf,
    /// Number of entries unpacked
    pub entries: usize,
}

/// Unpack a verified tarball into `dest`
///
/// Gzip, xz, zstd and plain tar payloads are recognized by magic bytes.
/// Entries that would land outside `dest` abort the extraction.
pub fn extract(archive: &VerifiedArchive, dest: &Path) -> Result<SourceTree> {
    fs::create_dir_all(dest)
        .map_err(|e| Error::ExtractionError(format!("Failed to create {}: {e}", dest.display())))?;

    let (codec, decoder) = decompress(archive.bytes())
        .map_err(|e| Error::ExtractionError(format!("Failed to open archive: {e}")))?;
    debug!("Archive compression: {}", codec);
    let mut tar = tar::Archive::new(decoder);
    tar.set_preserve_permissions(true);

    let entries = tar
        .entries()
        .map_err(|e| Error::ExtractionError(format!("Corrupt archive: {e}")))?;

    let mut count = 0;
    for entry in entries {
        let mut entry =
            entry.map_err(|e| Error::ExtractionError(format!("Corrupt archive entry: {e}")))?;
        let name = entry
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "<invalid path>".to_string());

        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| Error::ExtractionError(format!("Failed to unpack {name}: {e}")))?;
        if !unpacked {
            return Err(Error::ExtractionError(format!(
                "Archive entry {name} escapes the extraction directory"
            )));
        }
        count += 1;
    }

    if count == 0 {
        return Err(Error::ExtractionError("Archive contains no entries".to_string()));
    }

    let root = source_root(dest)?;
    debug!("Source directory: {}", root.display());

    Ok(SourceTree {
        extract_dir: dest.to_path_buf(),
        root,
        entries: count,
    })
}

/// Find the actual source directory (archives usually have a top-level dir)
fn source_root(dest: &Path) -> Result<PathBuf> {
    let entries: Vec<_> = fs::read_dir(dest)
        .map_err(|e| Error::ExtractionError(format!("Failed to read {}: {e}", dest.display())))?
        .filter_map(|e| e.ok())
        .collect();

    if entries.len() == 1 && entries[0].file_type().map(|t| t.is_dir()).unwrap_or(false) {
        Ok(entries[0].path())
    } else {
        Ok(dest.to_path_buf())
    }
}
