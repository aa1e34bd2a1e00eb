//! Repository fetcher.
//!
//! Downloads a snapshot of a repository's branch as a zip archive and
//! yields the documentation entries inside it. Entries keep their full
//! archive path (including the synthetic top-level folder); stripping that
//! folder is the normalizer's job.
//!
//! # Archive URL
//!
//! The URL is built from a template in `[repo].archive_url`:
//!
//! ```text
//! https://codeload.github.com/{owner}/{name}/zip/refs/heads/{branch}
//! ```
//!
//! Failures are not retried here: a failed download or a malformed archive
//! aborts the ingestion run. A single entry larger than the size limit is
//! only skipped.

use std::io::Read;
use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::config::RepoConfig;

/// Maximum decompressed bytes read from a single entry (zip-bomb protection).
const MAX_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Errors raised while retrieving or unpacking a repository archive.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("archive download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("archive download from {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("malformed archive: {0}")]
    Archive(String),

    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid include glob: {0}")]
    Glob(#[from] globset::Error),
}

impl From<zip::result::ZipError> for FetchError {
    fn from(err: zip::result::ZipError) -> Self {
        FetchError::Archive(err.to_string())
    }
}

/// One documentation file read from the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Full path inside the archive, e.g. `"faq-main/data-engineering/README.md"`.
    pub path: String,
    pub bytes: Vec<u8>,
}

/// Documentation entries of an archive plus the ones left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveListing {
    pub entries: Vec<ArchiveEntry>,
    /// Paths of matching entries larger than the per-entry limit.
    pub oversized: Vec<String>,
}

/// Expand the archive URL template for `repo`.
pub fn archive_url(repo: &RepoConfig) -> String {
    repo.archive_url
        .replace("{owner}", &repo.owner)
        .replace("{name}", &repo.name)
        .replace("{branch}", &repo.branch)
}

/// Download the archive bytes for `repo`.
pub async fn fetch_archive(
    client: &reqwest::Client,
    repo: &RepoConfig,
) -> Result<Vec<u8>, FetchError> {
    let url = archive_url(repo);
    tracing::info!(%url, "downloading repository archive");

    let resp = client.get(&url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url,
            status: status.as_u16(),
        });
    }

    let bytes = resp.bytes().await?;
    tracing::debug!(bytes = bytes.len(), "archive downloaded");
    Ok(bytes.to_vec())
}

/// Read a previously downloaded archive from disk.
pub fn load_archive_file(path: &Path) -> Result<Vec<u8>, FetchError> {
    tracing::info!(path = %path.display(), "reading repository archive from disk");
    Ok(std::fs::read(path)?)
}

/// Build a case-insensitive glob set from include patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet, FetchError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            GlobBuilder::new(pattern)
                .case_insensitive(true)
                .literal_separator(false)
                .build()?,
        );
    }
    Ok(builder.build()?)
}

/// List the entries of a zip archive whose path matches `include`.
///
/// Directories are skipped. Entries are returned in archive order; an entry
/// over 50 MiB is left out with a warning and reported in
/// [`ArchiveListing::oversized`].
pub fn read_archive(bytes: &[u8], include: &GlobSet) -> Result<ArchiveListing, FetchError> {
    read_archive_bounded(bytes, include, MAX_ENTRY_BYTES)
}

fn read_archive_bounded(
    bytes: &[u8],
    include: &GlobSet,
    max_entry_bytes: u64,
) -> Result<ArchiveListing, FetchError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))?;
    let mut listing = ArchiveListing::default();

    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.is_dir() || !include.is_match(entry.name()) {
            continue;
        }

        let path = entry.name().to_string();
        let mut buf = Vec::new();
        entry.take(max_entry_bytes + 1).read_to_end(&mut buf)?;
        if buf.len() as u64 > max_entry_bytes {
            tracing::warn!(%path, limit = max_entry_bytes, "skipping oversized archive entry");
            listing.oversized.push(path);
            continue;
        }

        listing.entries.push(ArchiveEntry { path, bytes: buf });
    }

    Ok(listing)
}
