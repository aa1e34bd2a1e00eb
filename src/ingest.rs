//! Ingestion pipeline: fetch → normalize → filter → (chunk) → index.
//!
//! One ingestion run per process. The archive is downloaded (or read from
//! `[repo].archive_path`), every documentation entry is normalized into a
//! [`RawDocument`], and the optional filename filter and chunking are
//! applied while building the [`Index`].
//!
//! A file whose frontmatter cannot be parsed, or that is too large to read,
//! is skipped with a warning; any other failure aborts the run.

use anyhow::{Context, Result};
use faq_harness_core::builder::build_index;
use faq_harness_core::error::CoreError;
use faq_harness_core::index::Index;
use faq_harness_core::models::RawDocument;
use faq_harness_core::normalize::normalize;

use crate::config::Config;
use crate::fetch::{build_globset, fetch_archive, load_archive_file, read_archive};

/// Documents read from the repository archive.
#[derive(Debug, Clone, Default)]
pub struct RepoData {
    pub documents: Vec<RawDocument>,
    /// Archive paths of entries dropped because they were too large or
    /// could not be parsed.
    pub skipped: Vec<String>,
}

/// Counts reported by `faq index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub fetched: usize,
    pub skipped: usize,
    pub filtered_out: usize,
    pub indexed: usize,
    pub fingerprint: String,
}

/// Download the archive and normalize every documentation file in it.
pub async fn read_repo_data(config: &Config) -> Result<RepoData> {
    let bytes = match &config.repo.archive_path {
        Some(path) => load_archive_file(path)?,
        None => {
            let client = reqwest::Client::builder()
                .user_agent(concat!("faq-harness/", env!("CARGO_PKG_VERSION")))
                .build()
                .context("Failed to build HTTP client")?;
            fetch_archive(&client, &config.repo)
                .await
                .with_context(|| format!("Failed to fetch repository {}", config.repo.slug()))?
        }
    };

    let include = build_globset(&config.repo.include_globs)?;
    let listing = read_archive(&bytes, &include)?;

    let mut data = RepoData {
        skipped: listing.oversized,
        ..RepoData::default()
    };
    for entry in listing.entries {
        match normalize(&entry.path, &entry.bytes) {
            Ok(doc) => data.documents.push(doc),
            Err(CoreError::Parse { path, reason }) => {
                tracing::warn!(%path, "skipping file with unreadable frontmatter: {}", reason);
                data.skipped.push(entry.path);
            }
            Err(other) => return Err(other.into()),
        }
    }

    tracing::info!(
        documents = data.documents.len(),
        skipped = data.skipped.len(),
        "repository read"
    );
    Ok(data)
}

/// Predicate from `[filter].filename_contains`, if configured.
pub fn filename_filter(config: &Config) -> Option<impl Fn(&RawDocument) -> bool> {
    let needle = config.filter.filename_contains.clone()?;
    Some(move |doc: &RawDocument| doc.filename.contains(&needle))
}

/// Build the index from already-read documents according to `config`.
pub fn build_from_documents(config: &Config, documents: Vec<RawDocument>) -> Result<Index> {
    let keep = filename_filter(config);
    let filter = keep.as_ref().map(|f| f as &dyn Fn(&RawDocument) -> bool);
    let index = build_index(documents, &config.build_options(), filter)
        .context("Failed to build search index")?;
    Ok(index)
}

/// Fetch, normalize, filter, chunk and index in one go.
pub async fn index_data(config: &Config) -> Result<Index> {
    let data = read_repo_data(config).await?;
    build_from_documents(config, data.documents)
}

/// Run ingestion and compute the stats printed by `faq index`.
pub async fn collect_stats(config: &Config) -> Result<IndexStats> {
    let data = read_repo_data(config).await?;
    let fetched = data.documents.len();
    let kept = match filename_filter(config) {
        Some(keep) => data.documents.iter().filter(|d| keep(d)).count(),
        None => fetched,
    };

    let index = build_from_documents(config, data.documents)?;

    Ok(IndexStats {
        fetched,
        skipped: data.skipped.len(),
        filtered_out: fetched - kept,
        indexed: index.len(),
        fingerprint: index.fingerprint(),
    })
}

/// `faq index`: ingest the repository and print a summary.
///
/// With `dry_run` only the archive contents are reported; no index is
/// built.
pub async fn run_index(config: &Config, dry_run: bool) -> Result<()> {
    let repo = config.repo.slug();

    if dry_run {
        let data = read_repo_data(config).await?;
        println!("index {} (dry-run)", repo);
        println!("  documents found: {}", data.documents.len());
        println!("  skipped: {}", data.skipped.len());
        for path in &data.skipped {
            println!("    {}", path);
        }
        return Ok(());
    }

    let stats = collect_stats(config).await?;
    let unit = if config.chunking.enabled {
        "chunks"
    } else {
        "documents"
    };

    println!("index {}", repo);
    println!("  fetched: {} documents", stats.fetched);
    println!("  skipped: {}", stats.skipped);
    println!("  filtered out: {}", stats.filtered_out);
    println!("  indexed {}: {}", unit, stats.indexed);
    println!("  fingerprint: {}", stats.fingerprint);
    println!("ok");

    Ok(())
}
