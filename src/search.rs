//! `faq search`: ingest and print ranked results.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use faq_harness_core::models::{IndexableDocument, SearchResult};
use faq_harness_core::search::SearchTool;

use crate::config::{Config, RepoConfig};
use crate::ingest::index_data;

const EXCERPT_CHARS: usize = 200;

/// Search the freshly built index and print up to `limit` results
/// (default `[search].num_results`). `filters` must name keyword fields.
pub async fn run_search(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    filters: &HashMap<String, String>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let index = index_data(config).await?;
    let tool = SearchTool::with_limit(
        Arc::new(index),
        limit.unwrap_or(config.search.num_results),
    )
    .with_boosts(config.search.boosts.clone());

    let results = tool.search_filtered(query, filters)?;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        print_result(i + 1, result, &config.repo);
    }
    Ok(())
}

fn print_result(rank: usize, result: &SearchResult, repo: &RepoConfig) {
    let doc = &result.document;
    println!("{}. [{:.2}] {}", rank, result.score, doc.filename());
    if let IndexableDocument::Chunk(chunk) = doc {
        println!("    offset: {}", chunk.start);
    }
    if let Some(question) = doc.field("question") {
        println!("    question: {}", question);
    }
    println!("    url: {}", github_url(repo, doc.filename()));
    println!("    excerpt: \"{}\"", excerpt(doc.content(), EXCERPT_CHARS));
    println!();
}

/// Link to `filename` on the repository's branch, as the agent cites it.
pub fn github_url(repo: &RepoConfig, filename: &str) -> String {
    format!(
        "https://github.com/{}/{}/blob/{}/{}",
        repo.owner, repo.name, repo.branch, filename
    )
}

/// First `max_chars` characters on a single line.
fn excerpt(text: &str, max_chars: usize) -> String {
    let flat: String = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat,
    }
}
