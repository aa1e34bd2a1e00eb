//! # FAQ Harness CLI (`faq`)
//!
//! Index a repository's documentation, search it, and ask questions about
//! it from the terminal or over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! faq --config ./config/faq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `faq index` | Fetch the archive, build the index, print stats |
//! | `faq search "<query>"` | Print ranked results for a query |
//! | `faq ask` | Interactive question loop (`stop` exits) |
//! | `faq serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Check what would be indexed
//! faq index --dry-run --config ./config/faq.toml
//!
//! # Top three matches
//! faq search "docker compose postgres" --limit 3
//!
//! # Only documents whose keyword field `section` is `module-1`
//! faq search "docker" --filter section=module-1
//!
//! # Ask questions (needs OPENAI_API_KEY)
//! faq ask
//! ```
//!
//! Diagnostics go to stderr through `tracing`; set `RUST_LOG` to change the
//! level (default `info`).

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use faq_harness::{ask, config, ingest, search, server};

/// FAQ Harness: answer questions about a repository's documentation.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/faq.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "faq",
    about = "FAQ Harness: search and ask questions about a repository's documentation",
    version,
    long_about = "FAQ Harness downloads a GitHub repository as a zip archive, indexes its \
    Markdown files (frontmatter included) with a lexical search index, and answers questions \
    through a streaming agent that cites the files it used."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/faq.toml`.
    #[arg(long, global = true, default_value = "./config/faq.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and index the repository.
    ///
    /// Prints how many documents were fetched, skipped (bad frontmatter),
    /// filtered out, and indexed, plus the index fingerprint.
    Index {
        /// Only list what the archive contains; build nothing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search the documentation.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,

        /// Exact-match filter `FIELD=VALUE` on a keyword field (repeatable).
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },

    /// Ask questions interactively. Type `stop` to exit.
    Ask,

    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` right away and builds the index in the
    /// background.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Index { dry_run } => {
            ingest::run_index(&cfg, dry_run).await?;
        }
        Commands::Search {
            query,
            limit,
            filters,
        } => {
            let filters: HashMap<String, String> = filters.into_iter().collect();
            search::run_search(&cfg, &query, limit, &filters).await?;
        }
        Commands::Ask => {
            ask::run_ask(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

/// Parse a `FIELD=VALUE` pair.
fn parse_filter(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((field, value)) if !field.trim().is_empty() => {
            Ok((field.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected FIELD=VALUE, got '{}'", raw)),
    }
}
