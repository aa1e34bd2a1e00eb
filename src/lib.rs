//! # FAQ Harness
//!
//! Answer questions about a repository's documentation.
//!
//! The harness downloads a snapshot of a GitHub repository as a zip
//! archive, turns every Markdown file into a document (frontmatter becomes
//! metadata), optionally splits documents into overlapping windows, and
//! builds an in-memory lexical index. A conversational agent answers
//! questions by calling the search tool and citing the files it used; its
//! answer is streamed as text deltas and every completed turn is logged as
//! JSON.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────────┐   ┌─────────┐
//! │  fetch   │──▶│ normalize │──▶│ filter/chunk │──▶│  Index  │
//! │  (zip)   │   │ (core)    │   │ (core)       │   │ (BM25)  │
//! └──────────┘   └───────────┘   └──────────────┘   └────┬────┘
//!                                                        │
//!                                   SearchTool ◀─────────┘
//!                                        │
//!                       ┌────────────────┼───────────────┐
//!                       ▼                ▼               ▼
//!                  ┌─────────┐     ┌──────────┐    ┌──────────┐
//!                  │   CLI   │     │  Agent   │──▶ │  stream  │──▶ logs
//!                  │  (faq)  │     │ (openai) │    │ (deltas) │
//!                  └─────────┘     └──────────┘    └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! faq index                          # fetch and index, print stats
//! faq search "how do I join"         # ranked results
//! faq ask                            # interactive, type `stop` to exit
//! faq serve                          # HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`fetch`] | Repository archive download and listing |
//! | [`ingest`] | Fetch → normalize → filter → chunk → index |
//! | [`traits`] | Agent-callable tools and their registry |
//! | [`agent`] | Agent runtime interface and system prompt |
//! | [`openai`] | OpenAI-compatible streaming runtime |
//! | [`stream`] | Snapshot → delta streaming with deferred logging |
//! | [`logs`] | JSON interaction logs |
//! | [`assistant`] | Warm-up and the shared assistant |
//! | [`search`] | `faq search` output |
//! | [`ask`] | `faq ask` interactive loop |
//! | [`server`] | HTTP server |
//!
//! Document types, chunking, indexing and search live in
//! [`faq_harness_core`].

pub mod agent;
pub mod ask;
pub mod assistant;
pub mod config;
pub mod fetch;
pub mod ingest;
pub mod logs;
pub mod openai;
pub mod search;
pub mod server;
pub mod stream;
pub mod traits;
