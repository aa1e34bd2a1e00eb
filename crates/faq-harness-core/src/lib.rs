//! # FAQ Harness Core
//!
//! Shared, I/O-free logic for FAQ Harness: document models, frontmatter
//! normalization, sliding-window chunking, the lexical index, and the
//! bounded search tool handed to the agent.
//!
//! This crate contains no tokio, HTTP, or filesystem dependencies. Archive
//! download, the agent runtime, and interaction logging live in the
//! `faq-harness` application crate.
//!
//! ## Pipeline
//!
//! ```text
//! archive entry ──▶ normalize ──▶ RawDocument ──▶ chunk (optional) ──▶ Index::fit
//!                                                                        │
//!                                           agent ──▶ SearchTool::search ◀┘
//! ```

pub mod builder;
pub mod chunk;
pub mod error;
pub mod index;
pub mod models;
pub mod normalize;
pub mod search;

pub use error::{CoreError, Result};
