//! Error types for faq-harness-core.

/// Errors raised by normalization, chunking, index construction and search.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A single document could not be parsed. Batch callers skip it.
    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    /// Caller passed an unusable parameter (chunk size/step, empty field list).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The search tool was queried before the index finished building.
    #[error("search index is not built yet")]
    SearchUnavailable,

    /// A search tool was installed into a slot that already holds one.
    #[error("search tool is already installed")]
    AlreadyInstalled,
}

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;
