//! Sliding-window text chunker.
//!
//! Splits document bodies into fixed-size, possibly overlapping windows so
//! long files can be indexed and retrieved piecewise. Every [`Chunk`] keeps
//! its character offset into the parent body plus all of the parent's
//! non-body fields.
//!
//! # Algorithm
//!
//! 1. Reject `size == 0` or `step == 0` before doing any work.
//! 2. Emit windows at character offsets `0, step, 2*step, …`, each covering
//!    `body[i .. i + size]` (clamped to the end of the body).
//! 3. Stop after the first window whose end reaches the end of the body,
//!    so there is never an empty trailing window.
//! 4. An empty body yields exactly one empty window at offset 0.
//!
//! With `step > size` the windows leave gaps between them. That
//! configuration is accepted as-is.
//!
//! # Example
//!
//! ```rust
//! use faq_harness_core::chunk::sliding_window;
//!
//! let windows = sliding_window("abcdefgh", 4, 2).unwrap();
//! let starts: Vec<usize> = windows.iter().map(|w| w.start).collect();
//! assert_eq!(starts, vec![0, 2, 4]);
//! assert_eq!(windows[2].text, "efgh");
//! ```

use crate::error::{CoreError, Result};
use crate::models::{Chunk, RawDocument};

/// Default window size, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 2000;
/// Default distance between window starts, in characters.
pub const DEFAULT_CHUNK_STEP: usize = 1000;

/// Window geometry for [`chunk_documents`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    pub size: usize,
    pub step: usize,
}

impl ChunkingParams {
    pub fn new(size: usize, step: usize) -> Self {
        Self { size, step }
    }

    /// Fails with [`CoreError::InvalidParameter`] unless both values are positive.
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 || self.step == 0 {
            return Err(CoreError::InvalidParameter(format!(
                "chunk size and step must be positive (size={}, step={})",
                self.size, self.step
            )));
        }
        Ok(())
    }
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            step: DEFAULT_CHUNK_STEP,
        }
    }
}

/// One window borrowed from the input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window<'a> {
    /// Character offset of the window start.
    pub start: usize,
    pub text: &'a str,
}

/// Cut `text` into windows of `size` characters every `step` characters.
pub fn sliding_window(text: &str, size: usize, step: usize) -> Result<Vec<Window<'_>>> {
    ChunkingParams::new(size, step).validate()?;

    // Byte offset of every char boundary, plus the end of the string.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let n = boundaries.len() - 1;

    if n == 0 {
        return Ok(vec![Window { start: 0, text }]);
    }

    let mut windows = Vec::with_capacity(n / step + 1);
    let mut i = 0;
    while i < n {
        let end = i.saturating_add(size).min(n);
        windows.push(Window {
            start: i,
            text: &text[boundaries[i]..boundaries[end]],
        });
        if i.saturating_add(size) >= n {
            break;
        }
        i += step;
    }

    Ok(windows)
}

/// Chunk every document, copying `filename` and metadata onto each chunk.
///
/// Parameters are validated once, before any document is processed.
pub fn chunk_documents(docs: &[RawDocument], params: ChunkingParams) -> Result<Vec<Chunk>> {
    params.validate()?;

    let mut chunks = Vec::new();
    for doc in docs {
        for window in sliding_window(&doc.content, params.size, params.step)? {
            chunks.push(Chunk {
                start: window.start,
                content: window.text.to_string(),
                filename: doc.filename.clone(),
                metadata: doc.metadata.clone(),
            });
        }
    }
    Ok(chunks)
}
