//! Core data models flowing through the ingestion and retrieval pipeline.
//!
//! Documents serialize as flat JSON objects: the well-known fields
//! (`filename`, `content`, and `start` for chunks) sit next to every
//! frontmatter key, which is the shape the agent sees in search results.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Frontmatter metadata, ordered by key so serialization is deterministic.
pub type Metadata = BTreeMap<String, Value>;

/// Field names owned by the document itself. Frontmatter keys with these
/// names are dropped during normalization.
pub const RESERVED_FIELDS: [&str; 3] = ["content", "filename", "start"];

/// One documentation file after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawDocument {
    /// Repository-relative path (archive root stripped).
    pub filename: String,
    /// Body text with the frontmatter block removed.
    pub content: String,
    /// Frontmatter keys, merged at the top level when serialized.
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl RawDocument {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Adds a metadata entry. Reserved field names are ignored.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if !is_reserved(&key) {
            self.metadata.insert(key, value.into());
        }
        self
    }

    /// Returns the text of a field by name (`content`, `filename`, or any
    /// metadata key).
    pub fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "content" => Some(Cow::Borrowed(self.content.as_str())),
            "filename" => Some(Cow::Borrowed(self.filename.as_str())),
            _ => self.metadata.get(name).and_then(value_text),
        }
    }
}

/// A sliding-window slice of a [`RawDocument`] body.
///
/// Carries every non-body field of its parent so it can be filtered and
/// attributed exactly like the whole document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    /// Character offset of this window in the parent body.
    pub start: usize,
    /// The windowed substring.
    pub content: String,
    /// Parent document filename.
    pub filename: String,
    /// Parent document metadata.
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl Chunk {
    pub fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "content" => Some(Cow::Borrowed(self.content.as_str())),
            "filename" => Some(Cow::Borrowed(self.filename.as_str())),
            "start" => Some(Cow::Owned(self.start.to_string())),
            _ => self.metadata.get(name).and_then(value_text),
        }
    }
}

/// Anything the index builder accepts: a whole document or one of its chunks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IndexableDocument {
    Whole(RawDocument),
    Chunk(Chunk),
}

impl IndexableDocument {
    pub fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match self {
            Self::Whole(doc) => doc.field(name),
            Self::Chunk(chunk) => chunk.field(name),
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            Self::Whole(doc) => &doc.filename,
            Self::Chunk(chunk) => &chunk.filename,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Whole(doc) => &doc.content,
            Self::Chunk(chunk) => &chunk.content,
        }
    }
}

impl From<RawDocument> for IndexableDocument {
    fn from(doc: RawDocument) -> Self {
        Self::Whole(doc)
    }
}

impl From<Chunk> for IndexableDocument {
    fn from(chunk: Chunk) -> Self {
        Self::Chunk(chunk)
    }
}

/// A ranked hit returned by the index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Relevance score (higher is better). Only meaningful within one query.
    pub score: f64,
    #[serde(flatten)]
    pub document: IndexableDocument,
}

pub(crate) fn is_reserved(key: &str) -> bool {
    RESERVED_FIELDS.contains(&key)
}

/// Renders a metadata value as searchable text.
///
/// Strings are used verbatim, lists are joined with spaces, `null` has no text.
fn value_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Array(items) => {
            let parts: Vec<Cow<'_, str>> = items.iter().filter_map(value_text).collect();
            Some(Cow::Owned(parts.join(" ")))
        }
        Value::Object(_) => Some(Cow::Owned(value.to_string())),
    }
}
