//! Index construction: filter → (optional) chunk → fit.
//!
//! [`build_index`] is one-shot. The returned [`Index`] contains exactly the
//! post-filter, post-chunk document set; to add documents, rebuild from the
//! full corpus.

use crate::chunk::{chunk_documents, ChunkingParams};
use crate::error::{CoreError, Result};
use crate::index::{Index, IndexOptions};
use crate::models::{IndexableDocument, RawDocument};

/// Everything [`build_index`] needs besides the documents.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub index: IndexOptions,
    /// `Some` to index sliding-window chunks instead of whole documents.
    pub chunking: Option<ChunkingParams>,
}

impl BuildOptions {
    /// Enable chunking with the default window (2000 / 1000).
    pub fn chunked(mut self) -> Self {
        self.chunking = Some(ChunkingParams::default());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.index.text_fields.is_empty() {
            return Err(CoreError::InvalidParameter(
                "at least one text field is required".to_string(),
            ));
        }
        if let Some(params) = &self.chunking {
            params.validate()?;
        }
        Ok(())
    }
}

/// Build a search index over `docs`.
///
/// Documents for which `filter` returns `false` are dropped first. All
/// options are validated before any document is touched.
pub fn build_index(
    docs: Vec<RawDocument>,
    options: &BuildOptions,
    filter: Option<&dyn Fn(&RawDocument) -> bool>,
) -> Result<Index> {
    options.validate()?;

    let docs: Vec<RawDocument> = match filter {
        Some(keep) => docs.into_iter().filter(|doc| keep(doc)).collect(),
        None => docs,
    };

    let indexable: Vec<IndexableDocument> = match options.chunking {
        Some(params) => chunk_documents(&docs, params)?
            .into_iter()
            .map(IndexableDocument::from)
            .collect(),
        None => docs.into_iter().map(IndexableDocument::from).collect(),
    };

    Ok(Index::fit(options.index.clone(), indexable))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn docs() -> Vec<RawDocument> {
        vec![
            RawDocument::new("data-engineering/a.md", "bigquery partitioning"),
            RawDocument::new("data-engineering/b.md", "x".repeat(2500)),
            RawDocument::new("mlops/c.md", "mlflow tracking server"),
            RawDocument::new("README.md", ""),
        ]
    }

    fn filenames(index: &Index) -> BTreeSet<String> {
        index
            .documents()
            .iter()
            .map(|d| d.filename().to_string())
            .collect()
    }

    #[test]
    fn no_filter_keeps_everything() {
        let index = build_index(docs(), &BuildOptions::default(), None).unwrap();
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn filter_keeps_exactly_matching_documents() {
        let keep = |d: &RawDocument| d.filename.contains("data-engineering");
        let filtered = build_index(docs(), &BuildOptions::default(), Some(&keep)).unwrap();
        let all = build_index(docs(), &BuildOptions::default(), None).unwrap();

        let expected: BTreeSet<String> = docs()
            .into_iter()
            .filter(|d| keep(d))
            .map(|d| d.filename)
            .collect();
        assert_eq!(filenames(&filtered), expected);

        let (f, a) = (filenames(&filtered), filenames(&all));
        assert!(f.is_subset(&a) && f.len() < a.len());
    }

    #[test]
    fn chunking_expands_documents() {
        let index = build_index(docs(), &BuildOptions::default().chunked(), None).unwrap();
        // 1 + 2 + 1 + 1 (empty body keeps one empty chunk)
        assert_eq!(index.len(), 5);
        assert!(index
            .documents()
            .iter()
            .all(|d| matches!(d, IndexableDocument::Chunk(_))));
    }

    #[test]
    fn invalid_chunking_fails_before_work() {
        let options = BuildOptions {
            chunking: Some(ChunkingParams::new(100, 0)),
            ..Default::default()
        };
        let err = build_index(docs(), &options, None).unwrap_err();
        assert!(matches!(err, CoreError::InvalidParameter(_)));
    }

    #[test]
    fn empty_text_fields_rejected() {
        let options = BuildOptions {
            index: IndexOptions {
                text_fields: Vec::new(),
                keyword_fields: Vec::new(),
            },
            chunking: None,
        };
        assert!(matches!(
            build_index(docs(), &options, None),
            Err(CoreError::InvalidParameter(_))
        ));
    }

    #[test]
    fn rebuild_is_idempotent() {
        let keep = |d: &RawDocument| d.filename.starts_with("data-engineering/");
        let options = BuildOptions::default().chunked();
        let first = build_index(docs(), &options, Some(&keep)).unwrap();
        let second = build_index(docs(), &options, Some(&keep)).unwrap();
        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_eq!(first.documents(), second.documents());
    }
}
