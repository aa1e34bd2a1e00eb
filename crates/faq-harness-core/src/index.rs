//! In-memory lexical index.
//!
//! Each configured text field gets its own inverted index and is scored
//! with BM25; the per-field scores are summed with optional boosts.
//! Keyword fields are not tokenized: they are matched by exact string
//! equality and only used to filter results.
//!
//! The index is built once by [`Index::fit`] and is immutable afterwards,
//! so it can be shared between threads behind an `Arc` without locking.
//!
//! # Scoring
//!
//! For a query with tokens `q₁…qₙ` and a text field `f`:
//!
//! ```text
//! bm25(d, f) = Σ idf(qᵢ) · tf·(k1 + 1) / (tf + k1·(1 − b + b·|d|/avgdl))
//! idf(q)     = ln(1 + (N − df + 0.5) / (df + 0.5))
//! score(d)   = Σ_f boost(f) · bm25(d, f)
//! ```
//!
//! Documents scoring zero are never returned. Ties keep insertion order.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};

use crate::models::{IndexableDocument, SearchResult};

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

/// Words too common to carry signal in English prose.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "if", "in", "into", "is", "it", "its", "itself", "just", "me",
    "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "only",
    "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she", "should", "so",
    "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "would", "you", "your", "yours", "yourself", "yourselves",
];

/// Which document fields are searchable and which are filterable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOptions {
    /// Tokenized and scored.
    pub text_fields: Vec<String>,
    /// Stored for exact-match filtering only.
    pub keyword_fields: Vec<String>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            text_fields: vec!["content".to_string(), "filename".to_string()],
            keyword_fields: Vec::new(),
        }
    }
}

/// A single query against an [`Index`].
#[derive(Debug, Clone, Default)]
pub struct SearchQuery<'a> {
    pub text: &'a str,
    /// Keyword field → required value.
    pub filters: HashMap<String, String>,
    /// Text field → score multiplier (default `1.0`).
    pub boosts: HashMap<String, f64>,
    pub num_results: usize,
}

impl<'a> SearchQuery<'a> {
    pub fn new(text: &'a str, num_results: usize) -> Self {
        Self {
            text,
            num_results,
            ..Default::default()
        }
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn boost(mut self, field: impl Into<String>, weight: f64) -> Self {
        self.boosts.insert(field.into(), weight);
        self
    }
}

/// Inverted index over one text field.
#[derive(Debug, Clone)]
struct FieldIndex {
    name: String,
    /// token → (document position, term frequency)
    postings: HashMap<String, Vec<(usize, u32)>>,
    doc_lengths: Vec<u32>,
    avg_doc_len: f64,
}

impl FieldIndex {
    fn build(name: &str, docs: &[IndexableDocument]) -> Self {
        let mut postings: HashMap<String, Vec<(usize, u32)>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(docs.len());

        for (pos, doc) in docs.iter().enumerate() {
            let tokens = doc.field(name).map(|t| tokenize(&t)).unwrap_or_default();
            doc_lengths.push(tokens.len() as u32);

            let mut freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *freqs.entry(token).or_insert(0) += 1;
            }
            for (token, tf) in freqs {
                postings.entry(token).or_default().push((pos, tf));
            }
        }

        let total: u64 = doc_lengths.iter().map(|&l| u64::from(l)).sum();
        let avg_doc_len = if docs.is_empty() {
            0.0
        } else {
            total as f64 / docs.len() as f64
        };

        Self {
            name: name.to_string(),
            postings,
            doc_lengths,
            avg_doc_len,
        }
    }

    fn accumulate(&self, tokens: &[String], boost: f64, scores: &mut [f64]) {
        let n = self.doc_lengths.len() as f64;
        let avg = self.avg_doc_len.max(1.0);

        for token in tokens {
            let Some(postings) = self.postings.get(token) else {
                continue;
            };
            let df = postings.len() as f64;
            let idf = ((n - df + 0.5) / (df + 0.5)).ln_1p();

            for &(pos, tf) in postings {
                let tf = f64::from(tf);
                let len_norm = 1.0 - BM25_B + BM25_B * f64::from(self.doc_lengths[pos]) / avg;
                scores[pos] += boost * idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * len_norm);
            }
        }
    }
}

/// Immutable lexical index over a fixed document set.
#[derive(Debug, Clone)]
pub struct Index {
    options: IndexOptions,
    documents: Vec<IndexableDocument>,
    fields: Vec<FieldIndex>,
    /// Per document: keyword field → value.
    keywords: Vec<HashMap<String, String>>,
}

impl Index {
    /// Build the index over `documents`, taking ownership of them.
    pub fn fit(options: IndexOptions, documents: Vec<IndexableDocument>) -> Self {
        let fields = options
            .text_fields
            .iter()
            .map(|name| FieldIndex::build(name, &documents))
            .collect();

        let keywords = documents
            .iter()
            .map(|doc| {
                options
                    .keyword_fields
                    .iter()
                    .filter_map(|name| doc.field(name).map(|v| (name.clone(), v.into_owned())))
                    .collect()
            })
            .collect();

        Self {
            options,
            documents,
            fields,
            keywords,
        }
    }

    /// Rank documents for `query`, best first.
    ///
    /// Returns at most `query.num_results` hits. An empty query, a query
    /// made only of stop words, or an empty index yields no results.
    pub fn search(&self, query: &SearchQuery<'_>) -> Vec<SearchResult> {
        if self.documents.is_empty() || query.num_results == 0 {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let tokens: Vec<String> = tokenize(query.text)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut scores = vec![0.0_f64; self.documents.len()];
        for field in &self.fields {
            let boost = query.boosts.get(&field.name).copied().unwrap_or(1.0);
            field.accumulate(&tokens, boost, &mut scores);
        }

        let mut ranked: Vec<(usize, f64)> = scores
            .into_iter()
            .enumerate()
            .filter(|&(pos, score)| score > 0.0 && self.matches_filters(pos, &query.filters))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(query.num_results);

        ranked
            .into_iter()
            .map(|(pos, score)| SearchResult {
                score,
                document: self.documents[pos].clone(),
            })
            .collect()
    }

    fn matches_filters(&self, pos: usize, filters: &HashMap<String, String>) -> bool {
        filters
            .iter()
            .all(|(field, wanted)| self.keywords[pos].get(field) == Some(wanted))
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// The indexed documents, in insertion order.
    pub fn documents(&self) -> &[IndexableDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Hex SHA-256 over the serialized document set.
    ///
    /// Two ingestion runs over the same archive with the same filter and
    /// chunking produce the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for doc in &self.documents {
            let bytes = serde_json::to_vec(doc).unwrap_or_default();
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(&bytes);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Lowercase, split on anything that is not a letter or digit, keep
/// tokens of two or more characters, drop English stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawDocument;

    fn corpus() -> Vec<IndexableDocument> {
        vec![
            RawDocument::new(
                "data-engineering/docker.md",
                "Docker compose fails to start postgres on Windows. Restart docker desktop.",
            )
            .with_metadata("section", "module-1")
            .into(),
            RawDocument::new(
                "data-engineering/kafka.md",
                "Kafka consumer cannot connect to the broker. Check the advertised listeners.",
            )
            .with_metadata("section", "module-6")
            .into(),
            RawDocument::new(
                "data-engineering/spark.md",
                "Spark job runs out of memory. Increase executor memory for the spark session.",
            )
            .with_metadata("section", "module-5")
            .into(),
            RawDocument::new("mlops/docker-registry.md", "Push images to a registry.")
                .with_metadata("section", "module-1")
                .into(),
        ]
    }

    fn index() -> Index {
        Index::fit(
            IndexOptions {
                text_fields: vec!["content".to_string(), "filename".to_string()],
                keyword_fields: vec!["section".to_string()],
            },
            corpus(),
        )
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("How do I run Spark-submit on GCP?"),
            vec!["run", "spark", "submit", "gcp"]
        );
        assert!(tokenize("").is_empty());
        assert!(tokenize("the a of").is_empty());
    }

    #[test]
    fn test_ranks_most_relevant_first() {
        let results = index().search(&SearchQuery::new("spark executor memory", 5));
        assert!(!results.is_empty());
        assert_eq!(results[0].document.filename(), "data-engineering/spark.md");
    }

    #[test]
    fn test_scores_descending() {
        let results = index().search(&SearchQuery::new("docker postgres registry", 5));
        assert!(results.len() >= 2);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_filename_is_searchable() {
        let results = index().search(&SearchQuery::new("kafka", 5));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.filename(), "data-engineering/kafka.md");
    }

    #[test]
    fn test_no_match_is_empty() {
        assert!(index().search(&SearchQuery::new("terraform", 5)).is_empty());
    }

    #[test]
    fn test_empty_query_is_empty() {
        assert!(index().search(&SearchQuery::new("", 5)).is_empty());
        assert!(index().search(&SearchQuery::new("   ", 5)).is_empty());
    }

    #[test]
    fn test_empty_index_is_empty() {
        let empty = Index::fit(IndexOptions::default(), Vec::new());
        assert!(empty.is_empty());
        assert!(empty.search(&SearchQuery::new("docker", 5)).is_empty());
    }

    #[test]
    fn test_num_results_bound() {
        let results = index().search(&SearchQuery::new("docker kafka spark registry", 2));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_keyword_filter() {
        let query = SearchQuery::new("docker", 5).filter("section", "module-1");
        let results = index().search(&query);
        assert_eq!(results.len(), 2);
        let query = SearchQuery::new("docker", 5).filter("section", "module-6");
        assert!(index().search(&query).is_empty());
    }

    #[test]
    fn test_boost_changes_ranking() {
        // "registry" appears in the content of one file and the filename of another.
        let docs: Vec<IndexableDocument> = vec![
            RawDocument::new("notes.md", "registry registry registry").into(),
            RawDocument::new("registry.md", "unrelated text").into(),
        ];
        let idx = Index::fit(IndexOptions::default(), docs);

        let plain = idx.search(&SearchQuery::new("registry", 5));
        assert_eq!(plain[0].document.filename(), "notes.md");

        let boosted = idx.search(&SearchQuery::new("registry", 5).boost("filename", 10.0));
        assert_eq!(boosted[0].document.filename(), "registry.md");
    }

    #[test]
    fn test_fingerprint_stable_and_sensitive() {
        assert_eq!(index().fingerprint(), index().fingerprint());

        let mut docs = corpus();
        docs.pop();
        let smaller = Index::fit(IndexOptions::default(), docs);
        assert_ne!(index().fingerprint(), smaller.fingerprint());
    }
}
