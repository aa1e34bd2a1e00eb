//! The bounded search capability handed to the agent.
//!
//! [`SearchTool`] is a read-only view over a built [`Index`]: every call
//! returns at most `num_results` hits, best first, and never fails. An
//! empty query or an empty index simply yields no results.
//!
//! Field boosts are fixed when the tool is built. Exact-match filters can
//! be passed per query, but only on the index's keyword fields.
//!
//! [`SearchSlot`] covers the window between process start and the end of
//! warm-up: handlers can hold the slot before the index exists, and
//! queries fail with [`CoreError::SearchUnavailable`] until a tool is
//! installed.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::error::{CoreError, Result};
use crate::index::{Index, SearchQuery};
use crate::models::SearchResult;

/// Results returned per query unless configured otherwise.
pub const DEFAULT_NUM_RESULTS: usize = 5;

/// Bounded, read-only query interface over an [`Index`].
#[derive(Debug, Clone)]
pub struct SearchTool {
    index: Arc<Index>,
    num_results: usize,
    boosts: HashMap<String, f64>,
}

impl SearchTool {
    pub fn new(index: Arc<Index>) -> Self {
        Self::with_limit(index, DEFAULT_NUM_RESULTS)
    }

    /// A `limit` of zero is raised to one.
    pub fn with_limit(index: Arc<Index>, limit: usize) -> Self {
        Self {
            index,
            num_results: limit.max(1),
            boosts: HashMap::new(),
        }
    }

    /// Multiply the score of each named text field by its weight.
    pub fn with_boosts(mut self, boosts: HashMap<String, f64>) -> Self {
        self.boosts = boosts;
        self
    }

    /// Return up to `num_results` documents ranked by relevance.
    pub fn search(&self, query: &str) -> Vec<SearchResult> {
        self.index.search(&self.query(query))
    }

    /// Like [`search`](Self::search), keeping only documents whose keyword
    /// fields equal the given values.
    ///
    /// Filtering on a field that is not a keyword field of the index is an
    /// [`CoreError::InvalidParameter`].
    pub fn search_filtered(
        &self,
        query: &str,
        filters: &HashMap<String, String>,
    ) -> Result<Vec<SearchResult>> {
        let keyword_fields = &self.index.options().keyword_fields;
        let mut search = self.query(query);
        for (field, value) in filters {
            if !keyword_fields.contains(field) {
                return Err(CoreError::InvalidParameter(format!(
                    "cannot filter on '{}': not a keyword field",
                    field
                )));
            }
            search = search.filter(field.as_str(), value.as_str());
        }
        Ok(self.index.search(&search))
    }

    fn query<'a>(&self, text: &'a str) -> SearchQuery<'a> {
        SearchQuery {
            boosts: self.boosts.clone(),
            ..SearchQuery::new(text, self.num_results)
        }
    }

    pub fn boosts(&self) -> &HashMap<String, f64> {
        &self.boosts
    }

    pub fn num_results(&self) -> usize {
        self.num_results
    }

    pub fn index(&self) -> &Index {
        &self.index
    }
}

/// Install-once holder for a [`SearchTool`].
#[derive(Debug, Clone, Default)]
pub struct SearchSlot {
    inner: Arc<OnceLock<SearchTool>>,
}

impl SearchSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the tool. Fails if a tool was already installed.
    pub fn install(&self, tool: SearchTool) -> Result<()> {
        self.inner
            .set(tool)
            .map_err(|_| CoreError::AlreadyInstalled)
    }

    pub fn get(&self) -> Result<&SearchTool> {
        self.inner.get().ok_or(CoreError::SearchUnavailable)
    }

    pub fn is_ready(&self) -> bool {
        self.inner.get().is_some()
    }

    pub fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        Ok(self.get()?.search(query))
    }

    pub fn search_filtered(
        &self,
        query: &str,
        filters: &HashMap<String, String>,
    ) -> Result<Vec<SearchResult>> {
        self.get()?.search_filtered(query, filters)
    }
}
