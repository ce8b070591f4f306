//! Search request model.

use serde::{Deserialize, Serialize};

/// Upper bound on ids requested from the search endpoint per run
pub const MAX_SEARCH_RESULTS: usize = 20;

/// Search query parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text topic entered by the user
    pub query: String,

    /// Maximum number of ids to request (clamped to [`MAX_SEARCH_RESULTS`])
    pub max_results: usize,

    /// Restrict matches to title/abstract and the open access subset
    pub open_access_only: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_results: MAX_SEARCH_RESULTS,
            open_access_only: true,
        }
    }
}

impl SearchQuery {
    /// Create a new search query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Set maximum results
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Enable/disable the title/abstract + open access filter
    pub fn open_access_only(mut self, enabled: bool) -> Self {
        self.open_access_only = enabled;
        self
    }

    /// Effective page size sent to the search endpoint
    pub fn page_size(&self) -> usize {
        self.max_results.clamp(1, MAX_SEARCH_RESULTS)
    }

    /// Build the E-utilities search expression
    pub fn search_term(&self) -> String {
        let topic = self.query.trim();
        if self.open_access_only {
            format!("{} [Title/Abstract] AND open access[filter]", topic)
        } else {
            topic.to_string()
        }
    }
}
