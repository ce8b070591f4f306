//! Article sources.
//!
//! The pipeline talks to a literature database through the [`ArticleSource`]
//! trait: a search that yields identifiers, a metadata lookup, a cheap
//! full-text availability check and the full-text fetch itself.
//! [`PmcSource`] implements it against NCBI's E-utilities and BioC services;
//! [`MockSource`] serves canned articles for tests and demos.

mod bioc;
pub mod mock;
mod pmc;

pub use bioc::parse_bioc_xml;
pub use mock::MockSource;
pub use pmc::PmcSource;

use async_trait::async_trait;

use crate::models::{ArticleMetadata, FullTextDocument, SearchQuery};
use crate::utils::{Transient, TransientError};

/// Interface to a literature database.
///
/// Identifiers are the source's canonical external ids (for PMC, the
/// `PMC`-prefixed accession). Every method may be called concurrently.
#[async_trait]
pub trait ArticleSource: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g. "pmc")
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Identifiers of articles matching the query, in the source's relevance order
    async fn search_ids(&self, query: &SearchQuery) -> Result<Vec<String>, SourceError>;

    /// Bibliographic metadata for one article
    async fn fetch_metadata(&self, id: &str) -> Result<ArticleMetadata, SourceError>;

    /// Whether full text can be fetched for the article
    async fn has_full_text(&self, id: &str) -> Result<bool, SourceError>;

    /// Full text of the article, split into canonical sections
    async fn fetch_full_text(&self, id: &str) -> Result<FullTextDocument, SourceError>;

    /// Public landing page of the article
    fn article_url(&self, id: &str) -> String;
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Parsing error (XML, JSON)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded, with the server's Retry-After in seconds if given
    #[error("Rate limit exceeded")]
    RateLimit(Option<u64>),

    /// Article not found
    #[error("Article not found: {0}")]
    NotFound(String),

    /// Unexpected status from the source
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<quick_xml::DeError> for SourceError {
    fn from(err: quick_xml::DeError) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}

impl From<quick_xml::Error> for SourceError {
    fn from(err: quick_xml::Error) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}

impl Transient for SourceError {
    fn transient(&self) -> Option<TransientError> {
        match self {
            SourceError::RateLimit(retry_after) => Some(TransientError::RateLimit(*retry_after)),
            SourceError::Network(_) => Some(TransientError::Network),
            SourceError::Timeout(_) => Some(TransientError::Timeout),
            SourceError::Api { status: 503, .. } => Some(TransientError::ServiceUnavailable),
            SourceError::Api { status, .. } if *status >= 500 => Some(TransientError::ServerError),
            _ => None,
        }
    }
}
