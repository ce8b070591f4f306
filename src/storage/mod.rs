//! Document sinks for pipeline output.
//!
//! Results land in four named collections. A run first clears every
//! collection, then inserts documents as stages complete; nothing is
//! merged with earlier runs.

mod json_dir;
mod memory;

pub use json_dir::JsonDirSink;
pub use memory::MemorySink;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Target collections written by a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Enriched articles with full section text
    RawArticles,
    /// Articles with per-section summaries
    SummarizedArticles,
    /// One document per analysed article
    GapAnalysis,
    /// The cross-article comparison
    Comparison,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::RawArticles,
        Collection::SummarizedArticles,
        Collection::GapAnalysis,
        Collection::Comparison,
    ];

    /// Storage name of the collection
    pub fn name(&self) -> &'static str {
        match self {
            Collection::RawArticles => "raw_fields_article",
            Collection::SummarizedArticles => "summarized_fields_article",
            Collection::GapAnalysis => "gap_analysis",
            Collection::Comparison => "comparison_section",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised by a document sink
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Destination for pipeline documents
#[async_trait]
pub trait DocumentSink: Send + Sync + std::fmt::Debug {
    /// Remove every document from the collection
    async fn clear(&self, collection: Collection) -> Result<(), StorageError>;

    /// Append documents, returning how many were written
    async fn insert_many(
        &self,
        collection: Collection,
        documents: Vec<Value>,
    ) -> Result<usize, StorageError>;

    /// Append one document
    async fn insert_one(&self, collection: Collection, document: Value) -> Result<(), StorageError> {
        self.insert_many(collection, vec![document]).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_names() {
        let names: Vec<_> = Collection::ALL.iter().map(Collection::name).collect();
        assert_eq!(
            names,
            vec![
                "raw_fields_article",
                "summarized_fields_article",
                "gap_analysis",
                "comparison_section"
            ]
        );
        assert_eq!(Collection::Comparison.to_string(), "comparison_section");
    }
}
