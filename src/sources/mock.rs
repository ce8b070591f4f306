//! Mock source for testing purposes.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::models::{ArticleMetadata, ArticleSections, FullTextDocument, SearchQuery, Section};
use crate::sources::{ArticleSource, SourceError};

#[derive(Debug, Clone)]
struct MockArticle {
    metadata: ArticleMetadata,
    full_text: Option<FullTextDocument>,
}

/// A mock source that serves predefined articles in insertion order.
#[derive(Debug, Default)]
pub struct MockSource {
    articles: Mutex<Vec<MockArticle>>,
    failing_metadata: Mutex<HashSet<String>>,
    failing_full_text: Mutex<HashSet<String>>,
    full_text_requests: Mutex<Vec<String>>,
}

impl MockSource {
    /// Create a new mock source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an article; `None` full text makes it unavailable.
    pub fn add_article(&self, metadata: ArticleMetadata, full_text: Option<FullTextDocument>) {
        let mut guard = self.articles.lock().unwrap();
        guard.push(MockArticle {
            metadata,
            full_text,
        });
    }

    /// Make metadata lookups for `id` fail.
    pub fn fail_metadata(&self, id: &str) {
        self.failing_metadata.lock().unwrap().insert(id.to_string());
    }

    /// Make full-text fetches for `id` fail even though availability reports true.
    pub fn fail_full_text(&self, id: &str) {
        self.failing_full_text.lock().unwrap().insert(id.to_string());
    }

    /// Ids whose full text was requested, in request order.
    pub fn full_text_requests(&self) -> Vec<String> {
        self.full_text_requests.lock().unwrap().clone()
    }

    fn find(&self, id: &str) -> Option<MockArticle> {
        let guard = self.articles.lock().unwrap();
        guard
            .iter()
            .find(|article| article.metadata.external_id == id)
            .cloned()
    }
}

#[async_trait]
impl ArticleSource for MockSource {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock Source"
    }

    async fn search_ids(&self, query: &SearchQuery) -> Result<Vec<String>, SourceError> {
        if query.query.trim().is_empty() {
            return Err(SourceError::InvalidRequest("empty query".to_string()));
        }
        let guard = self.articles.lock().unwrap();
        Ok(guard
            .iter()
            .take(query.page_size())
            .map(|article| article.metadata.external_id.clone())
            .collect())
    }

    async fn fetch_metadata(&self, id: &str) -> Result<ArticleMetadata, SourceError> {
        if self.failing_metadata.lock().unwrap().contains(id) {
            return Err(SourceError::Api {
                status: 500,
                message: format!("metadata failure for {}", id),
            });
        }
        self.find(id)
            .map(|article| article.metadata)
            .ok_or_else(|| SourceError::NotFound(id.to_string()))
    }

    async fn has_full_text(&self, id: &str) -> Result<bool, SourceError> {
        Ok(self
            .find(id)
            .is_some_and(|article| article.full_text.is_some()))
    }

    async fn fetch_full_text(&self, id: &str) -> Result<FullTextDocument, SourceError> {
        self.full_text_requests.lock().unwrap().push(id.to_string());
        if self.failing_full_text.lock().unwrap().contains(id) {
            return Err(SourceError::Api {
                status: 503,
                message: format!("full text failure for {}", id),
            });
        }
        self.find(id)
            .and_then(|article| article.full_text)
            .ok_or_else(|| SourceError::NotFound(id.to_string()))
    }

    fn article_url(&self, id: &str) -> String {
        format!("http://example.com/{}", id)
    }
}

/// Helper function to create article metadata for testing.
pub fn make_metadata(id: &str, title: &str, publication_date: &str) -> ArticleMetadata {
    ArticleMetadata::builder(id)
        .title(title)
        .author("Test A")
        .publication_date(publication_date)
        .journal_name("Test Journal")
        .doi(format!("10.0000/{}", id.to_lowercase()))
        .build()
}

/// Helper function to create a full-text document with the given sections.
pub fn make_document(sections: &[(Section, &str)]) -> FullTextDocument {
    let mut parsed = ArticleSections::new();
    for (section, text) in sections {
        parsed.append(*section, text);
    }
    FullTextDocument {
        sections: parsed,
        references: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_source_serves_articles() {
        let source = MockSource::new();
        source.add_article(
            make_metadata("PMC1", "First", "2024 Jan 1"),
            Some(make_document(&[(Section::Abstract, "Text.")])),
        );
        source.add_article(make_metadata("PMC2", "Second", "2023"), None);
        source.fail_metadata("PMC2");

        let ids = source.search_ids(&SearchQuery::new("anything")).await.unwrap();
        assert_eq!(ids, vec!["PMC1", "PMC2"]);

        assert_eq!(source.fetch_metadata("PMC1").await.unwrap().title, "First");
        assert!(source.fetch_metadata("PMC2").await.is_err());
        assert!(source.has_full_text("PMC1").await.unwrap());
        assert!(!source.has_full_text("PMC2").await.unwrap());

        let doc = source.fetch_full_text("PMC1").await.unwrap();
        assert_eq!(doc.sections.get(Section::Abstract), "Text.");
        assert_eq!(source.full_text_requests(), vec!["PMC1"]);
    }
}
