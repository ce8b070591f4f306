//! Article records produced by the retrieval and enrichment stages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default title when the summary record has none
pub const NO_TITLE: &str = "No Title Available";

/// Default DOI when the summary record has none
pub const NO_DOI: &str = "No DOI Available";

/// One of the six canonical structural parts of a paper
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Abstract,
    Introduction,
    Methods,
    Results,
    Discussion,
    Conclusion,
}

impl Section {
    /// All canonical sections, in classification priority order
    pub const ALL: [Section; 6] = [
        Section::Abstract,
        Section::Introduction,
        Section::Methods,
        Section::Results,
        Section::Discussion,
        Section::Conclusion,
    ];

    /// Storage key
    pub fn key(&self) -> &'static str {
        match self {
            Section::Abstract => "abstract",
            Section::Introduction => "introduction",
            Section::Methods => "methods",
            Section::Results => "results",
            Section::Discussion => "discussion",
            Section::Conclusion => "conclusion",
        }
    }

    /// Human-readable name used in prompts
    pub fn label(&self) -> &'static str {
        match self {
            Section::Abstract => "Abstract",
            Section::Introduction => "Introduction",
            Section::Methods => "Methods",
            Section::Results => "Results",
            Section::Discussion => "Discussion",
            Section::Conclusion => "Conclusion",
        }
    }

    /// Substring that identifies this section in a passage label
    pub fn keyword(&self) -> &'static str {
        match self {
            Section::Abstract => "abstract",
            Section::Introduction => "intro",
            Section::Methods => "method",
            Section::Results => "result",
            Section::Discussion => "discuss",
            Section::Conclusion => "concl",
        }
    }

    /// Map a declared section-type label onto a canonical section.
    ///
    /// Matching is a case-insensitive substring test; the first section in
    /// [`Section::ALL`] whose keyword occurs wins.
    pub fn classify(label: &str) -> Option<Section> {
        let label = label.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|section| label.contains(section.keyword()))
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Cleaned text for each canonical section.
///
/// All six sections are always present; an absent section is an empty string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ArticleSections(BTreeMap<Section, String>);

impl ArticleSections {
    pub fn new() -> Self {
        Self(
            Section::ALL
                .into_iter()
                .map(|section| (section, String::new()))
                .collect(),
        )
    }

    /// Text of a section (empty when nothing was parsed)
    pub fn get(&self, section: Section) -> &str {
        self.0.get(&section).map(String::as_str).unwrap_or_default()
    }

    /// Append text to a section, separated from earlier text by a space
    pub fn append(&mut self, section: Section, text: &str) {
        if text.is_empty() {
            return;
        }
        let bucket = self.0.entry(section).or_default();
        if !bucket.is_empty() {
            bucket.push(' ');
        }
        bucket.push_str(text);
    }

    /// Number of sections with non-empty text
    pub fn filled_count(&self) -> usize {
        self.0.values().filter(|text| !text.is_empty()).count()
    }

    /// Fraction of canonical sections that are non-empty, in [0, 1]
    pub fn completeness_ratio(&self) -> f64 {
        self.filled_count() as f64 / Section::ALL.len() as f64
    }

    /// Iterate over sections that carry text
    pub fn filled(&self) -> impl Iterator<Item = (Section, &str)> {
        self.0
            .iter()
            .filter(|(_, text)| !text.is_empty())
            .map(|(section, text)| (*section, text.as_str()))
    }
}

impl Default for ArticleSections {
    fn default() -> Self {
        Self::new()
    }
}

/// Parsed full-text document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FullTextDocument {
    pub sections: ArticleSections,

    /// Formatted bibliography entries
    pub references: Vec<String>,
}

/// Bibliographic metadata for one article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleMetadata {
    /// Stable identifier assigned by the repository (e.g. `PMC1234567`)
    pub external_id: String,

    pub title: String,

    /// Authors in publication order
    pub authors: Vec<String>,

    /// Publication date as reported by the source (e.g. `2024 Mar 5`)
    pub publication_date: String,

    pub journal_name: String,

    pub doi: String,

    /// Recency score, set by the scorer
    #[serde(default)]
    pub score: f64,
}

impl ArticleMetadata {
    /// Create a record with the documented fallback values
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            title: NO_TITLE.to_string(),
            authors: Vec::new(),
            publication_date: String::new(),
            journal_name: String::new(),
            doi: NO_DOI.to_string(),
            score: 0.0,
        }
    }

    pub fn builder(external_id: impl Into<String>) -> ArticleMetadataBuilder {
        ArticleMetadataBuilder {
            metadata: Self::new(external_id),
        }
    }
}

/// Builder for constructing [`ArticleMetadata`]
#[derive(Debug, Clone)]
pub struct ArticleMetadataBuilder {
    metadata: ArticleMetadata,
}

impl ArticleMetadataBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = title.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.metadata.authors.push(author.into());
        self
    }

    pub fn authors(mut self, authors: Vec<String>) -> Self {
        self.metadata.authors = authors;
        self
    }

    pub fn publication_date(mut self, date: impl Into<String>) -> Self {
        self.metadata.publication_date = date.into();
        self
    }

    pub fn journal_name(mut self, journal: impl Into<String>) -> Self {
        self.metadata.journal_name = journal.into();
        self
    }

    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        self.metadata.doi = doi.into();
        self
    }

    pub fn score(mut self, score: f64) -> Self {
        self.metadata.score = score;
        self
    }

    pub fn build(self) -> ArticleMetadata {
        self.metadata
    }
}

/// Metadata joined with parsed full text: the unit of ranking and persistence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedArticle {
    #[serde(flatten)]
    pub metadata: ArticleMetadata,

    #[serde(flatten)]
    pub sections: ArticleSections,

    /// Fraction of canonical sections populated, in [0, 1]
    pub filled_sections_ratio: f64,

    pub article_url: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

impl EnrichedArticle {
    pub fn new(
        metadata: ArticleMetadata,
        document: FullTextDocument,
        article_url: impl Into<String>,
    ) -> Self {
        let filled_sections_ratio = document.sections.completeness_ratio();
        Self {
            metadata,
            sections: document.sections,
            filled_sections_ratio,
            article_url: article_url.into(),
            references: document.references,
        }
    }

    pub fn score(&self) -> f64 {
        self.metadata.score
    }
}

/// An enriched article whose section texts were replaced by model summaries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummarizedArticle {
    #[serde(flatten)]
    pub metadata: ArticleMetadata,

    pub article_url: String,

    pub filled_sections_ratio: f64,

    /// Only sections that were summarized successfully
    #[serde(flatten)]
    pub summaries: BTreeMap<Section, String>,
}

impl SummarizedArticle {
    /// Start a summarized record from an enriched article, dropping its long-form text
    pub fn from_enriched(article: &EnrichedArticle) -> Self {
        Self {
            metadata: article.metadata.clone(),
            article_url: article.article_url.clone(),
            filled_sections_ratio: article.filled_sections_ratio,
            summaries: BTreeMap::new(),
        }
    }

    pub fn summary(&self, section: Section) -> Option<&str> {
        self.summaries.get(&section).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_always_have_six_keys() {
        let sections = ArticleSections::new();
        let json = serde_json::to_value(&sections).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["abstract", "conclusion", "discussion", "introduction", "methods", "results"]
        );
        assert_eq!(sections.completeness_ratio(), 0.0);
    }

    #[test]
    fn test_append_concatenates_in_order() {
        let mut sections = ArticleSections::new();
        sections.append(Section::Methods, "First part.");
        sections.append(Section::Methods, "");
        sections.append(Section::Methods, "Second part.");
        assert_eq!(sections.get(Section::Methods), "First part. Second part.");
        assert_eq!(sections.filled_count(), 1);
    }

    #[test]
    fn test_completeness_ratio_full() {
        let mut sections = ArticleSections::new();
        for section in Section::ALL {
            sections.append(section, "text");
        }
        assert_eq!(sections.completeness_ratio(), 1.0);
    }

    #[test]
    fn test_classify_labels() {
        assert_eq!(Section::classify("ABSTRACT"), Some(Section::Abstract));
        assert_eq!(Section::classify("INTRO"), Some(Section::Introduction));
        assert_eq!(Section::classify("METHODS"), Some(Section::Methods));
        assert_eq!(Section::classify("RESULTS"), Some(Section::Results));
        assert_eq!(Section::classify("DISCUSS"), Some(Section::Discussion));
        assert_eq!(Section::classify("CONCL"), Some(Section::Conclusion));
        assert_eq!(Section::classify("REF"), None);
        assert_eq!(Section::classify("TABLE"), None);
    }

    #[test]
    fn test_classify_first_keyword_wins() {
        // "results and discussion" contains both keywords; results comes first
        assert_eq!(
            Section::classify("Results and Discussion"),
            Some(Section::Results)
        );
    }

    #[test]
    fn test_metadata_defaults() {
        let metadata = ArticleMetadata::new("PMC1");
        assert_eq!(metadata.title, NO_TITLE);
        assert_eq!(metadata.doi, NO_DOI);
        assert!(metadata.authors.is_empty());
        assert_eq!(metadata.score, 0.0);
    }

    #[test]
    fn test_enriched_article_serializes_flat() {
        let mut document = FullTextDocument::default();
        document.sections.append(Section::Abstract, "An abstract.");
        let metadata = ArticleMetadata::builder("PMC42")
            .title("Gut flora")
            .author("Smith J")
            .build();

        let article = EnrichedArticle::new(metadata, document, "https://example.com/PMC42");
        let json = serde_json::to_value(&article).unwrap();

        assert_eq!(json["external_id"], "PMC42");
        assert_eq!(json["abstract"], "An abstract.");
        assert_eq!(json["methods"], "");
        assert!(json.get("references").is_none());
        assert!((article.filled_sections_ratio - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_summarized_article_only_has_summarized_keys() {
        let article = EnrichedArticle::new(
            ArticleMetadata::new("PMC7"),
            FullTextDocument::default(),
            "https://example.com/PMC7",
        );
        let mut summarized = SummarizedArticle::from_enriched(&article);
        summarized
            .summaries
            .insert(Section::Results, "Short summary.".to_string());

        let json = serde_json::to_value(&summarized).unwrap();
        assert_eq!(json["results"], "Short summary.");
        assert!(json.get("abstract").is_none());
        assert_eq!(summarized.summary(Section::Results), Some("Short summary."));
    }
}
