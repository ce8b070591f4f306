//! Core data models for articles, searches and gap analysis.

mod article;
mod gap;
mod search;

pub use article::{
    ArticleMetadata, ArticleMetadataBuilder, ArticleSections, EnrichedArticle, FullTextDocument,
    Section, SummarizedArticle, NO_DOI, NO_TITLE,
};
pub use gap::{ComparisonRecord, GapAnalysis, GapCategory, GapRecord};
pub use search::{SearchQuery, MAX_SEARCH_RESULTS};
