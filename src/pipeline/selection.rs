//! Two-stage article selection.
//!
//! Stage one keeps the most recent candidates before any full text is
//! downloaded. Stage two, after parsing, prefers the most complete documents
//! and breaks ties by recency.

use std::cmp::Ordering;

use crate::models::{ArticleMetadata, EnrichedArticle};

/// Upper bound on articles kept after full-text ranking
pub const MAX_SELECTED_ARTICLES: usize = 5;

/// Keep the first `limit` articles of an already score-sorted list
pub fn select_candidates(mut articles: Vec<ArticleMetadata>, limit: usize) -> Vec<ArticleMetadata> {
    articles.truncate(limit);
    articles
}

/// Order by completeness then score (both descending, stable) and keep `limit`,
/// never more than [`MAX_SELECTED_ARTICLES`]
pub fn rank_by_completeness(mut articles: Vec<EnrichedArticle>, limit: usize) -> Vec<EnrichedArticle> {
    articles.sort_by(compare_completeness);
    articles.truncate(limit.min(MAX_SELECTED_ARTICLES));
    articles
}

fn compare_completeness(a: &EnrichedArticle, b: &EnrichedArticle) -> Ordering {
    b.filled_sections_ratio
        .total_cmp(&a.filled_sections_ratio)
        .then_with(|| b.score().total_cmp(&a.score()))
}
