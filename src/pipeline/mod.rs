//! End-to-end literature gap pipeline.
//!
//! Orchestrates one run for a free-text query:
//!   1. Search the source and fetch metadata for every hit
//!   2. Keep articles with full text available, score them by recency
//!   3. Fetch and parse full text for the most recent candidates
//!   4. Keep the most complete articles and persist them
//!   5. Summarize each section and persist the summaries
//!   6. Run the gap analysis and persist its records and comparison
//!
//! Individual failed lookups are logged and dropped; only storage errors
//! abort a run. Runs do not coordinate with each other, so two concurrent
//! runs against the same sink overwrite each other's collections.

pub mod gap_analysis;
pub mod scoring;
pub mod selection;
pub mod summarize;

pub use gap_analysis::{GapAnalysisError, GapAnalyzer};
pub use summarize::Summarizer;

use chrono::{NaiveDate, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::llm::LanguageModel;
use crate::models::{ArticleMetadata, EnrichedArticle, SearchQuery};
use crate::sources::ArticleSource;
use crate::storage::{Collection, DocumentSink, StorageError};
use crate::utils::RetryConfig;

/// Tunables for a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub max_search_results: usize,
    pub full_text_candidates: usize,
    pub top_articles: usize,
    pub summary_max_tokens: u32,
    pub gap_max_tokens: u32,
    pub llm_max_concurrent: usize,
    pub gap_retry: RetryConfig,
    /// Date recency is measured against; today when unset
    pub reference_date: Option<NaiveDate>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_search_results: config.pipeline.max_search_results,
            full_text_candidates: config.pipeline.full_text_candidates,
            top_articles: config
                .pipeline
                .top_articles
                .min(selection::MAX_SELECTED_ARTICLES),
            summary_max_tokens: config.pipeline.summary_max_tokens,
            gap_max_tokens: config.pipeline.gap_max_tokens,
            llm_max_concurrent: config.llm.max_concurrent,
            gap_retry: config.retry.gap_analysis(),
            reference_date: None,
        }
    }

    pub fn reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    /// Fixed delay between gap analysis attempts
    pub fn gap_retry_delay(mut self, delay: Duration) -> Self {
        self.gap_retry = RetryConfig::fixed(self.gap_retry.max_attempts, delay);
        self
    }
}

/// One selected article as shown in a run report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedArticle {
    pub external_id: String,
    pub title: String,
    pub publication_date: String,
    pub score: f64,
    pub filled_sections_ratio: f64,
    pub article_url: String,
}

impl From<&EnrichedArticle> for SelectedArticle {
    fn from(article: &EnrichedArticle) -> Self {
        Self {
            external_id: article.metadata.external_id.clone(),
            title: article.metadata.title.clone(),
            publication_date: article.metadata.publication_date.clone(),
            score: article.score(),
            filled_sections_ratio: article.filled_sections_ratio,
            article_url: article.article_url.clone(),
        }
    }
}

/// Summary of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub query: String,
    pub ids_found: usize,
    pub metadata_fetched: usize,
    pub full_text_available: usize,
    pub parsed: usize,
    pub selected: Vec<SelectedArticle>,
    pub summarized: usize,
    pub gap_records: usize,
    pub comparison_saved: bool,
    pub duration_ms: u64,
}

impl PipelineReport {
    fn new(query: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            query: query.to_string(),
            ids_found: 0,
            metadata_fetched: 0,
            full_text_available: 0,
            parsed: 0,
            selected: Vec::new(),
            summarized: 0,
            gap_records: 0,
            comparison_saved: false,
            duration_ms: 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// The literature gap pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    source: Arc<dyn ArticleSource>,
    sink: Arc<dyn DocumentSink>,
    summarizer: Summarizer,
    analyzer: GapAnalyzer,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn ArticleSource>,
        model: Arc<dyn LanguageModel>,
        sink: Arc<dyn DocumentSink>,
        settings: PipelineSettings,
    ) -> Self {
        let summarizer = Summarizer::new(
            model.clone(),
            settings.llm_max_concurrent,
            settings.summary_max_tokens,
        );
        let analyzer = GapAnalyzer::new(model, settings.gap_retry, settings.gap_max_tokens);
        Self {
            source,
            sink,
            summarizer,
            analyzer,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run the pipeline for `query`, replacing everything in the sink.
    #[instrument(skip(self), fields(source = self.source.id()))]
    pub async fn run(&self, query: &str) -> Result<PipelineReport, PipelineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PipelineError::EmptyQuery);
        }

        let started = Instant::now();
        let mut report = PipelineReport::new(query);
        info!(run_id = %report.run_id, "Starting pipeline run");

        for collection in Collection::ALL {
            self.sink.clear(collection).await?;
        }

        let mut articles = self.fetch_metadata(query, &mut report).await;
        articles = self.filter_available(articles).await;
        report.full_text_available = articles.len();

        let today = self
            .settings
            .reference_date
            .unwrap_or_else(|| Utc::now().date_naive());
        scoring::score_articles(&mut articles, today);
        scoring::sort_by_score(&mut articles);
        let candidates = selection::select_candidates(articles, self.settings.full_text_candidates);

        let parsed = self.fetch_full_texts(candidates).await;
        report.parsed = parsed.len();

        let selected = selection::rank_by_completeness(parsed, self.settings.top_articles);
        report.selected = selected.iter().map(SelectedArticle::from).collect();
        info!(
            "Selected {} of {} parsed articles",
            selected.len(),
            report.parsed
        );

        if selected.is_empty() {
            warn!("No articles with full text for {:?}", query);
            return Ok(self.finish(report, started));
        }

        self.sink
            .insert_many(Collection::RawArticles, to_documents(&selected)?)
            .await?;

        let summarized = self.summarizer.summarize(&selected).await;
        report.summarized = summarized.len();
        self.sink
            .insert_many(Collection::SummarizedArticles, to_documents(&summarized)?)
            .await?;

        if let Some(analysis) = self.analyzer.analyze(query, &summarized).await {
            for record in &analysis.records {
                self.sink
                    .insert_one(Collection::GapAnalysis, to_document(record)?)
                    .await?;
            }
            report.gap_records = analysis.records.len();

            self.sink
                .insert_one(Collection::Comparison, to_document(&analysis.comparison)?)
                .await?;
            report.comparison_saved = true;
        }

        Ok(self.finish(report, started))
    }

    /// Search, then fetch metadata for every id concurrently
    async fn fetch_metadata(&self, query: &str, report: &mut PipelineReport) -> Vec<ArticleMetadata> {
        let search = SearchQuery::new(query).max_results(self.settings.max_search_results);
        let ids = match self.source.search_ids(&search).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Search failed for {:?}: {}", query, e);
                return Vec::new();
            }
        };
        report.ids_found = ids.len();
        info!("Search returned {} ids", ids.len());

        let results = join_all(ids.iter().map(|id| self.source.fetch_metadata(id))).await;
        let articles: Vec<ArticleMetadata> = ids
            .iter()
            .zip(results)
            .filter_map(|(id, result)| match result {
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    warn!("Dropping {}: metadata fetch failed: {}", id, e);
                    None
                }
            })
            .collect();

        report.metadata_fetched = articles.len();
        info!("Fetched metadata for {} articles", articles.len());
        articles
    }

    /// Keep articles whose full text is available, preserving order
    async fn filter_available(&self, articles: Vec<ArticleMetadata>) -> Vec<ArticleMetadata> {
        let checks = join_all(
            articles
                .iter()
                .map(|article| self.source.has_full_text(&article.external_id)),
        )
        .await;

        articles
            .into_iter()
            .zip(checks)
            .filter_map(|(article, available)| match available {
                Ok(true) => Some(article),
                Ok(false) => {
                    debug!("No full text for {}", article.external_id);
                    None
                }
                Err(e) => {
                    warn!(
                        "Treating {} as unavailable: availability check failed: {}",
                        article.external_id, e
                    );
                    None
                }
            })
            .collect()
    }

    /// Fetch and parse full text concurrently; failures are dropped
    async fn fetch_full_texts(&self, candidates: Vec<ArticleMetadata>) -> Vec<EnrichedArticle> {
        let documents = join_all(
            candidates
                .iter()
                .map(|article| self.source.fetch_full_text(&article.external_id)),
        )
        .await;

        candidates
            .into_iter()
            .zip(documents)
            .filter_map(|(metadata, document)| match document {
                Ok(document) => {
                    let url = self.source.article_url(&metadata.external_id);
                    Some(EnrichedArticle::new(metadata, document, url))
                }
                Err(e) => {
                    warn!(
                        "Dropping {}: full text fetch failed: {}",
                        metadata.external_id, e
                    );
                    None
                }
            })
            .collect()
    }

    fn finish(&self, mut report: PipelineReport, started: Instant) -> PipelineReport {
        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            run_id = %report.run_id,
            selected = report.selected.len(),
            gap_records = report.gap_records,
            "Pipeline finished in {} ms",
            report.duration_ms
        );
        report
    }
}

fn to_document<T: Serialize>(item: &T) -> Result<Value, StorageError> {
    Ok(serde_json::to_value(item)?)
}

fn to_documents<T: Serialize>(items: &[T]) -> Result<Vec<Value>, StorageError> {
    items.iter().map(to_document).collect()
}
