//! Per-section summarization.

use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::llm::{ChatRequest, LanguageModel, LlmError};
use crate::models::{EnrichedArticle, Section, SummarizedArticle};

pub const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a research summarizing assistant who generates concise, formatted summaries.";

/// User prompt asking for a table-ready summary of one section
pub fn summary_prompt(section: Section, text: &str) -> String {
    format!(
        "Summarize the {section} section of the scientific research article below in no more than \
         2-3 concise sentences. Leave out numbers, percentages and statistics unless they are \
         essential to the findings. Keep only the key points and avoid filler such as 'this study'. \
         Do not wrap the summary in square brackets or add words or punctuation that carry no \
         meaning. The summary will be shown in a table cell.\n\n\
         Here is the content:\n\n{text}\n\n\
         Reply with the summary text only.",
        section = section.label(),
        text = text,
    )
}

/// Trim a model reply and strip one pair of wrapping brackets; `None` if nothing is left
pub fn clean_summary(raw: &str) -> Option<String> {
    let mut text = raw.trim();
    if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        text = inner.trim();
    }
    (!text.is_empty()).then(|| text.to_string())
}

/// Summarizes every non-empty section of a batch of articles.
///
/// All section calls of all articles are issued as one batch; a shared
/// semaphore bounds how many are in flight.
#[derive(Debug, Clone)]
pub struct Summarizer {
    model: Arc<dyn LanguageModel>,
    permits: Arc<Semaphore>,
    max_tokens: u32,
}

impl Summarizer {
    pub fn new(model: Arc<dyn LanguageModel>, max_concurrent: usize, max_tokens: u32) -> Self {
        Self {
            model,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            max_tokens,
        }
    }

    /// One summarized record per input article, in input order.
    ///
    /// A section whose call fails is left out of that article's summaries.
    pub async fn summarize(&self, articles: &[EnrichedArticle]) -> Vec<SummarizedArticle> {
        let jobs: Vec<(usize, Section, &str)> = articles
            .iter()
            .enumerate()
            .flat_map(|(index, article)| {
                article
                    .sections
                    .filled()
                    .map(move |(section, text)| (index, section, text))
            })
            .collect();

        tracing::info!(
            "Summarizing {} sections across {} articles",
            jobs.len(),
            articles.len()
        );

        let results = join_all(jobs.into_iter().map(|(index, section, text)| async move {
            (index, section, self.summarize_section(section, text).await)
        }))
        .await;

        let mut summarized: Vec<SummarizedArticle> =
            articles.iter().map(SummarizedArticle::from_enriched).collect();

        for (index, section, result) in results {
            let article = &mut summarized[index];
            match result {
                Ok(Some(summary)) => {
                    article.summaries.insert(section, summary);
                }
                Ok(None) => tracing::warn!(
                    "Empty {} summary for {}",
                    section,
                    article.metadata.external_id
                ),
                Err(e) => tracing::warn!(
                    "Failed to summarize {} of {}: {}",
                    section,
                    article.metadata.external_id,
                    e
                ),
            }
        }

        summarized
    }

    async fn summarize_section(&self, section: Section, text: &str) -> Result<Option<String>, LlmError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| LlmError::Unavailable("summarizer is shut down".to_string()))?;

        let request = ChatRequest::new(SUMMARY_SYSTEM_PROMPT, summary_prompt(section, text))
            .max_tokens(self.max_tokens);
        let reply = self.model.complete(&request).await?;
        Ok(clean_summary(&reply))
    }
}
