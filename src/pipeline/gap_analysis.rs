//! Cross-article gap analysis.
//!
//! One model call covers the whole selection. The reply must contain a
//! single ```` ```json ```` fenced block holding per-article findings and a
//! comparison section. Replies that break that contract are retried a fixed
//! number of times; after that the run simply has no gap data.

use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};

use crate::llm::{ChatRequest, LanguageModel, LlmError};
use crate::models::{ComparisonRecord, GapAnalysis, GapCategory, GapRecord, Section, SummarizedArticle};
use crate::utils::{with_retry, RetryConfig, Transient, TransientError};

pub const GAP_SYSTEM_PROMPT: &str =
    "You are an expert research analyst assistant that performs gap analysis on research articles.";

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json\s*([\s\S]*?)\s*```").unwrap());

const RESPONSE_SCHEMA: &str = r#"{
  "analysis": [
    {
      "article_title": "Title of the article",
      "unique_gaps": ["Unique gap 1 with specific examples", "Unique gap 2 with detailed context"],
      "recommendations": ["Detailed recommendation 1", "Detailed recommendation 2"],
      "gap_categories": {
        "methodological": ["Detailed methodological gap with example"],
        "conceptual": ["Conceptual gap with context"],
        "empirical": ["Specific empirical gap and its importance"],
        "evidence": ["Evidence gap, why it matters, and what is missing"],
        "practical_knowledge": ["Specific practical knowledge gap with examples"],
        "theoretical": ["Theoretical gap and its implications"],
        "population_gap": ["Details on population gaps with specific groups mentioned"]
      }
    }
  ],
  "comparison_section": {
    "commonalities": ["Shared gaps across articles"],
    "contrasts": ["Differences in approach or focus between articles"],
    "emerging_trends": ["Trends or gaps that appear only in the most recent work"]
  }
}"#;

/// Why one gap analysis attempt was rejected
#[derive(Debug, thiserror::Error)]
pub enum GapAnalysisError {
    #[error("model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("reply has no ```json fenced block")]
    MissingJsonBlock,

    #[error("fenced block is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl Transient for GapAnalysisError {
    fn transient(&self) -> Option<TransientError> {
        Some(TransientError::InvalidResponse)
    }
}

/// Contents of the first ```` ```json ```` fenced block, trimmed
pub fn extract_json_block(reply: &str) -> Option<&str> {
    JSON_FENCE
        .captures(reply)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim())
}

/// One line per article: `- <title>: <abstract> + <methods> + <discussion>`
pub fn format_summaries(articles: &[SummarizedArticle]) -> String {
    articles
        .iter()
        .map(|article| {
            format!(
                "- {}: {} + {} + {}",
                article.metadata.title,
                article.summary(Section::Abstract).unwrap_or_default(),
                article.summary(Section::Methods).unwrap_or_default(),
                article.summary(Section::Discussion).unwrap_or_default(),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Human prompt for the analysis call
pub fn gap_prompt(query: &str, summaries: &str) -> String {
    let categories = GapCategory::ALL
        .iter()
        .map(|category| format!("- {}", category.label()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Analyze the following summaries of recent research articles in the field of {query}. \
         Identify the gaps in this research and suggest areas that need further study, explaining \
         each one in detail.\n\
         Categorize the gaps into these categories:\n{categories}\n\n\
         For every article give its title, the gaps unique to it and recommendations for further \
         research, with concrete context such as missing demographic groups, environmental \
         factors that were not measured or taxa that were not resolved. Compare the articles \
         where possible to surface methodological or conceptual gaps that are not obvious from \
         a single paper.\n\n\
         When recommending work:\n\
         - for methodological gaps, describe alternative techniques or improvements;\n\
         - for conceptual gaps, discuss interdisciplinary frameworks that could bridge fields;\n\
         - for empirical gaps, suggest specific data or data sources to collect;\n\
         - for evidence gaps, explain what evidence is missing and why it matters;\n\
         - for practical knowledge gaps, propose applied directions or industry collaborations;\n\
         - for population gaps, name the underrepresented groups and why they matter;\n\
         - for theoretical gaps, discuss new theories or changes to existing ones.\n\n\
         Reply with a single ```json fenced code block and nothing before or after it. \
         The JSON must follow this schema:\n{schema}\n\n\
         {summaries}",
        query = query,
        categories = categories,
        schema = RESPONSE_SCHEMA,
        summaries = summaries,
    )
}

/// Turn the parsed JSON into records.
///
/// Returns `None` when the analysis list is missing or empty, or when the
/// comparison section is missing.
pub fn parse_gap_response(value: &Value) -> Option<GapAnalysis> {
    let analysis = value.get("analysis")?.as_array()?;
    if analysis.is_empty() {
        return None;
    }
    let comparison = value.get("comparison_section")?.as_object()?;

    let records = analysis.iter().filter_map(parse_record).collect::<Vec<_>>();
    if records.is_empty() {
        return None;
    }

    Some(GapAnalysis {
        records,
        comparison: ComparisonRecord {
            commonalities: string_list(comparison.get("commonalities")),
            contrasts: string_list(comparison.get("contrasts")),
            emerging_trends: string_list(comparison.get("emerging_trends")),
        },
    })
}

fn parse_record(entry: &Value) -> Option<GapRecord> {
    let entry = entry.as_object()?;
    let title = entry
        .get("article_title")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let mut record = GapRecord::new(title);
    record.unique_gaps = string_list(entry.get("unique_gaps"));
    record.recommendations = string_list(entry.get("recommendations"));

    if let Some(categories) = entry.get("gap_categories").and_then(Value::as_object) {
        for (key, findings) in categories {
            match GapCategory::from_key(key) {
                Some(category) => record
                    .gap_categories
                    .entry(category)
                    .or_default()
                    .extend(string_list(Some(findings))),
                None => tracing::debug!("Ignoring unknown gap category {:?}", key),
            }
        }
    }
    Some(record)
}

/// Strings from a JSON array (or a lone string); other values are skipped
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Runs the gap analysis call with contract retries
#[derive(Debug, Clone)]
pub struct GapAnalyzer {
    model: Arc<dyn LanguageModel>,
    retry: RetryConfig,
    max_tokens: u32,
}

impl GapAnalyzer {
    pub fn new(model: Arc<dyn LanguageModel>, retry: RetryConfig, max_tokens: u32) -> Self {
        Self {
            model,
            retry,
            max_tokens,
        }
    }

    /// Analyze the summarized articles for `query`.
    ///
    /// Never fails: exhausted retries and incomplete replies both give `None`.
    pub async fn analyze(&self, query: &str, articles: &[SummarizedArticle]) -> Option<GapAnalysis> {
        if articles.is_empty() {
            return None;
        }

        let request = ChatRequest::new(GAP_SYSTEM_PROMPT, gap_prompt(query, &format_summaries(articles)))
            .max_tokens(self.max_tokens);

        match with_retry(self.retry, || self.attempt(&request)).await {
            Ok(Some(analysis)) => {
                tracing::info!(
                    "Gap analysis produced {} article records",
                    analysis.records.len()
                );
                Some(analysis)
            }
            Ok(None) => {
                tracing::warn!("Gap analysis reply had no article records or comparison section");
                None
            }
            Err(e) => {
                tracing::warn!(
                    "Gap analysis failed after {} attempts: {}",
                    self.retry.max_attempts,
                    e
                );
                None
            }
        }
    }

    async fn attempt(&self, request: &ChatRequest) -> Result<Option<GapAnalysis>, GapAnalysisError> {
        let reply = self.model.complete(request).await?;
        let block = extract_json_block(&reply).ok_or(GapAnalysisError::MissingJsonBlock)?;
        let value: Value = serde_json::from_str(block)?;
        Ok(parse_gap_response(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;
    use crate::models::ArticleMetadata;
    use std::time::Duration;

    const VALID_REPLY: &str = r#"Here you go:
```json
{
  "analysis": [
    {
      "article_title": "Gut flora in the elderly",
      "unique_gaps": ["No species-level resolution"],
      "recommendations": ["Use shotgun sequencing"],
      "gap_categories": {
        "Methodological": ["16S only"],
        "population": ["No non-European cohorts"],
        "practical knowledge": ["No clinical follow-up"],
        "astrology": ["ignored"]
      }
    }
  ],
  "comparison_section": {
    "commonalities": ["Small cohorts"],
    "contrasts": ["Different sequencing depth"],
    "emerging_trends": ["Multi-omics"]
  }
}
```"#;

    fn summarized(title: &str) -> SummarizedArticle {
        let metadata = ArticleMetadata::builder("PMC1").title(title).build();
        let mut article = SummarizedArticle {
            metadata,
            article_url: String::new(),
            filled_sections_ratio: 1.0,
            summaries: Default::default(),
        };
        article.summaries.insert(Section::Abstract, "Abs.".to_string());
        article.summaries.insert(Section::Discussion, "Disc.".to_string());
        article
    }

    fn analyzer(model: Arc<ScriptedModel>) -> GapAnalyzer {
        GapAnalyzer::new(model, RetryConfig::fixed(3, Duration::from_millis(5)), 4096)
    }

    #[test]
    fn test_extract_json_block() {
        assert_eq!(extract_json_block("```json\n{\"a\": 1}\n```"), Some("{\"a\": 1}"));
        assert_eq!(extract_json_block("text ```json {} ``` more"), Some("{}"));
        assert_eq!(extract_json_block("{\"a\": 1}"), None);
        assert_eq!(extract_json_block("```\n{}\n```"), None);
    }

    #[test]
    fn test_format_summaries_uses_empty_strings_for_missing() {
        let text = format_summaries(&[summarized("T1"), summarized("T2")]);
        assert_eq!(text, "- T1: Abs. +  + Disc.\n- T2: Abs. +  + Disc.");
    }

    #[test]
    fn test_prompt_mentions_query_and_categories() {
        let prompt = gap_prompt("microbiome", "- T: a + b + c");
        assert!(prompt.contains("in the field of microbiome"));
        assert!(prompt.contains("- Population Gap"));
        assert!(prompt.contains("\"comparison_section\""));
        assert!(prompt.ends_with("- T: a + b + c"));
    }

    #[test]
    fn test_parse_normalizes_categories() {
        let value: Value = serde_json::from_str(extract_json_block(VALID_REPLY).unwrap()).unwrap();
        let analysis = parse_gap_response(&value).unwrap();

        assert_eq!(analysis.records.len(), 1);
        let record = &analysis.records[0];
        assert_eq!(record.article_title, "Gut flora in the elderly");
        assert_eq!(record.category(GapCategory::Methodological), ["16S only"]);
        assert_eq!(record.category(GapCategory::PopulationGap), ["No non-European cohorts"]);
        assert_eq!(record.category(GapCategory::PracticalKnowledge), ["No clinical follow-up"]);
        assert!(record.category(GapCategory::Theoretical).is_empty());
        assert_eq!(record.gap_categories.len(), 7);
        assert_eq!(analysis.comparison.emerging_trends, vec!["Multi-omics"]);
    }

    #[test]
    fn test_parse_incomplete_responses() {
        let empty: Value = serde_json::json!({"analysis": [], "comparison_section": {}});
        assert!(parse_gap_response(&empty).is_none());

        let no_comparison: Value = serde_json::json!({
            "analysis": [{"article_title": "T", "gap_categories": {}}]
        });
        assert!(parse_gap_response(&no_comparison).is_none());
    }

    #[tokio::test]
    async fn test_analyze_success() {
        let model = Arc::new(ScriptedModel::constant(VALID_REPLY));
        let analysis = analyzer(model.clone())
            .analyze("microbiome", &[summarized("Gut flora in the elderly")])
            .await
            .unwrap();

        assert_eq!(analysis.records.len(), 1);
        assert_eq!(model.call_count(), 1);
        let call = &model.calls()[0];
        assert_eq!(call.system, GAP_SYSTEM_PROMPT);
        assert_eq!(call.max_tokens, 4096);
    }

    #[tokio::test]
    async fn test_missing_fence_retries_then_gives_up() {
        let model = Arc::new(ScriptedModel::constant("{\"analysis\": []}"));
        let result = analyzer(model.clone()).analyze("q", &[summarized("T")]).await;

        assert!(result.is_none());
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn test_recovers_on_later_attempt() {
        let model = Arc::new(ScriptedModel::from_fn(|_, index| match index {
            0 => Ok("```json\n{not json\n```".to_string()),
            1 => Err(LlmError::EmptyResponse),
            _ => Ok(VALID_REPLY.to_string()),
        }));
        let result = analyzer(model.clone()).analyze("q", &[summarized("T")]).await;

        assert!(result.is_some());
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_analysis_is_not_retried() {
        let model = Arc::new(ScriptedModel::constant(
            "```json\n{\"analysis\": [], \"comparison_section\": {}}\n```",
        ));
        let result = analyzer(model.clone()).analyze("q", &[summarized("T")]).await;

        assert!(result.is_none());
        assert_eq!(model.call_count(), 1);
    }
}
