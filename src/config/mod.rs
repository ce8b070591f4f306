//! Configuration management.

mod file_config;

pub use file_config::{find_config_file, load_config, ConfigFileError, CONFIG_FILE_NAME};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::RetryConfig;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// NCBI endpoints and credentials
    #[serde(default)]
    pub ncbi: NcbiConfig,

    /// Language model settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Selection and prompt sizing
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Rate limiting settings
    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    /// Retry ceilings and delays
    #[serde(default)]
    pub retry: RetrySettings,

    /// Where the CLI writes result collections
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// NCBI E-utilities and BioC endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NcbiConfig {
    #[serde(default = "default_esearch_url")]
    pub esearch_url: String,

    #[serde(default = "default_esummary_url")]
    pub esummary_url: String,

    /// Base of the BioC full-text service; `/BioC_xml/<id>/unicode` is appended
    #[serde(default = "default_bioc_base_url")]
    pub bioc_base_url: String,

    /// Base of public article pages; `/<id>/` is appended
    #[serde(default = "default_article_base_url")]
    pub article_base_url: String,

    /// Optional API key, raises NCBI's limit from 3 to 10 requests/second.
    /// Never written back to disk; `NCBI_API_KEY` is used when unset.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Tool name reported to NCBI
    #[serde(default = "default_tool")]
    pub tool: String,

    /// Contact address reported to NCBI
    #[serde(default)]
    pub email: Option<String>,
}

impl Default for NcbiConfig {
    fn default() -> Self {
        Self {
            esearch_url: default_esearch_url(),
            esummary_url: default_esummary_url(),
            bioc_base_url: default_bioc_base_url(),
            article_base_url: default_article_base_url(),
            api_key: None,
            tool: default_tool(),
            email: None,
        }
    }
}

impl NcbiConfig {
    /// Configured key, else `NCBI_API_KEY`
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), std::env::var(NCBI_API_KEY_VAR).ok())
    }
}

pub const NCBI_API_KEY_VAR: &str = "NCBI_API_KEY";
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

/// A non-empty configured key wins over the environment value
fn resolve_key(configured: Option<&str>, from_env: Option<String>) -> Option<String> {
    configured
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .or_else(|| from_env.filter(|key| !key.trim().is_empty()))
}

fn default_esearch_url() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi".to_string()
}

fn default_esummary_url() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esummary.fcgi".to_string()
}

fn default_bioc_base_url() -> String {
    "https://www.ncbi.nlm.nih.gov/research/bionlp/RESTful/pmcoa.cgi".to_string()
}

fn default_article_base_url() -> String {
    "https://www.ncbi.nlm.nih.gov/pmc/articles".to_string()
}

fn default_tool() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

/// OpenAI-compatible chat completion endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL; `/chat/completions` is appended
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Never written back to disk; `OPENAI_API_KEY` is used when unset
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Calls in flight at once
    #[serde(default = "default_llm_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            max_concurrent: default_llm_max_concurrent(),
        }
    }
}

impl LlmConfig {
    /// Configured key, else `OPENAI_API_KEY`
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), std::env::var(OPENAI_API_KEY_VAR).ok())
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_llm_max_concurrent() -> usize {
    4
}

/// Selection policy and prompt sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Ids requested from the search endpoint (at most 20)
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,

    /// Articles kept after recency sorting, before full text is fetched
    #[serde(default = "default_full_text_candidates")]
    pub full_text_candidates: usize,

    /// Articles kept after completeness sorting
    #[serde(default = "default_top_articles")]
    pub top_articles: usize,

    /// Generation cap for each section summary
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,

    /// Generation cap for the gap analysis
    #[serde(default = "default_gap_max_tokens")]
    pub gap_max_tokens: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_search_results: default_max_search_results(),
            full_text_candidates: default_full_text_candidates(),
            top_articles: default_top_articles(),
            summary_max_tokens: default_summary_max_tokens(),
            gap_max_tokens: default_gap_max_tokens(),
        }
    }
}

fn default_max_search_results() -> usize {
    20
}

fn default_full_text_candidates() -> usize {
    10
}

fn default_top_articles() -> usize {
    5
}

fn default_summary_max_tokens() -> u32 {
    150
}

fn default_gap_max_tokens() -> u32 {
    4096
}

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests per second across all NCBI calls (0 disables the limiter)
    #[serde(default = "default_rps")]
    pub requests_per_second: f32,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    /// Per-request socket timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rps(),
            max_concurrent_requests: default_max_concurrent(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_rps() -> f32 {
    3.0
}

fn default_max_concurrent() -> usize {
    10
}

fn default_request_timeout() -> u64 {
    60
}

/// Retry ceilings per call type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempts for search, summary and availability requests
    #[serde(default = "default_metadata_attempts")]
    pub metadata_attempts: u32,

    /// Attempts for full-text downloads
    #[serde(default = "default_full_text_attempts")]
    pub full_text_attempts: u32,

    /// Attempts for a single language model call
    #[serde(default = "default_llm_attempts")]
    pub llm_attempts: u32,

    /// First backoff delay; doubles on each further attempt
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Attempts for the gap analysis contract
    #[serde(default = "default_gap_attempts")]
    pub gap_attempts: u32,

    /// Fixed delay between gap analysis attempts
    #[serde(default = "default_gap_delay_ms")]
    pub gap_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            metadata_attempts: default_metadata_attempts(),
            full_text_attempts: default_full_text_attempts(),
            llm_attempts: default_llm_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            gap_attempts: default_gap_attempts(),
            gap_delay_ms: default_gap_delay_ms(),
        }
    }
}

impl RetrySettings {
    pub fn metadata(&self) -> RetryConfig {
        RetryConfig::exponential(self.metadata_attempts, self.initial_delay())
    }

    pub fn full_text(&self) -> RetryConfig {
        RetryConfig::exponential(self.full_text_attempts, self.initial_delay())
    }

    pub fn llm(&self) -> RetryConfig {
        RetryConfig::exponential(self.llm_attempts, self.initial_delay())
    }

    pub fn gap_analysis(&self) -> RetryConfig {
        RetryConfig::fixed(self.gap_attempts, Duration::from_millis(self.gap_delay_ms))
    }

    fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

fn default_metadata_attempts() -> u32 {
    3
}

fn default_full_text_attempts() -> u32 {
    5
}

fn default_llm_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_gap_attempts() -> u32 {
    3
}

fn default_gap_delay_ms() -> u64 {
    2000
}

/// Output location for the JSON collection files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_dir")]
    pub directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: default_storage_dir(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./research_articles")
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` for structured output, anything else for human-readable lines
    #[serde(default)]
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|format| format.eq_ignore_ascii_case("json"))
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
