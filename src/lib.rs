//! # research-gap
//!
//! Finds recent open-access PubMed Central articles for a topic, summarizes
//! their sections with a language model and asks the model for a
//! cross-article research gap analysis.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (ArticleMetadata, EnrichedArticle, GapAnalysis, etc.)
//! - [`sources`]: Article sources behind the [`ArticleSource`] trait (PMC, mock)
//! - [`llm`]: Chat-completion clients behind the [`LanguageModel`] trait
//! - [`storage`]: Document sinks the pipeline writes its collections to
//! - [`pipeline`]: Scoring, selection, summarization, gap analysis and the orchestrator
//! - [`utils`]: HTTP client, retry and text cleanup
//! - [`config`]: Configuration management

pub mod config;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod sources;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use llm::LanguageModel;
pub use models::{EnrichedArticle, GapAnalysis, SummarizedArticle};
pub use pipeline::{Pipeline, PipelineError, PipelineReport, PipelineSettings};
pub use sources::ArticleSource;
pub use storage::DocumentSink;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
