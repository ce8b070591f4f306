//! Shared plumbing for the pipeline stages.
//!
//! - [`HttpClient`]: rate-limited HTTP client used by the article sources
//! - [`with_retry`] and [`RetryConfig`]: retry with backoff for transient failures
//! - [`clean_section_text`]: normalization of extracted section text

mod http;
mod retry;
mod text;

pub use http::HttpClient;
pub use retry::{with_retry, RetryConfig, Transient, TransientError};
pub use text::clean_section_text;
