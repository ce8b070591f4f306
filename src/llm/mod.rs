//! Language model clients.
//!
//! The pipeline only needs single-turn chat completion: a system message, a
//! user prompt and a token cap in, the assistant's text out. [`LanguageModel`]
//! is that seam. [`OpenAiChatModel`] talks to any OpenAI-compatible
//! `/chat/completions` endpoint; [`ScriptedModel`] answers from a closure in
//! tests and demos.

pub mod mock;
mod openai;

pub use mock::ScriptedModel;
pub use openai::OpenAiChatModel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::utils::{Transient, TransientError};

/// One single-turn chat completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            max_tokens: 1024,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A chat completion backend
#[async_trait]
pub trait LanguageModel: Send + Sync + std::fmt::Debug {
    /// Model identifier sent to the backend
    fn model_id(&self) -> &str;

    /// Assistant text for the request
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Rate limit exceeded")]
    RateLimit(Option<u64>),

    #[error("API error [{status}]: {message}")]
    Api { status: u16, message: String },

    #[error("Empty completion")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(err.to_string())
        } else {
            LlmError::Http(err.to_string())
        }
    }
}

impl Transient for LlmError {
    fn transient(&self) -> Option<TransientError> {
        match self {
            LlmError::RateLimit(retry_after) => Some(TransientError::RateLimit(*retry_after)),
            LlmError::Http(_) => Some(TransientError::Network),
            LlmError::Timeout(_) => Some(TransientError::Timeout),
            LlmError::Api { status: 503, .. } => Some(TransientError::ServiceUnavailable),
            LlmError::Api { status, .. } if *status >= 500 => Some(TransientError::ServerError),
            _ => None,
        }
    }
}
