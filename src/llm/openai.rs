//! OpenAI-compatible chat completion client.

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use super::{ChatRequest, LanguageModel, LlmError};
use crate::config::Config;
use crate::utils::{with_retry, RetryConfig};

/// Client for `POST <base_url>/chat/completions`
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    retry: RetryConfig,
    client: reqwest::Client,
}

impl OpenAiChatModel {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, LlmError> {
        Self::with_timeout(base_url, model, api_key, Duration::from_secs(60))
    }

    fn with_timeout(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            temperature: 0.2,
            retry: RetryConfig::default(),
            client,
        })
    }

    /// Build from the `[llm]`, `[rate_limits]` and `[retry]` settings
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        Self::from_config_with_key(config, config.llm.resolved_api_key())
    }

    fn from_config_with_key(config: &Config, api_key: Option<String>) -> Result<Self, LlmError> {
        if api_key.is_none() && config.llm.base_url.contains("api.openai.com") {
            return Err(LlmError::Unavailable(
                "no API key configured (set OPENAI_API_KEY or llm.api_key)".to_string(),
            ));
        }

        Ok(Self::with_timeout(
            config.llm.base_url.clone(),
            config.llm.model.clone(),
            api_key,
            Duration::from_secs(config.rate_limits.request_timeout_secs),
        )?
        .temperature(config.llm.temperature)
        .retry(config.retry.llm()))
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Retry policy for rate-limited calls
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    async fn send(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let body = json!({
            "model":       &self.model,
            "messages": [
                {"role": "system", "content": &request.system},
                {"role": "user",   "content": &request.prompt},
            ],
            "max_tokens":  request.max_tokens,
            "temperature": self.temperature,
        });

        let mut builder = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let json = check_response_status(response).await?;
        parse_completion(&json)
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        with_retry(self.retry, || self.send(request)).await
    }
}

async fn check_response_status(response: reqwest::Response) -> Result<Value, LlmError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());
        return Err(LlmError::RateLimit(retry_after));
    }

    let text = response.text().await?;
    if !status.is_success() {
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        let message = body["error"]["message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .unwrap_or("unknown API error")
            .to_string();
        return Err(LlmError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(serde_json::from_str(&text)?)
}

fn parse_completion(json: &Value) -> Result<String, LlmError> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or(LlmError::EmptyResponse)
}
