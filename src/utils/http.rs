//! HTTP client utilities.
//!
//! One [`HttpClient`] is shared by every request of a pipeline run. It owns
//! the pooled `reqwest` client, a semaphore that caps requests in flight and
//! a rate limiter sized to the upstream API's published limits.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::RateLimitConfig;
use crate::sources::SourceError;

/// Shared HTTP client with concurrency and rate limiting
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    permits: Arc<Semaphore>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("available_permits", &self.permits.available_permits())
            .field("rate_limited", &self.limiter.is_some())
            .finish()
    }
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::from_config(&RateLimitConfig::default())
    }

    /// Create a client honoring the given limits
    pub fn from_config(limits: &RateLimitConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(Duration::from_secs(limits.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(limits.max_concurrent_requests.max(1))),
            limiter: build_limiter(limits.requests_per_second).map(Arc::new),
        })
    }

    /// GET a URL and return the body of a successful response.
    ///
    /// 429 maps to [`SourceError::RateLimit`], 404 to [`SourceError::NotFound`],
    /// other non-success statuses to [`SourceError::Api`].
    pub async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String, SourceError> {
        let response = self.send_get(url, query).await?;
        if !response.status().is_success() {
            return Err(error_for_status(&response, url));
        }

        let body = response.text().await?;
        Ok(body)
    }

    /// Check a URL: `Ok(true)` for a success status, `Ok(false)` for any
    /// other status except 429, which is returned as a rate-limit error so
    /// callers can back off.
    pub async fn url_exists(&self, url: &str) -> Result<bool, SourceError> {
        let response = self.send_get(url, &[]).await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(error_for_status(&response, url));
        }
        Ok(status.is_success())
    }

    async fn send_get(&self, url: &str, query: &[(&str, &str)]) -> Result<Response, SourceError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| SourceError::Other("HTTP client is shut down".to_string()))?;

        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let response = self.client.get(url).query(query).send().await?;
        Ok(response)
    }
}

fn build_limiter(requests_per_second: f32) -> Option<DefaultDirectRateLimiter> {
    if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
        return None;
    }

    let period = Duration::from_secs_f64(1.0 / f64::from(requests_per_second));
    let burst = NonZeroU32::new(requests_per_second.ceil() as u32).unwrap_or(nonzero!(1u32));
    Quota::with_period(period).map(|quota| RateLimiter::direct(quota.allow_burst(burst)))
}

fn error_for_status(response: &Response, url: &str) -> SourceError {
    let status = response.status();
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok());
            SourceError::RateLimit(retry_after)
        }
        StatusCode::NOT_FOUND => SourceError::NotFound(url.to_string()),
        _ => SourceError::Api {
            status: status.as_u16(),
            message: format!("{} returned {}", url, status),
        },
    }
}
