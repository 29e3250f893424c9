use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bookinfo_core::RetryConfig;
use reqwest::header::RETRY_AFTER;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{Result, ResolveError};

// ─── RetryPolicy ──────────────────────────────────────────────────────────────

/// Exponential backoff wrapper for a fallible async operation.
///
/// The delay before attempt `n + 1` is `base_delay * multiplier^(n - 1)`,
/// capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            multiplier: config.multiplier,
            max_delay: config.max_delay(),
        }
    }

    /// Delay after the `failed_attempts`-th failure (1-based).
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        let factor = self
            .multiplier
            .saturating_pow(failed_attempts.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    /// Returns the last error on exhaustion.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.max_attempts => return Err(err),
                Err(err) => {
                    let mut delay = self.delay_for(attempt);
                    if let ResolveError::RateLimit(_, retry_after) = &err {
                        delay = delay
                            .max(Duration::from_secs(*retry_after))
                            .min(self.max_delay);
                    }
                    debug!(
                        "{label}: attempt {attempt}/{} failed ({err}), retrying in {delay:?}",
                        self.max_attempts
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

// ─── RateLimitedClient ────────────────────────────────────────────────────────

/// HTTP client that keeps a minimum spacing between requests across all
/// callers sharing it. Each call is a single attempt; wrap it in a
/// [`RetryPolicy`] for retries.
pub struct RateLimitedClient {
    client: reqwest::Client,
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RateLimitedClient {
    pub fn new(min_interval: Duration, timeout: Duration, user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            min_interval,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn get(&self, service: &str, url: &str) -> Result<String> {
        self.wait_for_rate_limit().await;
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            let wait = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0);
            return Err(ResolveError::RateLimit(service.to_string(), wait));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = service_error_message(&body)
                .unwrap_or_else(|| format!("HTTP {}: {body}", status.as_u16()));
            return Err(ResolveError::ApiError(service.to_string(), message));
        }

        resp.text().await.map_err(ResolveError::Http)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, service: &str, url: &str) -> Result<T> {
        let text = self.get(service, url).await?;
        serde_json::from_str(&text).map_err(|e| ResolveError::Parse(e.to_string()))
    }
}

/// Extract `error.message` from a JSON error envelope, if the body has one.
pub(crate) fn service_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    let message = error
        .get("message")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("unknown error");
    match error.get("code").and_then(serde_json::Value::as_i64) {
        Some(code) => Some(format!("{code}: {message}")),
        None => Some(message.to_string()),
    }
}
