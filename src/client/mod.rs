//! Authenticated HTTP client for the remote content service
//!
//! One [`HarvestClient`] is constructed per run and threaded through every
//! component that talks to the remote service; there is no process-global
//! session state. Every request goes through the shared rate limiter and
//! retry policy, so transient-failure handling lives at exactly one boundary.

mod limiter;
mod retry;

pub use limiter::RateLimiter;
pub use retry::RetryPolicy;

use crate::config::{HarvesterConfig, ServiceConfig};
use crate::{FrondError, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// HTTP client capability shared by page sources and item fetchers
#[derive(Debug)]
pub struct HarvestClient {
    http: Client,
    base: Url,
    retry: RetryPolicy,
    limiter: RateLimiter,
}

impl HarvestClient {
    /// Builds the run's client from service and harvester configuration.
    ///
    /// When `token-env` is configured, the named environment variable must
    /// hold a bearer token; how the token got there (CI secret, manual
    /// export) is outside the harvester's concern.
    pub fn new(service: &ServiceConfig, harvester: &HarvesterConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/html"));

        if let Some(var) = &service.token_env {
            let token = std::env::var(var)
                .map_err(|_| FrondError::MissingToken { var: var.clone() })?;
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| FrondError::MissingToken { var: var.clone() })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .user_agent(service.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        let base = Url::parse(&service.base_url)
            .map_err(|e| FrondError::Config(crate::ConfigError::InvalidUrl(e.to_string())))?;

        Ok(Self {
            http,
            base,
            retry: RetryPolicy::new(
                harvester.max_retries,
                Duration::from_millis(harvester.retry_backoff_ms),
            ),
            limiter: RateLimiter::new(Duration::from_millis(harvester.request_interval_ms)),
        })
    }

    /// Resolves a locator against the service base URL.
    ///
    /// Absolute http(s) locators pass through untouched; anything else is
    /// joined onto the base.
    pub fn resolve(&self, locator: &str) -> Result<Url> {
        match Url::parse(locator) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(url),
            _ => Ok(self.base.join(locator)?),
        }
    }

    /// Fetches a URL and decodes the response as JSON
    pub async fn get_json(&self, url: &Url) -> Result<serde_json::Value> {
        let response = self.get_with_retry(url).await?;
        response
            .json()
            .await
            .map_err(|e| FrondError::Transport {
                url: url.to_string(),
                reason: format!("invalid JSON body: {}", e),
            })
    }

    /// Fetches a URL and returns the response body as text
    pub async fn get_text(&self, url: &Url) -> Result<String> {
        let response = self.get_with_retry(url).await?;
        response.text().await.map_err(|e| FrondError::Transport {
            url: url.to_string(),
            reason: format!("failed to read body: {}", e),
        })
    }

    /// Sends one GET through the rate limiter, retrying transient failures.
    ///
    /// Authorization rejections are never retried: credentials are run-wide,
    /// so a 401/403 cannot succeed on a second attempt.
    async fn get_with_retry(&self, url: &Url) -> Result<reqwest::Response> {
        let mut attempt: u32 = 0;

        loop {
            self.limiter.acquire().await;

            let outcome = self.http.get(url.clone()).send().await;

            match outcome {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    if RetryPolicy::authorization_status(status) {
                        return Err(FrondError::Authorization {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }

                    if RetryPolicy::retryable_status(status) && self.retry.allows(attempt) {
                        let backoff = self.retry.backoff(attempt);
                        tracing::debug!(
                            "HTTP {} from {}, retrying in {:?} (attempt {})",
                            status,
                            url,
                            backoff,
                            attempt + 1
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(FrondError::Transport {
                        url: url.to_string(),
                        reason: transport_reason(status),
                    });
                }
                Err(e) => {
                    if RetryPolicy::retryable_error(&e) && self.retry.allows(attempt) {
                        let backoff = self.retry.backoff(attempt);
                        tracing::debug!(
                            "Network error for {}: {}, retrying in {:?}",
                            url,
                            e,
                            backoff
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(FrondError::Transport {
                        url: url.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

fn transport_reason(status: StatusCode) -> String {
    if RetryPolicy::retryable_status(status) {
        format!("HTTP {} (retries exhausted)", status.as_u16())
    } else {
        format!("HTTP {}", status.as_u16())
    }
}
