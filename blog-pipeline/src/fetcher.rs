use crate::types::{FetchConfig, PipelineError, Result};
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// HTTP transport for feeds and article pages.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch a feed body, retrying transport errors and 5xx/429 responses.
    ///
    /// Every failure maps to [`PipelineError::FeedUnavailable`].
    pub async fn fetch_feed(&self, url: &str) -> Result<String> {
        let start_time = Instant::now();
        debug!("Fetching feed: {}", url);

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 32),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.retry_delay_seconds.max(1) * 60)),
            ..Default::default()
        };

        let mut last_error = String::from("no attempt made");

        for attempt in 0..=self.config.max_retries {
            match self.fetch_once(url).await {
                Ok(body) => {
                    info!(
                        "Fetched feed {} ({} bytes in {}ms)",
                        url,
                        body.len(),
                        start_time.elapsed().as_millis()
                    );
                    return Ok(body);
                }
                Err(FetchAttemptError::Permanent(reason)) => {
                    return Err(PipelineError::feed_unavailable(url, reason));
                }
                Err(FetchAttemptError::Transient(reason)) => {
                    last_error = reason;
                    if attempt < self.config.max_retries {
                        if let Some(delay) = backoff.next_backoff() {
                            warn!("Attempt {} failed for {}, retrying in {:?}", attempt + 1, url, delay);
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                    }
                    break;
                }
            }
        }

        warn!("Giving up on feed {} after {} attempt(s)", url, self.config.max_retries + 1);
        Err(PipelineError::feed_unavailable(url, last_error))
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<String, FetchAttemptError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchAttemptError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let reason = format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            );
            return Err(if is_retryable(status) {
                FetchAttemptError::Transient(reason)
            } else {
                FetchAttemptError::Permanent(reason)
            });
        }

        if let Some(content_length) = response.content_length() {
            let size_mb = content_length as usize / (1024 * 1024);
            if size_mb > self.config.max_feed_size_mb {
                return Err(FetchAttemptError::Permanent(format!("feed too large: {}MB", size_mb)));
            }
        }

        response
            .text()
            .await
            .map_err(|e| FetchAttemptError::Transient(e.to_string()))
    }

    /// Fetch an article page without retries.
    pub async fn fetch_full_content(&self, url: &str) -> Result<String> {
        debug!("Fetching full content from: {}", url);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(PipelineError::feed_unavailable(
                url,
                format!(
                    "HTTP {}: {}",
                    response.status().as_u16(),
                    response.status().canonical_reason().unwrap_or("Unknown")
                ),
            ));
        }

        Ok(response.text().await?)
    }
}

enum FetchAttemptError {
    Transient(String),
    Permanent(String),
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}
