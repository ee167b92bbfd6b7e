//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the sync, including:
//! - Building HTTP clients with proper user agent strings
//! - Pacing every request through the shared `Pacer`
//! - Bounded retry with exponential backoff for transient failures
//! - Error classification

use crate::config::{Config, CrawlerConfig, UserAgentConfig};
use crate::crawler::pacer::Pacer;
use crate::SyncError;
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct RawPage {
    /// Final URL after redirects
    pub url: String,
    /// Page body content
    pub body: String,
}

/// Transport-level failure for one URL
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    #[error("Connection to {url} failed: {message}")]
    Connect { url: String, message: String },

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed
    ///
    /// | Condition | Retryable |
    /// |-----------|-----------|
    /// | Timeout | yes |
    /// | Connection failure | yes |
    /// | HTTP 429 | yes |
    /// | HTTP 5xx | yes |
    /// | Other HTTP status | no |
    /// | Other request error | no |
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connect { .. } => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Request { .. } => false,
        }
    }

    /// The URL the failure belongs to
    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. }
            | Self::Timeout { url }
            | Self::Connect { url, .. }
            | Self::Request { url, .. } => url,
        }
    }

    fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        let url = url.to_string();
        if error.is_timeout() {
            Self::Timeout { url }
        } else if error.is_connect() {
            Self::Connect {
                url,
                message: error.to_string(),
            }
        } else {
            Self::Request {
                url,
                message: error.to_string(),
            }
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Whole-request timeout
///
/// # Example
///
/// ```no_run
/// use olympedia_sync::config::UserAgentConfig;
/// use olympedia_sync::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "OlympediaSync".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "ops@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Bounded retry schedule for transient transport failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every later one
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Backoff before retry number `retry` (0-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        self.base_backoff.saturating_mul(1u32 << retry.min(16))
    }
}

/// Paced, retrying page fetcher shared by every worker of a pass
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    pacer: Arc<Pacer>,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(client: Client, pacer: Arc<Pacer>, retry: RetryPolicy) -> Self {
        Self {
            client,
            pacer,
            retry,
        }
    }

    /// Builds a fetcher from the `[crawler]` and `[user-agent]` sections
    pub fn from_config(config: &Config) -> Result<Self, SyncError> {
        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.crawler.request_timeout_secs),
        )?;
        let pacer = Arc::new(Pacer::new(Duration::from_millis(
            config.crawler.request_delay_ms,
        )));
        Ok(Self::new(
            client,
            pacer,
            RetryPolicy::from_config(&config.crawler),
        ))
    }

    /// Issues a single paced GET with no retry
    pub async fn fetch_once(&self, url: &str) -> Result<RawPage, FetchError> {
        self.pacer.wait().await;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        Ok(RawPage {
            url: final_url,
            body,
        })
    }

    /// Fetches a URL, retrying retryable failures with exponential backoff
    ///
    /// Non-retryable failures return immediately. After `max_retries`
    /// additional attempts the last error is returned.
    pub async fn fetch(&self, url: &str) -> Result<RawPage, FetchError> {
        let mut retry = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && retry < self.retry.max_retries => {
                    let backoff = self.retry.backoff_for(retry);
                    tracing::warn!(
                        "{} (attempt {}/{}), retrying in {:?}",
                        e,
                        retry + 1,
                        self.retry.max_retries + 1,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
