use serde::Deserialize;

/// Main configuration structure for Olympedia-Sync
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Which site and which delegation to crawl
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Site root, e.g. "https://www.olympedia.org"
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Delegation (NOC) code, e.g. "IND"
    #[serde(rename = "country-code")]
    pub country_code: String,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Minimum time between two consecutive requests to the source (milliseconds)
    #[serde(rename = "request-delay-ms")]
    pub request_delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Retries after the first attempt for a retryable transport failure
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base backoff between retries (milliseconds), doubled on every attempt
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,

    /// Number of detail fetches allowed in flight at once
    #[serde(rename = "max-concurrent-fetches")]
    pub max_concurrent_fetches: u32,

    /// Flush accumulated athletes every N records (0 = one batch per pass)
    #[serde(rename = "flush-every")]
    pub flush_every: usize,

    /// Full-batch retries when a persistence batch fails
    #[serde(rename = "persist-retries")]
    pub persist_retries: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 500,
            request_timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 1000,
            max_concurrent_fetches: 1,
            flush_every: 0,
            persist_retries: 1,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}
