//! Harvester configuration: defaults, file loading and validation

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::circuitbreaker::CircuitBreakerConfig;
use crate::error::{HarvestError, Result};
use crate::retry::RetryConfig;

/// What a worker does when a fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchErrorPolicy {
    /// Any fetch failure ends the whole process with an error.
    Abort,
    /// Retry with backoff; sustained failure trips the breaker and shuts down gracefully.
    #[default]
    Retry,
}

/// Runtime configuration. Every field is optional in a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// URL polled by every worker
    pub source_url: String,
    /// CSS selector whose text forms the fragment
    pub selector: String,
    /// Number of fetch workers
    pub workers: usize,
    /// Seconds between throughput reports
    pub report_interval_secs: u64,
    /// Consecutive duplicates that end the run
    pub dup_threshold: u64,
    /// Fingerprint file path
    pub hash_file: PathBuf,
    /// Content file path
    pub content_file: PathBuf,
    /// Courtesy pause after every worker iteration, in microseconds
    pub worker_delay_us: u64,
    /// Per-request timeout
    pub request_timeout_secs: u64,
    /// Pool-wide fetch rate limit, 0 for none
    pub max_fetches_per_sec: u64,
    /// Reaction to fetch failures
    pub fetch_error_policy: FetchErrorPolicy,
    /// Backoff settings for the retry policy
    pub retry: RetryConfig,
    /// Sustained-failure detection for the retry policy
    pub breaker: CircuitBreakerConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            source_url: String::from("http://vpustotu.ru/moderation/"),
            selector: String::from(".fi_text"),
            workers: 2,
            report_interval_secs: 10,
            dup_threshold: 500,
            hash_file: PathBuf::from("hash.bin"),
            content_file: PathBuf::from("quotes.txt"),
            worker_delay_us: 100,
            request_timeout_secs: 30,
            max_fetches_per_sec: 0,
            fetch_error_policy: FetchErrorPolicy::Retry,
            retry: RetryConfig::default(),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl HarvestConfig {
    /// Load from a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => {
                let config: HarvestConfig = toml::from_str(&contents)?;
                Ok(config)
            }
            "json" => {
                let config: HarvestConfig = serde_json::from_str(&contents)?;
                Ok(config)
            }
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(HarvestError::Config("workers must be at least 1".into()));
        }
        if self.report_interval_secs == 0 {
            return Err(HarvestError::Config(
                "report interval must be at least 1 second".into(),
            ));
        }
        if self.dup_threshold == 0 {
            return Err(HarvestError::Config(
                "duplicate threshold must be at least 1".into(),
            ));
        }
        if self.source_url.is_empty() {
            return Err(HarvestError::Config("source url must not be empty".into()));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(HarvestError::Config(
                "breaker failure threshold must be at least 1".into(),
            ));
        }
        crate::source::parse_selector(&self.selector)?;
        Ok(())
    }

    /// Report period
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    /// Courtesy delay between worker iterations
    pub fn worker_delay(&self) -> Duration {
        Duration::from_micros(self.worker_delay_us)
    }

    /// HTTP request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
