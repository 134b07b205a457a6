use std::path::PathBuf;
use std::time::Duration;

use flightwatch_storage::{RetryPolicy, DEFAULT_USER_AGENT};
use serde::{Deserialize, Serialize};

pub const DEFAULT_FEED_URL: &str = "https://data-cloud.flightradar24.com/zones/fcgi/feed.js";
pub const DEFAULT_DETAIL_URL: &str = "https://data-live.flightradar24.com/clickhandler/";
pub const DEFAULT_WORKER_LIMIT: usize = 4;

/// What happens to a flight id whose detail fetch was given up on (transport failure or
/// retries exhausted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbandonPolicy {
    /// Keep the id in the next generation; it is not fetched again while it stays visible.
    Record,
    /// Leave the id out of the next generation so the following cycle treats it as new.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub bounds_file: PathBuf,
    pub data_dir: PathBuf,
    pub cache_backend: CacheBackend,
    pub redis_url: String,
    pub feed_url: String,
    pub detail_url: String,
    pub user_agent: String,
    pub worker_limit: usize,
    pub detail_retry: RetryPolicy,
    pub http_timeout_secs: u64,
    pub abandon_policy: AbandonPolicy,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            bounds_file: PathBuf::from("config/flightBounds.json"),
            data_dir: PathBuf::from("./Data"),
            cache_backend: CacheBackend::Redis,
            redis_url: "redis://localhost:6379/1".to_string(),
            feed_url: DEFAULT_FEED_URL.to_string(),
            detail_url: DEFAULT_DETAIL_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            worker_limit: DEFAULT_WORKER_LIMIT,
            detail_retry: RetryPolicy::default(),
            http_timeout_secs: 30,
            abandon_policy: AbandonPolicy::Record,
        }
    }
}

impl PollerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let max_attempts = number("FLIGHTWATCH_DETAIL_MAX_ATTEMPTS")
            .map(|v| (v as usize).max(1))
            .unwrap_or(defaults.detail_retry.max_attempts);
        let retry_delay = number("FLIGHTWATCH_DETAIL_RETRY_DELAY_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.detail_retry.base_delay);

        Self {
            bounds_file: lookup("FLIGHTWATCH_BOUNDS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.bounds_file),
            data_dir: lookup("FLIGHTWATCH_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            cache_backend: match lookup("FLIGHTWATCH_CACHE") {
                Some(v) if v.eq_ignore_ascii_case("memory") => CacheBackend::Memory,
                _ => CacheBackend::Redis,
            },
            redis_url: lookup("REDIS_URL").unwrap_or(defaults.redis_url),
            feed_url: lookup("FLIGHTWATCH_FEED_URL").unwrap_or(defaults.feed_url),
            detail_url: lookup("FLIGHTWATCH_DETAIL_URL").unwrap_or(defaults.detail_url),
            user_agent: lookup("FLIGHTWATCH_USER_AGENT").unwrap_or(defaults.user_agent),
            worker_limit: number("FLIGHTWATCH_WORKER_LIMIT")
                .map(|v| (v as usize).max(1))
                .unwrap_or(defaults.worker_limit),
            detail_retry: RetryPolicy::fixed(max_attempts, retry_delay),
            http_timeout_secs: number("FLIGHTWATCH_HTTP_TIMEOUT_SECS")
                .unwrap_or(defaults.http_timeout_secs),
            abandon_policy: match lookup("FLIGHTWATCH_RECORD_ABANDONED") {
                Some(v) if matches!(v.as_str(), "0" | "false" | "FALSE" | "False") => {
                    AbandonPolicy::Skip
                }
                _ => AbandonPolicy::Record,
            },
        }
    }
}
