//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory API client settings
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Cache expiry settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Query defaults and limits
    #[serde(default)]
    pub query: QueryConfig,

    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let upstream = &self.upstream;
        if upstream.base_url.trim().is_empty() {
            return Err(AppError::validation("upstream.base_url is empty"));
        }
        upstream.base()?;
        if upstream.user_agent.trim().is_empty() {
            return Err(AppError::validation("upstream.user_agent is empty"));
        }
        if upstream.timeout_secs == 0 {
            return Err(AppError::validation("upstream.timeout_secs must be > 0"));
        }
        if upstream.max_attempts == 0 {
            return Err(AppError::validation("upstream.max_attempts must be > 0"));
        }
        if upstream.page_size == 0 {
            return Err(AppError::validation("upstream.page_size must be > 0"));
        }
        if upstream.max_consecutive_failures == 0 {
            return Err(AppError::validation(
                "upstream.max_consecutive_failures must be > 0",
            ));
        }
        if upstream.max_pages == 0 {
            return Err(AppError::validation("upstream.max_pages must be > 0"));
        }
        if self.cache.ttl_secs == 0 {
            return Err(AppError::validation("cache.ttl_secs must be > 0"));
        }
        if self.query.max_limit == 0 {
            return Err(AppError::validation("query.max_limit must be > 0"));
        }
        if self.query.default_limit == 0 || self.query.default_limit > self.query.max_limit {
            return Err(AppError::validation(
                "query.default_limit must be between 1 and query.max_limit",
            ));
        }
        if self.query.default_district.trim().is_empty() {
            return Err(AppError::validation("query.default_district is empty"));
        }
        if self.server.warm_concurrency == 0 {
            return Err(AppError::validation("server.warm_concurrency must be > 0"));
        }
        Ok(())
    }
}

/// Directory API client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the directory service
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for upstream requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempts per page request before giving up
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Backoff unit; attempt `n` waits `n * retry_backoff_ms` before retrying
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Records per upstream page
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,

    /// Consecutive failed pages that end a collection fetch
    #[serde(default = "defaults::max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Hard bound on pages requested for one collection
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,
}

impl UpstreamConfig {
    /// Parsed base URL.
    pub fn base(&self) -> Result<Url> {
        Ok(Url::parse(self.base_url.trim())?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay before retrying after the given (1-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_attempts: defaults::max_attempts(),
            retry_backoff_ms: defaults::retry_backoff(),
            page_size: defaults::page_size(),
            max_consecutive_failures: defaults::max_consecutive_failures(),
            max_pages: defaults::max_pages(),
        }
    }
}

/// Cache expiry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live for collections and reference lists, in seconds
    #[serde(default = "defaults::ttl")]
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> TimeDelta {
        i64::try_from(self.ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: defaults::ttl(),
        }
    }
}

/// Query defaults and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "defaults::default_limit")]
    pub default_limit: usize,

    #[serde(default = "defaults::max_limit")]
    pub max_limit: usize,

    /// Partition served when a request names no state, district or search
    #[serde(default = "defaults::default_district")]
    pub default_district: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: defaults::default_limit(),
            max_limit: defaults::max_limit(),
            default_district: defaults::default_district(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::host")]
    pub host: String,

    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Partitions prefetched in parallel by the `warm` command
    #[serde(default = "defaults::warm_concurrency")]
    pub warm_concurrency: usize,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            port: defaults::port(),
            warm_concurrency: defaults::warm_concurrency(),
        }
    }
}

mod defaults {
    // Upstream defaults
    pub fn base_url() -> String {
        "https://colleges-api.onrender.com".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; college-proxy/0.1)".into()
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn retry_backoff() -> u64 {
        500
    }
    pub fn page_size() -> usize {
        10
    }
    pub fn max_consecutive_failures() -> u32 {
        3
    }
    pub fn max_pages() -> usize {
        1000
    }

    // Cache defaults
    pub fn ttl() -> u64 {
        60 * 60
    }

    // Query defaults
    pub fn default_limit() -> usize {
        10
    }
    pub fn max_limit() -> usize {
        50
    }
    pub fn default_district() -> String {
        "Pune".into()
    }

    // Server defaults
    pub fn host() -> String {
        "0.0.0.0".into()
    }
    pub fn port() -> u16 {
        5000
    }
    pub fn warm_concurrency() -> usize {
        4
    }
}
