// src/models/config.rs

//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::source::{default_sources, DiscoverySource};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client behavior
    #[serde(default)]
    pub http: HttpConfig,

    /// Fetch cache behavior
    #[serde(default)]
    pub cache: CacheConfig,

    /// Crawler and document lifecycle settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Aggregated search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Discovery source definitions
    #[serde(default = "default_sources")]
    pub sources: Vec<DiscoverySource>,
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
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.http.retry_attempts == 0 {
            return Err(AppError::validation("http.retry_attempts must be > 0"));
        }
        if self.cache.ttl_secs == 0 {
            return Err(AppError::validation("cache.ttl_secs must be > 0"));
        }
        if self.crawler.max_file_size_bytes == 0 {
            return Err(AppError::validation(
                "crawler.max_file_size_bytes must be > 0",
            ));
        }
        if self.crawler.batch_limit == 0 {
            return Err(AppError::validation("crawler.batch_limit must be > 0"));
        }
        if self.search.max_limit == 0 || self.search.default_limit == 0 {
            return Err(AppError::validation("search limits must be > 0"));
        }
        if self.search.default_limit > self.search.max_limit {
            return Err(AppError::validation(
                "search.default_limit must not exceed search.max_limit",
            ));
        }
        if self.sources.is_empty() {
            return Err(AppError::validation("No discovery sources defined"));
        }
        for source in &self.sources {
            if source.seed_urls.is_empty() {
                return Err(AppError::validation(format!(
                    "Source '{}' has no seed URLs",
                    source.name
                )));
            }
            if source.allowed_domains.is_empty() {
                return Err(AppError::validation(format!(
                    "Source '{}' has no allowed domains",
                    source.name
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            cache: CacheConfig::default(),
            crawler: CrawlerConfig::default(),
            search: SearchConfig::default(),
            sources: default_sources(),
        }
    }
}

/// HTTP client behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum redirects to follow
    #[serde(default = "defaults::max_redirects")]
    pub max_redirects: usize,

    /// Retry attempts for connector fetches
    #[serde(default = "defaults::retry_attempts")]
    pub retry_attempts: u32,

    /// Base backoff delay between retries; scales linearly with attempt
    #[serde(default = "defaults::retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Larger backoff applied on HTTP 429 responses
    #[serde(default = "defaults::rate_limit_backoff")]
    pub rate_limit_backoff_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_redirects: defaults::max_redirects(),
            retry_attempts: defaults::retry_attempts(),
            retry_base_delay_ms: defaults::retry_base_delay(),
            rate_limit_backoff_ms: defaults::rate_limit_backoff(),
        }
    }
}

/// Fetch cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache entry lifetime in seconds
    #[serde(default = "defaults::cache_ttl")]
    pub ttl_secs: u64,

    /// Settle wait after a rendering fallback fetch, in milliseconds
    #[serde(default = "defaults::render_settle")]
    pub render_settle_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: defaults::cache_ttl(),
            render_settle_ms: defaults::render_settle(),
        }
    }
}

/// Crawler and document lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Hard cap on downloaded document size
    #[serde(default = "defaults::max_file_size")]
    pub max_file_size_bytes: u64,

    /// Directory downloaded documents are written to
    #[serde(default = "defaults::download_dir")]
    pub download_dir: PathBuf,

    /// Maximum ids accepted by a batch operation
    #[serde(default = "defaults::batch_limit")]
    pub batch_limit: usize,

    /// Fixed delay between batch items, in milliseconds
    #[serde(default = "defaults::batch_delay")]
    pub batch_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: defaults::max_file_size(),
            download_dir: defaults::download_dir(),
            batch_limit: defaults::batch_limit(),
            batch_delay_ms: defaults::batch_delay(),
        }
    }
}

/// Aggregated search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Page size used when the caller specifies none
    #[serde(default = "defaults::default_limit")]
    pub default_limit: usize,

    /// Hard cap on page size
    #[serde(default = "defaults::max_limit")]
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: defaults::default_limit(),
            max_limit: defaults::max_limit(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; SchoolScout/1.0; +https://github.com/schoolscout)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_redirects() -> usize {
        5
    }
    pub fn retry_attempts() -> u32 {
        3
    }
    pub fn retry_base_delay() -> u64 {
        500
    }
    pub fn rate_limit_backoff() -> u64 {
        2000
    }

    // Cache defaults
    pub fn cache_ttl() -> u64 {
        15 * 60
    }
    pub fn render_settle() -> u64 {
        2000
    }

    // Crawler defaults
    pub fn max_file_size() -> u64 {
        50 * 1024 * 1024
    }
    pub fn download_dir() -> PathBuf {
        PathBuf::from("downloads")
    }
    pub fn batch_limit() -> usize {
        10
    }
    pub fn batch_delay() -> u64 {
        500
    }

    // Search defaults
    pub fn default_limit() -> usize {
        20
    }
    pub fn max_limit() -> usize {
        100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.http.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_file_cap() {
        let mut config = Config::default();
        config.crawler.max_file_size_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_source_without_seeds() {
        let mut config = Config::default();
        config.sources[0].seed_urls.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_limits() {
        let mut config = Config::default();
        config.search.default_limit = 200;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [http]
            timeout_secs = 10

            [[sources]]
            name = "X"
            base_url = "https://x.example"
            seed_urls = ["https://x.example/curriculum"]
            allowed_domains = ["x.example"]
            "#,
        )
        .unwrap();
        assert_eq!(config.http.timeout_secs, 10);
        assert_eq!(config.cache.ttl_secs, 15 * 60);
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].max_depth, 2);
    }
}
