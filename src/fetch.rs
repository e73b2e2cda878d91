// src/fetch.rs

//! Time-bounded HTTP page cache with a rendering fallback seam.
//!
//! All page retrieval goes through [`FetchCache::fetch`]: cache hits within
//! the TTL return immediately, misses go to the primary [`PageFetcher`], and
//! primary failures fall back to the optional [`RenderFetcher`] (a browser
//! engine, last resort only) before the fetch is reported as failed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::models::{CacheConfig, HttpConfig};

/// Body of a downloaded document plus the length the server declared.
#[derive(Debug, Clone)]
pub struct DownloadedBody {
    pub bytes: Vec<u8>,
    /// Content-Length as declared by the server, if any
    pub declared_len: Option<u64>,
}

/// Abstraction over plain page retrieval.
///
/// The crawler and connectors never talk to the network directly; tests
/// inject a fixture implementation over an in-memory site.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page body as text.
    async fn get(&self, url: &str) -> Result<String>;

    /// Fetch raw bytes, reporting the declared length when known.
    async fn download(&self, url: &str) -> Result<DownloadedBody> {
        let body = self.get(url).await?;
        Ok(DownloadedBody {
            bytes: body.into_bytes(),
            declared_len: None,
        })
    }

    /// Lightweight existence check (HEAD-equivalent).
    async fn exists(&self, url: &str) -> Result<bool> {
        Ok(self.get(url).await.is_ok())
    }
}

/// Heavier fallback retrieval through a rendering engine.
///
/// Disabled by default; scripts-and-settle rendering is a last resort for
/// pages that fail plain retrieval.
#[async_trait]
pub trait RenderFetcher: Send + Sync {
    async fn render(&self, url: &str) -> Result<String>;
}

/// Plain HTTP fetcher backed by a configured `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher from the HTTP configuration.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch_status(
                url,
                status.as_u16(),
                "non-success response",
            ));
        }
        Ok(response.text().await?)
    }

    async fn download(&self, url: &str) -> Result<DownloadedBody> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch_status(
                url,
                status.as_u16(),
                "non-success response",
            ));
        }
        let declared_len = response.content_length();
        let bytes = response.bytes().await?.to_vec();
        Ok(DownloadedBody {
            bytes,
            declared_len,
        })
    }

    async fn exists(&self, url: &str) -> Result<bool> {
        let response = self.client.head(url).send().await?;
        Ok(response.status().is_success())
    }
}

struct CacheEntry {
    body: String,
    fetched_at: Instant,
}

/// URL-keyed page cache with a fixed expiry window.
///
/// The cache map is the only object shared across concurrent fetches;
/// insert-if-absent races are harmless, merely a wasted fetch.
pub struct FetchCache {
    primary: Arc<dyn PageFetcher>,
    render: Option<Arc<dyn RenderFetcher>>,
    ttl: Duration,
    settle: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl FetchCache {
    /// Create a cache over a primary fetcher with the configured TTL.
    pub fn new(primary: Arc<dyn PageFetcher>, config: &CacheConfig) -> Self {
        Self {
            primary,
            render: None,
            ttl: Duration::from_secs(config.ttl_secs),
            settle: Duration::from_millis(config.render_settle_ms),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a rendering fallback for pages that fail plain retrieval.
    pub fn with_render_fallback(mut self, render: Arc<dyn RenderFetcher>) -> Self {
        self.render = Some(render);
        self
    }

    /// Fetch a page, returning the cached body when fresh.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let key = cache_key(url);

        {
            let entries = self.entries.lock().expect("cache lock poisoned");
            if let Some(entry) = entries.get(&key) {
                if entry.fetched_at.elapsed() < self.ttl {
                    log::debug!("Cache hit for {url}");
                    return Ok(entry.body.clone());
                }
            }
        }

        let body = match self.primary.get(url).await {
            Ok(body) => body,
            Err(primary_err) => match &self.render {
                Some(render) => {
                    log::debug!("Plain fetch failed for {url} ({primary_err}), trying renderer");
                    tokio::time::sleep(self.settle).await;
                    render
                        .render(url)
                        .await
                        .map_err(|e| AppError::fetch(url, e))?
                }
                None => return Err(primary_err),
            },
        };

        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.retain(|_, entry| entry.fetched_at.elapsed() < self.ttl);
        entries.insert(
            key,
            CacheEntry {
                body: body.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(body)
    }

    /// Number of live entries, for observability.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cache_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract visible text from an HTML document, whitespace-normalized.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let body_selector = Selector::parse("body").expect("static selector");

    let text: String = match document.select(&body_selector).next() {
        Some(body) => body.text().collect::<Vec<_>>().join(" "),
        None => document.root_element().text().collect::<Vec<_>>().join(" "),
    };

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract `<meta>` name/content pairs from an HTML document.
pub fn extract_meta(html: &str) -> HashMap<String, String> {
    let document = Html::parse_document(html);
    let meta_selector = Selector::parse("meta").expect("static selector");

    document
        .select(&meta_selector)
        .filter_map(|el| {
            let key = el
                .value()
                .attr("name")
                .or_else(|| el.value().attr("property"))?;
            let content = el.value().attr("content")?;
            Some((key.to_lowercase(), content.to_string()))
        })
        .collect()
}
