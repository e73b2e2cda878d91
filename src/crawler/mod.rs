// src/crawler/mod.rs

//! Curriculum document crawler.
//!
//! Runs a bounded breadth-first traversal per discovery source: pages
//! within one source are fetched sequentially with the source's politeness
//! delay, while different sources crawl in parallel. Discovered documents
//! are keyed by the URL hash, so repeated passes over the same page merge
//! into the existing record. The visited set and depth are scoped to the
//! pass, never persisted, so later passes re-validate old pages.

pub mod classify;

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use serde_json::json;
use url::Url;

use crate::fetch::{FetchCache, PageFetcher};
use crate::models::{
    CrawlerConfig, CurriculumDocument, DiscoverySource, DocumentLanguage, DocumentStatus,
    DocumentType,
};
use crate::store::ImportPipeline;
use crate::utils::get_domain;

/// Summary of one discovery pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DiscoveryOutcome {
    /// Documents known after the pass (new and updated)
    pub documents: Vec<CurriculumDocument>,
    pub pages_visited: usize,
    pub new_documents: usize,
    pub updated_documents: usize,
    pub fetch_failures: usize,
}

/// Result of a single document download.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub success: bool,
    pub file_path: Option<PathBuf>,
    pub error: Option<String>,
}

/// Result of handing a document to the import pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub success: bool,
    pub import_id: Option<String>,
    pub error: Option<String>,
}

/// Operation applied by a batch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOperation {
    Download,
    Process,
    DownloadAndProcess,
    Verify,
}

/// Per-item outcome of a batch request.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub id: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Structured partial-success summary of a batch request.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub items: Vec<BatchItem>,
    pub succeeded: usize,
    pub failed: usize,
}

/// Filter over the discovered document registry.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub province: Option<String>,
    pub grade: Option<u8>,
    pub subject: Option<String>,
    pub language: Option<DocumentLanguage>,
    pub document_type: Option<DocumentType>,
    pub status: Option<DocumentStatus>,
}

/// A link lifted out of a crawled page.
struct PageLink {
    url: String,
    context: String,
}

/// Crawler over the configured discovery sources.
pub struct CurriculumCrawler {
    cache: Arc<FetchCache>,
    fetcher: Arc<dyn PageFetcher>,
    importer: Arc<dyn ImportPipeline>,
    sources: Vec<DiscoverySource>,
    config: CrawlerConfig,
    documents: Mutex<HashMap<String, CurriculumDocument>>,
}

impl CurriculumCrawler {
    pub fn new(
        cache: Arc<FetchCache>,
        fetcher: Arc<dyn PageFetcher>,
        importer: Arc<dyn ImportPipeline>,
        sources: Vec<DiscoverySource>,
        config: CrawlerConfig,
    ) -> Self {
        Self {
            cache,
            fetcher,
            importer,
            sources,
            config,
            documents: Mutex::new(HashMap::new()),
        }
    }

    /// Run one discovery pass over all active sources.
    ///
    /// Sources crawl in parallel; pages within a source are sequential to
    /// honor the per-source politeness delay.
    pub async fn discover(&self) -> DiscoveryOutcome {
        let passes = self
            .sources
            .iter()
            .filter(|s| s.active)
            .map(|source| self.crawl_source(source));
        let source_outcomes = join_all(passes).await;

        let mut outcome = DiscoveryOutcome::default();
        for (visited, failures, found) in source_outcomes {
            outcome.pages_visited += visited;
            outcome.fetch_failures += failures;

            let mut registry = self.documents.lock().expect("registry lock poisoned");
            for doc in found {
                match registry.get_mut(&doc.id) {
                    Some(existing) => {
                        // Refresh descriptive fields; lifecycle state stays.
                        existing.title = doc.title;
                        existing.description = doc.description;
                        existing.grade = doc.grade.or(existing.grade);
                        existing.subject = doc.subject.clone().or(existing.subject.take());
                        existing.last_verified = Utc::now();
                        outcome.updated_documents += 1;
                    }
                    None => {
                        registry.insert(doc.id.clone(), doc);
                        outcome.new_documents += 1;
                    }
                }
            }
        }

        outcome.documents = self.documents();
        log::info!(
            "Discovery pass complete: {} pages, {} new, {} updated, {} failures",
            outcome.pages_visited,
            outcome.new_documents,
            outcome.updated_documents,
            outcome.fetch_failures
        );
        outcome
    }

    /// Sequential bounded BFS over one source.
    /// Returns (pages visited, fetch failures, documents found).
    async fn crawl_source(
        &self,
        source: &DiscoverySource,
    ) -> (usize, usize, Vec<CurriculumDocument>) {
        let delay = Duration::from_millis(source.crawl_delay_ms);
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = source
            .seed_urls
            .iter()
            .map(|u| (u.clone(), 0usize))
            .collect();

        let mut pages = 0usize;
        let mut failures = 0usize;
        let mut found = Vec::new();

        while let Some((url, depth)) = queue.pop_front() {
            if !visited.insert(url.clone()) {
                continue;
            }
            if source.excludes(&url) {
                continue;
            }
            match get_domain(&url) {
                Some(domain) if source.allows_domain(&domain) => {}
                _ => continue,
            }

            let html = match self.cache.fetch(&url).await {
                Ok(html) => html,
                Err(e) => {
                    log::warn!("{}: fetch failed for {url}: {e}", source.name);
                    failures += 1;
                    continue;
                }
            };
            pages += 1;

            let links = extract_links(&html, &url);
            for link in links {
                if source.excludes(&link.url) {
                    continue;
                }
                if classify::is_document_candidate(&link.url, &link.context) {
                    found.push(build_document(source, &link));
                } else if depth < source.max_depth
                    && get_domain(&link.url)
                        .map(|d| source.allows_domain(&d))
                        .unwrap_or(false)
                    && classify::is_navigational_candidate(&link.context)
                    && !visited.contains(&link.url)
                {
                    queue.push_back((link.url, depth + 1));
                }
            }

            if !queue.is_empty() && delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
        }

        (pages, failures, found)
    }

    /// Fetch and size-validate a document's bytes.
    ///
    /// The size cap is enforced twice: against the length the server
    /// declares and against the bytes actually received.
    pub async fn download_document(&self, id: &str) -> DownloadResult {
        let Some(doc) = self.document(id) else {
            return DownloadResult {
                success: false,
                file_path: None,
                error: Some(format!("unknown document: {id}")),
            };
        };

        // Idempotent for already-downloaded documents.
        if !doc.status.downloadable() {
            return DownloadResult {
                success: true,
                file_path: doc.file_path,
                error: None,
            };
        }

        self.update(id, |d| d.download_attempts += 1);

        let body = match self.fetcher.download(&doc.url).await {
            Ok(body) => body,
            Err(e) => {
                let message = format!("download failed: {e}");
                self.update(id, |d| d.record_failure(message.clone()));
                return DownloadResult {
                    success: false,
                    file_path: None,
                    error: Some(message),
                };
            }
        };

        let cap = self.config.max_file_size_bytes;
        let declared = body.declared_len.unwrap_or(0);
        let actual = body.bytes.len() as u64;
        if declared > cap || actual > cap {
            let message = format!(
                "document exceeds size cap: declared {declared}, received {actual}, cap {cap}"
            );
            self.update(id, |d| d.record_failure(message.clone()));
            return DownloadResult {
                success: false,
                file_path: None,
                error: Some(message),
            };
        }

        let path = self
            .config
            .download_dir
            .join(format!("{}.{}", &id[..id.len().min(16)], doc.file_type.extension()));
        if let Err(e) = self.write_bytes(&path, &body.bytes).await {
            let message = format!("write failed: {e}");
            self.update(id, |d| d.record_failure(message.clone()));
            return DownloadResult {
                success: false,
                file_path: None,
                error: Some(message),
            };
        }

        self.update(id, |d| {
            d.status = DocumentStatus::Downloaded;
            d.size_bytes = Some(actual);
            d.file_path = Some(path.clone());
            d.last_verified = Utc::now();
        });

        DownloadResult {
            success: true,
            file_path: Some(path),
            error: None,
        }
    }

    async fn write_bytes(&self, path: &PathBuf, bytes: &[u8]) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    /// Hand a downloaded document to the import pipeline.
    pub async fn process_document(&self, id: &str, user_id: &str) -> ProcessResult {
        let Some(doc) = self.document(id) else {
            return ProcessResult {
                success: false,
                import_id: None,
                error: Some(format!("unknown document: {id}")),
            };
        };

        if doc.status != DocumentStatus::Downloaded {
            // Precondition failure, not a lifecycle failure: status is kept.
            return ProcessResult {
                success: false,
                import_id: None,
                error: Some(format!(
                    "document must be downloaded first (status: {:?})",
                    doc.status
                )),
            };
        }

        let metadata = json!({
            "url": doc.url,
            "source": doc.source_name,
            "province": doc.province,
            "documentType": doc.document_type,
        });

        match self
            .importer
            .start_import(
                user_id,
                doc.grade,
                doc.subject.as_deref(),
                doc.file_type.extension(),
                Some(&doc.title),
                Some(metadata),
            )
            .await
        {
            Ok(import_id) => {
                self.update(id, |d| {
                    d.status = DocumentStatus::Processed;
                    d.import_id = Some(import_id.clone());
                });
                ProcessResult {
                    success: true,
                    import_id: Some(import_id),
                    error: None,
                }
            }
            Err(e) => {
                let message = format!("import failed: {e}");
                self.update(id, |d| d.record_failure(message.clone()));
                ProcessResult {
                    success: false,
                    import_id: None,
                    error: Some(message),
                }
            }
        }
    }

    /// Lightweight existence check; updates the active flag, not the status.
    pub async fn verify_document(&self, id: &str) -> bool {
        let Some(doc) = self.document(id) else {
            return false;
        };

        let alive = match self.fetcher.exists(&doc.url).await {
            Ok(alive) => alive,
            Err(e) => {
                self.update(id, |d| d.errors.push(format!("verify failed: {e}")));
                false
            }
        };

        self.update(id, |d| {
            d.is_active = alive;
            d.last_verified = Utc::now();
        });
        alive
    }

    /// Apply one operation to up to `batch_limit` documents, with a fixed
    /// delay between items. Always returns a partial-success summary.
    pub async fn batch(
        &self,
        ids: &[String],
        operation: BatchOperation,
        user_id: &str,
    ) -> BatchSummary {
        let limit = self.config.batch_limit;
        if ids.len() > limit {
            log::warn!("Batch of {} ids clamped to {limit}", ids.len());
        }
        let delay = Duration::from_millis(self.config.batch_delay_ms);

        let mut items = Vec::new();
        for (index, id) in ids.iter().take(limit).enumerate() {
            if index > 0 && delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }

            let (success, error) = match operation {
                BatchOperation::Download => {
                    let r = self.download_document(id).await;
                    (r.success, r.error)
                }
                BatchOperation::Process => {
                    let r = self.process_document(id, user_id).await;
                    (r.success, r.error)
                }
                BatchOperation::DownloadAndProcess => {
                    let d = self.download_document(id).await;
                    if d.success {
                        let p = self.process_document(id, user_id).await;
                        (p.success, p.error)
                    } else {
                        (false, d.error)
                    }
                }
                BatchOperation::Verify => (self.verify_document(id).await, None),
            };
            items.push(BatchItem {
                id: id.clone(),
                success,
                error,
            });
        }

        let succeeded = items.iter().filter(|i| i.success).count();
        let failed = items.len() - succeeded;
        BatchSummary {
            items,
            succeeded,
            failed,
        }
    }

    /// All known documents, unordered.
    pub fn documents(&self) -> Vec<CurriculumDocument> {
        self.documents
            .lock()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// One document by id.
    pub fn document(&self, id: &str) -> Option<CurriculumDocument> {
        self.documents
            .lock()
            .expect("registry lock poisoned")
            .get(id)
            .cloned()
    }

    /// Documents matching every set field of the filter.
    pub fn filter_documents(&self, filter: &DocumentFilter) -> Vec<CurriculumDocument> {
        self.documents()
            .into_iter()
            .filter(|d| {
                filter
                    .province
                    .as_ref()
                    .map(|p| &d.province == p)
                    .unwrap_or(true)
                    && filter.grade.map(|g| d.grade == Some(g)).unwrap_or(true)
                    && filter
                        .subject
                        .as_ref()
                        .map(|s| d.subject.as_ref() == Some(s))
                        .unwrap_or(true)
                    && filter.language.map(|l| d.language == l).unwrap_or(true)
                    && filter
                        .document_type
                        .map(|t| d.document_type == t)
                        .unwrap_or(true)
                    && filter.status.map(|s| d.status == s).unwrap_or(true)
            })
            .collect()
    }

    /// Seed the registry directly; used by tests and re-hydration.
    pub fn insert_document(&self, doc: CurriculumDocument) {
        self.documents
            .lock()
            .expect("registry lock poisoned")
            .insert(doc.id.clone(), doc);
    }

    fn update(&self, id: &str, f: impl FnOnce(&mut CurriculumDocument)) {
        if let Some(doc) = self
            .documents
            .lock()
            .expect("registry lock poisoned")
            .get_mut(id)
        {
            f(doc);
        }
    }
}

/// Lift all anchors out of a page. Synchronous: `Html` is not `Send`.
fn extract_links(html: &str, page_url: &str) -> Vec<PageLink> {
    let document = Html::parse_document(html);
    let anchor_sel = Selector::parse("a[href]").expect("static selector");
    let base = match Url::parse(page_url) {
        Ok(base) => base,
        Err(_) => return Vec::new(),
    };

    document
        .select(&anchor_sel)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            if href.starts_with('#') || href.starts_with("mailto:") || href.starts_with("javascript:") {
                return None;
            }
            let url = base.join(href).ok()?.to_string();

            let anchor_text: String = anchor.text().collect::<String>().trim().to_string();
            let parent_text = anchor
                .parent()
                .and_then(ElementRef::wrap)
                .map(|p| p.text().collect::<String>())
                .unwrap_or_default();
            let context = format!("{} {}", anchor_text, parent_text.trim());

            Some(PageLink {
                url,
                context: context.split_whitespace().collect::<Vec<_>>().join(" "),
            })
        })
        .collect()
}

/// Synthesize a document record from a qualifying link.
fn build_document(source: &DiscoverySource, link: &PageLink) -> CurriculumDocument {
    let title = link
        .context
        .split_whitespace()
        .take(12)
        .collect::<Vec<_>>()
        .join(" ");
    let mut doc = CurriculumDocument::new(&link.url, title, &source.name);
    doc.source_type = source.source_type;
    doc.province = source.province.clone();
    doc.grade = classify::extract_grade(&link.context);
    doc.subject = classify::classify_subject(&link.context);
    doc.document_type = classify::classify_document_type(&link.context);
    doc.file_type = classify::classify_file_type(&link.url);
    doc.language = classify::detect_language(&link.url, &link.context);
    doc.description = link.context.chars().take(300).collect();
    doc
}
