// src/models/document.rs

//! Curriculum document record and its download lifecycle.
//!
//! Document identity is a pure function of the URL (SHA-256), so repeated
//! crawl passes over the same page update the existing record instead of
//! creating duplicates.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Download lifecycle of a discovered document.
///
/// `Pending -> Downloaded -> Processed`, with `Failed` reachable from any
/// state. A failed document is only retried by explicit re-invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Pending,
    Downloaded,
    Processed,
    Failed,
}

impl DocumentStatus {
    /// Whether a download may start from this state.
    pub fn downloadable(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }
}

/// Kind of publishing body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[default]
    Government,
    Ministry,
    Department,
}

/// Classification of a document's role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    #[default]
    Curriculum,
    Guideline,
    Assessment,
    Resource,
}

/// File format inferred from the URL extension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Pdf,
    Docx,
    Html,
    #[default]
    Unknown,
}

impl FileType {
    /// Conventional file extension for saving downloaded bytes.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Html => "html",
            Self::Unknown => "bin",
        }
    }
}

/// Language of a curriculum document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentLanguage {
    #[default]
    En,
    Fr,
    Both,
}

/// A curriculum document discovered by the crawler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurriculumDocument {
    /// URL-hash identifier, stable across crawl passes
    pub id: String,

    /// Title taken from the link text or surrounding context
    pub title: String,

    /// Absolute URL of the document
    pub url: String,

    /// Name of the discovery source that found it
    pub source_name: String,

    /// Kind of publishing body
    #[serde(default)]
    pub source_type: SourceType,

    /// Province or region the source covers
    #[serde(default)]
    pub province: String,

    /// Grade extracted from context, if any
    #[serde(default)]
    pub grade: Option<u8>,

    /// Subject extracted from context, if any
    #[serde(default)]
    pub subject: Option<String>,

    /// Document role classification
    #[serde(default)]
    pub document_type: DocumentType,

    /// File format
    #[serde(default)]
    pub file_type: FileType,

    /// Document language
    #[serde(default)]
    pub language: DocumentLanguage,

    /// Short description from surrounding context
    #[serde(default)]
    pub description: String,

    /// Size in bytes once known
    #[serde(default)]
    pub size_bytes: Option<u64>,

    /// Source-published date, if stated
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,

    /// Source last-modified date, if stated
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,

    /// When the crawler last confirmed the document exists
    pub last_verified: DateTime<Utc>,

    /// Number of download attempts so far
    #[serde(default)]
    pub download_attempts: u32,

    /// Download lifecycle state
    #[serde(default)]
    pub status: DocumentStatus,

    /// False once a verification check fails
    #[serde(default = "default_true")]
    pub is_active: bool,

    /// Import session recorded when processing succeeds
    #[serde(default)]
    pub import_id: Option<String>,

    /// Local path of the downloaded bytes
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Per-document error log; appended to, never raised past the crawler
    #[serde(default)]
    pub errors: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl CurriculumDocument {
    /// Create a newly discovered document in `Pending` state.
    pub fn new(url: impl Into<String>, title: impl Into<String>, source_name: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: Self::document_id(&url),
            title: title.into(),
            url,
            source_name: source_name.into(),
            source_type: SourceType::default(),
            province: String::new(),
            grade: None,
            subject: None,
            document_type: DocumentType::default(),
            file_type: FileType::default(),
            language: DocumentLanguage::default(),
            description: String::new(),
            size_bytes: None,
            published: None,
            last_modified: None,
            last_verified: Utc::now(),
            download_attempts: 0,
            status: DocumentStatus::Pending,
            is_active: true,
            import_id: None,
            file_path: None,
            errors: Vec::new(),
        }
    }

    /// Derive the canonical identifier from a URL.
    pub fn document_id(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Append a failure message to the error log and mark the document failed.
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.status = DocumentStatus::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_is_stable() {
        let a = CurriculumDocument::document_id("https://example.com/math.pdf");
        let b = CurriculumDocument::document_id("https://example.com/math.pdf");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn document_id_distinguishes_urls() {
        let a = CurriculumDocument::document_id("https://example.com/math.pdf");
        let b = CurriculumDocument::document_id("https://example.com/science.pdf");
        assert_ne!(a, b);
    }

    #[test]
    fn new_document_starts_pending() {
        let doc = CurriculumDocument::new("https://example.com/x.pdf", "X", "src");
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert_eq!(doc.download_attempts, 0);
        assert!(doc.is_active);
        assert_eq!(doc.id, CurriculumDocument::document_id("https://example.com/x.pdf"));
    }

    #[test]
    fn downloadable_from_pending_and_failed_only() {
        assert!(DocumentStatus::Pending.downloadable());
        assert!(DocumentStatus::Failed.downloadable());
        assert!(!DocumentStatus::Downloaded.downloadable());
        assert!(!DocumentStatus::Processed.downloadable());
    }

    #[test]
    fn record_failure_appends_and_fails() {
        let mut doc = CurriculumDocument::new("https://example.com/x.pdf", "X", "src");
        doc.record_failure("first");
        doc.record_failure("second");
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert_eq!(doc.errors, vec!["first", "second"]);
    }
}
