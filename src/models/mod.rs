// src/models/mod.rs

//! Data structures shared across the discovery engine.

pub mod activity;
pub mod config;
pub mod document;
pub mod source;

pub use activity::{
    ActivityType, DiscoveredActivity, Language, NormalizedSearch, SearchParams, SearchResults,
};
pub use config::{CacheConfig, Config, CrawlerConfig, HttpConfig, SearchConfig};
pub use document::{
    CurriculumDocument, DocumentLanguage, DocumentStatus, DocumentType, FileType, SourceType,
};
pub use source::{default_sources, DiscoverySource};
