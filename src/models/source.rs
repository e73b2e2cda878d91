// src/models/source.rs

//! Discovery source definitions.
//!
//! A source describes one external site the crawler traverses: its seed
//! URLs, domain boundary, politeness delay, and depth limit. Sources are
//! held in memory for the duration of a discovery pass.

use serde::{Deserialize, Serialize};

use crate::models::document::{DocumentLanguage, SourceType};

/// One external site the crawler may traverse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySource {
    /// Display name (e.g. "Ontario Ministry of Education")
    pub name: String,

    /// Base URL used for link resolution
    pub base_url: String,

    /// Entry pages for the crawl, absolute URLs
    #[serde(default)]
    pub seed_urls: Vec<String>,

    /// Domains the crawler may follow links into
    #[serde(default)]
    pub allowed_domains: Vec<String>,

    /// URL substrings that disqualify a link
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Minimum wait between sequential fetches to this source
    #[serde(default = "defaults::crawl_delay_ms")]
    pub crawl_delay_ms: u64,

    /// Maximum traversal depth from a seed (0 = seeds only)
    #[serde(default = "defaults::max_depth")]
    pub max_depth: usize,

    /// Language affinity of the source
    #[serde(default)]
    pub language: DocumentLanguage,

    /// Kind of publishing body
    #[serde(default)]
    pub source_type: SourceType,

    /// Province or region the source covers
    #[serde(default)]
    pub province: String,

    /// Inactive sources are skipped by discovery
    #[serde(default = "defaults::active")]
    pub active: bool,
}

impl DiscoverySource {
    /// Whether a URL stays inside this source's domain boundary.
    pub fn allows_domain(&self, domain: &str) -> bool {
        self.allowed_domains
            .iter()
            .any(|allowed| domain == allowed || domain.ends_with(&format!(".{allowed}")))
    }

    /// Whether a URL matches any exclude pattern.
    pub fn excludes(&self, url: &str) -> bool {
        self.exclude_patterns.iter().any(|p| url.contains(p))
    }
}

/// Built-in sources used when the config file defines none.
pub fn default_sources() -> Vec<DiscoverySource> {
    vec![
        DiscoverySource {
            name: "Ontario Ministry of Education".to_string(),
            base_url: "https://www.dcp.edu.gov.on.ca".to_string(),
            seed_urls: vec!["https://www.dcp.edu.gov.on.ca/en/curriculum".to_string()],
            allowed_domains: vec!["dcp.edu.gov.on.ca".to_string()],
            exclude_patterns: vec!["/fr/".to_string(), "newsletter".to_string()],
            crawl_delay_ms: defaults::crawl_delay_ms(),
            max_depth: defaults::max_depth(),
            language: DocumentLanguage::En,
            source_type: SourceType::Ministry,
            province: "ON".to_string(),
            active: true,
        },
        DiscoverySource {
            name: "BC Curriculum".to_string(),
            base_url: "https://curriculum.gov.bc.ca".to_string(),
            seed_urls: vec!["https://curriculum.gov.bc.ca/curriculum".to_string()],
            allowed_domains: vec!["curriculum.gov.bc.ca".to_string()],
            exclude_patterns: vec!["login".to_string(), "search?".to_string()],
            crawl_delay_ms: defaults::crawl_delay_ms(),
            max_depth: defaults::max_depth(),
            language: DocumentLanguage::En,
            source_type: SourceType::Government,
            province: "BC".to_string(),
            active: true,
        },
    ]
}

mod defaults {
    pub fn crawl_delay_ms() -> u64 {
        1000
    }
    pub fn max_depth() -> usize {
        2
    }
    pub fn active() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> DiscoverySource {
        DiscoverySource {
            name: "Test".to_string(),
            base_url: "https://edu.example.ca".to_string(),
            seed_urls: vec![],
            allowed_domains: vec!["edu.example.ca".to_string()],
            exclude_patterns: vec!["/forms/".to_string()],
            crawl_delay_ms: 0,
            max_depth: 1,
            language: DocumentLanguage::En,
            source_type: SourceType::Government,
            province: "ON".to_string(),
            active: true,
        }
    }

    #[test]
    fn allows_domain_accepts_exact_and_subdomains() {
        let s = source();
        assert!(s.allows_domain("edu.example.ca"));
        assert!(s.allows_domain("files.edu.example.ca"));
        assert!(!s.allows_domain("evil.example.com"));
        assert!(!s.allows_domain("notedu.example.ca.evil.com"));
    }

    #[test]
    fn excludes_matches_substrings() {
        let s = source();
        assert!(s.excludes("https://edu.example.ca/forms/consent.pdf"));
        assert!(!s.excludes("https://edu.example.ca/curriculum/math.pdf"));
    }

    #[test]
    fn default_sources_are_active() {
        let sources = default_sources();
        assert!(!sources.is_empty());
        assert!(sources.iter().all(|s| s.active && !s.seed_urls.is_empty()));
    }
}
