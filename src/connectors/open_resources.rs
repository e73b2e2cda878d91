// src/connectors/open_resources.rs

//! Connector for the open educational resources API.
//!
//! The only JSON source: responses deserialize straight into typed records,
//! so there is no HTML parsing and no enrichment pass.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::connectors::base::{fetch_with_retry, ActivityDraft, RetryPolicy};
use crate::connectors::SourceConnector;
use crate::fetch::FetchCache;
use crate::models::{DiscoveredActivity, Language, NormalizedSearch};

const SOURCE_ID: &str = "open_resources";
const DEFAULT_BASE: &str = "https://api.openlessons.org";

/// Adapter for the open-resources JSON API.
pub struct OpenResourcesConnector {
    cache: Arc<FetchCache>,
    policy: RetryPolicy,
    base_url: String,
    active: bool,
}

impl OpenResourcesConnector {
    pub fn new(cache: Arc<FetchCache>, policy: RetryPolicy) -> Self {
        Self::with_base_url(cache, policy, DEFAULT_BASE)
    }

    pub fn with_base_url(
        cache: Arc<FetchCache>,
        policy: RetryPolicy,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            policy,
            base_url: base_url.into(),
            active: true,
        }
    }

    fn search_url(&self, params: &NormalizedSearch) -> String {
        let mut url = format!("{}/v1/resources?per_page={}&", self.base_url, params.limit);
        if let Some(query) = &params.query {
            url.push_str(&format!("q={}&", query.replace(' ', "+")));
        }
        if let Some(grade) = params.grade {
            url.push_str(&format!("grade={grade}&"));
        }
        if let Some(subject) = &params.subject {
            url.push_str(&format!("subject={subject}&"));
        }
        let lang = match params.language {
            Some(Language::Fr) => "fr",
            _ => "en",
        };
        url.push_str(&format!("lang={lang}"));
        url
    }

    fn detail_url(&self, external_id: &str) -> String {
        format!("{}/v1/resources/{}", self.base_url, external_id)
    }
}

/// API resource shape; missing fields deserialize to `None`/empty.
#[derive(Debug, Deserialize)]
struct ApiResource {
    id: String,
    title: String,
    url: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    grade_low: Option<u8>,
    #[serde(default)]
    grade_high: Option<u8>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    duration_minutes: Option<u32>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiSearchResponse {
    #[serde(default)]
    results: Vec<ApiResource>,
}

fn resource_to_activity(resource: ApiResource) -> DiscoveredActivity {
    let mut draft = ActivityDraft::new(SOURCE_ID, resource.id, resource.url, resource.title);
    draft.description = resource.summary;
    draft.thumbnail_url = resource.thumbnail;
    draft.duration_minutes = resource.duration_minutes;
    draft.subject_text = resource.subject;
    draft.tags = resource.tags;
    draft.license = resource.license;
    draft.language = match resource.language.as_deref() {
        Some("fr") => Some(Language::Fr),
        Some(_) => Some(Language::En),
        None => None,
    };
    if let (Some(lo), Some(hi)) = (resource.grade_low, resource.grade_high) {
        draft.grade_range = Some((lo.min(hi), lo.max(hi).min(12)));
    }
    draft.into_activity()
}

#[async_trait]
impl SourceConnector for OpenResourcesConnector {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    fn is_active(&self) -> bool {
        self.active
    }

    async fn search(&self, params: &NormalizedSearch) -> Vec<DiscoveredActivity> {
        let url = self.search_url(params);
        let body = match fetch_with_retry(&self.cache, &url, &self.policy).await {
            Ok(body) => body,
            Err(e) => {
                log::warn!("{SOURCE_ID}: search fetch failed: {e}");
                return Vec::new();
            }
        };

        let response: ApiSearchResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("{SOURCE_ID}: unexpected response shape: {e}");
                return Vec::new();
            }
        };

        response
            .results
            .into_iter()
            .map(resource_to_activity)
            .collect()
    }

    async fn activity_details(&self, external_id: &str) -> Option<DiscoveredActivity> {
        let url = self.detail_url(external_id);
        let body = match fetch_with_retry(&self.cache, &url, &self.policy).await {
            Ok(body) => body,
            Err(e) => {
                log::debug!("{SOURCE_ID}: detail fetch failed for {external_id}: {e}");
                return None;
            }
        };

        match serde_json::from_str::<ApiResource>(&body) {
            Ok(resource) => Some(resource_to_activity(resource)),
            Err(e) => {
                log::debug!("{SOURCE_ID}: unexpected detail shape for {external_id}: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityType;

    #[test]
    fn resource_maps_to_canonical_record() {
        let json = r#"{
            "id": "oer-123",
            "title": "Fraction number line game",
            "url": "https://openlessons.org/r/oer-123",
            "summary": "Place fractions on a number line.",
            "grade_low": 3,
            "grade_high": 5,
            "subject": "Mathematics",
            "language": "en",
            "license": "CC BY 4.0",
            "duration_minutes": 20,
            "tags": ["fractions", "number-sense"]
        }"#;
        let resource: ApiResource = serde_json::from_str(json).unwrap();
        let activity = resource_to_activity(resource);

        assert_eq!(activity.external_id, "oer-123");
        assert_eq!((activity.grade_min, activity.grade_max), (3, 5));
        assert_eq!(activity.subject, "math");
        assert_eq!(activity.activity_type, ActivityType::Game);
        assert_eq!(activity.license, "CC BY 4.0");
        assert!(activity.is_free);
    }

    #[test]
    fn sparse_resource_still_valid() {
        let json = r#"{
            "id": "oer-9",
            "title": "Untitled resource",
            "url": "https://openlessons.org/r/oer-9"
        }"#;
        let resource: ApiResource = serde_json::from_str(json).unwrap();
        let activity = resource_to_activity(resource);

        assert_eq!((activity.grade_min, activity.grade_max), (0, 12));
        assert_eq!(activity.subject, "general");
        assert!(activity.is_free);
    }

    #[test]
    fn empty_results_parse_cleanly() {
        let response: ApiSearchResponse = serde_json::from_str(r#"{"results": []}"#).unwrap();
        assert!(response.results.is_empty());
        let response: ApiSearchResponse = serde_json::from_str("{}").unwrap();
        assert!(response.results.is_empty());
    }
}
