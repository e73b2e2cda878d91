// src/aggregator.rs

//! Activity discovery aggregator.
//!
//! Fans a search request out across the active connectors concurrently,
//! merges results with source attribution, and windows them by the
//! normalized limit/offset. One slow source delays the response but cannot
//! corrupt or fail the others: connector failures surface as empty result
//! sets at the connector boundary, never as errors here.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;

use crate::connectors::SourceConnector;
use crate::error::Result;
use crate::models::{DiscoveredActivity, SearchConfig, SearchParams, SearchResults};
use crate::store::ActivityStore;

/// Aggregated search over the registered connector set.
pub struct SearchService {
    connectors: Vec<Arc<dyn SourceConnector>>,
    store: Arc<dyn ActivityStore>,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(
        connectors: Vec<Arc<dyn SourceConnector>>,
        store: Arc<dyn ActivityStore>,
        config: SearchConfig,
    ) -> Self {
        Self {
            connectors,
            store,
            config,
        }
    }

    /// Run a search across all active sources.
    pub async fn search(&self, params: &SearchParams, requester_id: &str) -> SearchResults {
        let started = Instant::now();
        let normalized = params.normalized(self.config.default_limit, self.config.max_limit);

        let active: Vec<&Arc<dyn SourceConnector>> = self
            .connectors
            .iter()
            .filter(|c| c.is_active())
            .collect();
        let sources: Vec<String> = active.iter().map(|c| c.source_id().to_string()).collect();

        log::info!(
            "Search by {requester_id}: query={:?} across {} sources",
            normalized.query,
            active.len()
        );

        let searches = active.iter().map(|connector| {
            let normalized = normalized.clone();
            async move { connector.search(&normalized).await }
        });
        let per_source: Vec<Vec<DiscoveredActivity>> = join_all(searches).await;

        let merged: Vec<DiscoveredActivity> = per_source.into_iter().flatten().collect();
        let total = merged.len();

        let window: Vec<DiscoveredActivity> = merged
            .into_iter()
            .skip(normalized.offset)
            .take(normalized.limit)
            .collect();
        let has_more = normalized.offset + window.len() < total;

        SearchResults {
            activities: window,
            total,
            has_more,
            search_params: normalized,
            sources,
            execution_time_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Look up one activity's full detail at its source.
    pub async fn activity(&self, source: &str, external_id: &str) -> Option<DiscoveredActivity> {
        let connector = self.connectors.iter().find(|c| c.source_id() == source)?;
        connector.activity_details(external_id).await
    }

    /// Whether a source is registered and active.
    pub fn is_source_available(&self, source: &str) -> bool {
        self.connectors
            .iter()
            .any(|c| c.source_id() == source && c.is_active())
    }

    /// Identifiers of all active sources.
    pub fn available_sources(&self) -> Vec<String> {
        self.connectors
            .iter()
            .filter(|c| c.is_active())
            .map(|c| c.source_id().to_string())
            .collect()
    }

    /// Persist an activity through the store collaborator.
    ///
    /// Pass-through: the store's upsert semantics guarantee re-imports of
    /// the same `(source, external_id)` overwrite rather than duplicate.
    pub async fn save_activity(&self, activity: DiscoveredActivity) -> Result<String> {
        self.store.upsert(activity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::connectors::MockConnector;
    use crate::models::NormalizedSearch;
    use crate::store::MemoryStore;

    /// Connector whose every operation fails at the fetch layer.
    struct DeadConnector;

    #[async_trait]
    impl SourceConnector for DeadConnector {
        fn source_id(&self) -> &str {
            "dead"
        }

        async fn search(&self, _params: &NormalizedSearch) -> Vec<DiscoveredActivity> {
            Vec::new()
        }

        async fn activity_details(&self, _external_id: &str) -> Option<DiscoveredActivity> {
            None
        }
    }

    fn service(connectors: Vec<Arc<dyn SourceConnector>>) -> SearchService {
        SearchService::new(connectors, Arc::new(MemoryStore::new()), SearchConfig::default())
    }

    fn fractions_params() -> SearchParams {
        SearchParams {
            query: Some("fractions".to_string()),
            ..SearchParams::default()
        }
    }

    #[tokio::test]
    async fn free_only_search_returns_two_free_fraction_activities() {
        let service = service(vec![Arc::new(MockConnector::new())]);

        let results = service.search(&fractions_params(), "teacher-1").await;
        assert_eq!(results.total, 2);
        assert_eq!(results.activities.len(), 2);
        assert!(results.activities.iter().all(|a| a.is_free));
        assert!(!results.has_more);
        assert_eq!(results.sources, vec!["mock"]);
    }

    #[tokio::test]
    async fn failing_source_does_not_poison_the_aggregate() {
        let service = service(vec![
            Arc::new(DeadConnector),
            Arc::new(MockConnector::new()),
        ]);

        let results = service.search(&fractions_params(), "teacher-1").await;
        assert_eq!(results.total, 2);
        assert_eq!(results.sources.len(), 2);
    }

    #[tokio::test]
    async fn inactive_sources_are_skipped() {
        let service = service(vec![
            Arc::new(MockConnector::inactive()),
            Arc::new(MockConnector::new()),
        ]);

        let results = service.search(&fractions_params(), "teacher-1").await;
        // Both register as "mock" but only the active one is dispatched.
        assert_eq!(results.sources, vec!["mock"]);
        assert_eq!(results.total, 2);
    }

    #[tokio::test]
    async fn windowing_reports_has_more() {
        let service = service(vec![Arc::new(MockConnector::new())]);
        let params = SearchParams {
            limit: Some(2),
            ..SearchParams::default()
        };

        let results = service.search(&params, "teacher-1").await;
        assert_eq!(results.activities.len(), 2);
        assert!(results.has_more);
        assert!(results.total > 2);

        let params = SearchParams {
            limit: Some(2),
            offset: Some(results.total as i64),
            ..SearchParams::default()
        };
        let tail = service.search(&params, "teacher-1").await;
        assert!(tail.activities.is_empty());
        assert!(!tail.has_more);
    }

    #[tokio::test]
    async fn out_of_range_paging_is_clamped() {
        let service = service(vec![Arc::new(MockConnector::new())]);
        let params = SearchParams {
            limit: Some(200),
            offset: Some(-5),
            ..SearchParams::default()
        };

        let results = service.search(&params, "teacher-1").await;
        assert_eq!(results.search_params.limit, 100);
        assert_eq!(results.search_params.offset, 0);
    }

    #[tokio::test]
    async fn source_availability_queries() {
        let service = service(vec![Arc::new(MockConnector::new())]);
        assert!(service.is_source_available("mock"));
        assert!(!service.is_source_available("unknown"));
        assert_eq!(service.available_sources(), vec!["mock"]);
    }

    #[tokio::test]
    async fn activity_lookup_routes_to_source() {
        let service = service(vec![Arc::new(MockConnector::new())]);
        let found = service.activity("mock", "mock-001").await;
        assert!(found.is_some());
        assert!(service.activity("unknown", "mock-001").await.is_none());
    }
}
