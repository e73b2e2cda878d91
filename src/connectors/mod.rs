// src/connectors/mod.rs

//! External-source adapters.
//!
//! Each connector implements [`SourceConnector`] against one external site:
//! it builds that source's search URL, parses its listing HTML, and
//! normalizes the result into [`DiscoveredActivity`] through the shared
//! helpers in [`base`]. A fetch failure after retries degrades to an empty
//! result set; a single failing source never fails the aggregate search.
//!
//! Adding a source means adding one implementation and registering it in
//! [`default_connectors`]; the aggregator is untouched.

pub mod base;
pub mod edu_hub;
pub mod gov_portal;
pub mod marketplace;
pub mod mock;
pub mod open_resources;

use std::sync::Arc;

use async_trait::async_trait;

use crate::fetch::FetchCache;
use crate::models::{Config, DiscoveredActivity, NormalizedSearch};

pub use base::{ActivityDraft, RetryPolicy};
pub use edu_hub::EduHubConnector;
pub use gov_portal::GovPortalConnector;
pub use marketplace::MarketplaceConnector;
pub use mock::MockConnector;
pub use open_resources::OpenResourcesConnector;

/// Contract every external-source adapter implements.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Stable identifier recorded on every emitted activity.
    fn source_id(&self) -> &str;

    /// Inactive connectors are skipped by the aggregator.
    fn is_active(&self) -> bool {
        true
    }

    /// Search the source. Failures degrade to an empty result set.
    async fn search(&self, params: &NormalizedSearch) -> Vec<DiscoveredActivity>;

    /// Fetch one record's full detail, or `None` if gone or unreachable.
    async fn activity_details(&self, external_id: &str) -> Option<DiscoveredActivity>;

    /// Whether the activity still exists at the source.
    async fn check_availability(&self, external_id: &str) -> bool {
        self.activity_details(external_id).await.is_some()
    }
}

/// The static connector set used in production.
pub fn default_connectors(cache: Arc<FetchCache>, config: &Config) -> Vec<Arc<dyn SourceConnector>> {
    let policy = RetryPolicy::from_config(&config.http);
    vec![
        Arc::new(GovPortalConnector::new(cache.clone(), policy.clone())),
        Arc::new(EduHubConnector::new(cache.clone(), policy.clone())),
        Arc::new(MarketplaceConnector::new(cache.clone(), policy.clone())),
        Arc::new(OpenResourcesConnector::new(cache, policy)),
    ]
}
