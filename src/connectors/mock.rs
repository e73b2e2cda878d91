// src/connectors/mock.rs

//! Mock connector with a fixed in-memory catalog.
//!
//! Honors the full filter contract without any network access; used by
//! integration tests and local development.

use async_trait::async_trait;
use chrono::Utc;

use crate::connectors::SourceConnector;
use crate::models::{ActivityType, DiscoveredActivity, Language, NormalizedSearch};

pub const SOURCE_ID: &str = "mock";

/// Network-free connector over a hand-authored catalog.
pub struct MockConnector {
    catalog: Vec<DiscoveredActivity>,
    active: bool,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            catalog: catalog(),
            active: true,
        }
    }

    /// A mock connector that reports itself inactive.
    pub fn inactive() -> Self {
        Self {
            catalog: catalog(),
            active: false,
        }
    }

    /// A mock connector over a caller-supplied catalog.
    pub fn with_catalog(catalog: Vec<DiscoveredActivity>) -> Self {
        Self {
            catalog,
            active: true,
        }
    }

    fn matches(activity: &DiscoveredActivity, params: &NormalizedSearch) -> bool {
        if let Some(query) = &params.query {
            let needle = query.to_lowercase();
            let haystack =
                format!("{} {}", activity.title, activity.description).to_lowercase();
            if !haystack.contains(&needle) {
                return false;
            }
        }
        if let Some(grade) = params.grade {
            if grade < activity.grade_min || grade > activity.grade_max {
                return false;
            }
        }
        if let Some(subject) = &params.subject {
            if &activity.subject != subject {
                return false;
            }
        }
        if let Some(language) = params.language {
            if activity.language != language {
                return false;
            }
        }
        if params.free_only && !activity.is_free {
            return false;
        }
        true
    }
}

#[async_trait]
impl SourceConnector for MockConnector {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    fn is_active(&self) -> bool {
        self.active
    }

    async fn search(&self, params: &NormalizedSearch) -> Vec<DiscoveredActivity> {
        self.catalog
            .iter()
            .filter(|a| Self::matches(a, params))
            .cloned()
            .collect()
    }

    async fn activity_details(&self, external_id: &str) -> Option<DiscoveredActivity> {
        self.catalog
            .iter()
            .find(|a| a.external_id == external_id)
            .cloned()
    }
}

fn entry(
    external_id: &str,
    title: &str,
    description: &str,
    activity_type: ActivityType,
    grades: (u8, u8),
    subject: &str,
    is_free: bool,
    price: Option<f64>,
) -> DiscoveredActivity {
    DiscoveredActivity {
        source: SOURCE_ID.to_string(),
        external_id: external_id.to_string(),
        url: format!("https://mock.example/activities/{external_id}"),
        title: title.to_string(),
        description: description.to_string(),
        thumbnail_url: None,
        duration_minutes: Some(30),
        activity_type,
        grade_min: grades.0,
        grade_max: grades.1,
        subject: subject.to_string(),
        language: Language::En,
        materials: Vec::new(),
        technology: None,
        group_size: String::new(),
        tags: Vec::new(),
        is_free,
        price,
        license: String::new(),
        source_rating: None,
        source_review_count: None,
        internal_rating: None,
        internal_review_count: 0,
        last_verified: Utc::now(),
        is_active: true,
    }
}

/// The fixed catalog: for the query "fractions" it contains exactly two
/// free activities and one paid one.
fn catalog() -> Vec<DiscoveredActivity> {
    vec![
        entry(
            "mock-001",
            "Fraction Bingo",
            "Practice fractions with a bingo game.",
            ActivityType::Game,
            (3, 5),
            "math",
            true,
            None,
        ),
        entry(
            "mock-002",
            "Fractions on a Number Line",
            "Worksheet for placing fractions on a number line.",
            ActivityType::Worksheet,
            (3, 4),
            "math",
            true,
            None,
        ),
        entry(
            "mock-003",
            "Premium Fractions Unit",
            "Complete fractions unit with assessments.",
            ActivityType::LessonPlan,
            (3, 6),
            "math",
            false,
            Some(9.99),
        ),
        entry(
            "mock-004",
            "Plant Growth Journal",
            "Daily observation journal for a classroom plant.",
            ActivityType::Writing,
            (1, 3),
            "science",
            true,
            None,
        ),
        entry(
            "mock-005",
            "Kindergarten Letter Hunt",
            "Scavenger hunt for letters around the classroom.",
            ActivityType::Game,
            (0, 0),
            "language",
            true,
            None,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> NormalizedSearch {
        NormalizedSearch {
            query: None,
            grade: None,
            subject: None,
            language: None,
            limit: 20,
            offset: 0,
            free_only: true,
        }
    }

    #[tokio::test]
    async fn fractions_query_returns_two_free() {
        let connector = MockConnector::new();
        let mut p = params();
        p.query = Some("fractions".to_string());

        let results = connector.search(&p).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|a| a.is_free));
    }

    #[tokio::test]
    async fn paid_included_when_not_free_only() {
        let connector = MockConnector::new();
        let mut p = params();
        p.query = Some("fractions".to_string());
        p.free_only = false;

        let results = connector.search(&p).await;
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn grade_filter_uses_range() {
        let connector = MockConnector::new();
        let mut p = params();
        p.grade = Some(0);

        let results = connector.search(&p).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].external_id, "mock-005");
    }

    #[tokio::test]
    async fn details_are_idempotent() {
        let connector = MockConnector::new();
        let first = connector.activity_details("mock-001").await.unwrap();
        let second = connector.activity_details("mock-001").await.unwrap();
        assert_eq!(first.external_id, second.external_id);
        assert_eq!(first.title, second.title);
        assert!(connector.check_availability("mock-001").await);
        assert!(!connector.check_availability("missing").await);
    }
}
