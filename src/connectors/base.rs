// src/connectors/base.rs

//! Shared connector machinery: retrying fetch, text heuristics, and
//! canonical-record defaulting.
//!
//! The heuristics are pure functions over text so they can be tested
//! table-driven, independent of any connector.

use std::time::Duration;

use chrono::Utc;
use regex::Regex;

use crate::error::{AppError, Result};
use crate::fetch::FetchCache;
use crate::models::config::HttpConfig;
use crate::models::{ActivityType, DiscoveredActivity, Language};

/// Retry/backoff behavior for connector fetches.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts per fetch
    pub attempts: u32,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Base backoff; scales linearly with the attempt number
    pub base_delay: Duration,
    /// Larger backoff applied to HTTP 429 responses
    pub rate_limit_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(http: &HttpConfig) -> Self {
        Self {
            attempts: http.retry_attempts,
            timeout: Duration::from_secs(http.timeout_secs),
            base_delay: Duration::from_millis(http.retry_base_delay_ms),
            rate_limit_backoff: Duration::from_millis(http.rate_limit_backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: Duration::from_secs(30),
            base_delay: Duration::from_millis(500),
            rate_limit_backoff: Duration::from_millis(2000),
        }
    }
}

/// Fetch through the cache with timeout, retry, and backoff.
///
/// Each attempt is bounded by the policy timeout; a timed-out attempt is
/// aborted and retried like any other transient failure. Rate-limited
/// responses (429) back off harder than ordinary failures.
pub async fn fetch_with_retry(cache: &FetchCache, url: &str, policy: &RetryPolicy) -> Result<String> {
    let mut last_err: Option<AppError> = None;

    for attempt in 1..=policy.attempts.max(1) {
        match tokio::time::timeout(policy.timeout, cache.fetch(url)).await {
            Ok(Ok(body)) => return Ok(body),
            Ok(Err(e)) => {
                let backoff = if e.status() == Some(429) {
                    policy.rate_limit_backoff * attempt
                } else {
                    policy.base_delay * attempt
                };
                log::debug!("Fetch attempt {attempt} failed for {url}: {e}");
                last_err = Some(e);
                if attempt < policy.attempts {
                    tokio::time::sleep(backoff).await;
                }
            }
            Err(_) => {
                log::debug!("Fetch attempt {attempt} timed out for {url}");
                last_err = Some(AppError::fetch(url, "request timed out"));
                if attempt < policy.attempts {
                    tokio::time::sleep(policy.base_delay * attempt).await;
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| AppError::fetch(url, "no attempts made")))
}

fn grade_token(token: &str) -> Option<u8> {
    if token.eq_ignore_ascii_case("k") {
        return Some(0);
    }
    token.parse::<u8>().ok().filter(|g| *g <= 12)
}

/// Parse a grade range from free text.
///
/// Handles "K", "Grade 3", "3rd Grade", "Grades 1-3", "Grades K to 2".
pub fn parse_grade_range(text: &str) -> Option<(u8, u8)> {
    let range = Regex::new(r"(?i)\bgrades?\s*(k|\d{1,2})\s*(?:-|–|—|to|through)\s*(k|\d{1,2})\b")
        .expect("static regex");
    if let Some(caps) = range.captures(text) {
        let lo = grade_token(&caps[1])?;
        let hi = grade_token(&caps[2])?;
        return Some((lo.min(hi), lo.max(hi)));
    }

    let single = Regex::new(r"(?i)\bgrade\s*(\d{1,2})\b").expect("static regex");
    if let Some(caps) = single.captures(text) {
        let g = grade_token(&caps[1])?;
        return Some((g, g));
    }

    let ordinal = Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)[\s-]+grade\b").expect("static regex");
    if let Some(caps) = ordinal.captures(text) {
        let g = grade_token(&caps[1])?;
        return Some((g, g));
    }

    let kinder = Regex::new(r"(?i)\bkindergarten\b|^\s*k\s*$").expect("static regex");
    if kinder.is_match(text) {
        return Some((0, 0));
    }

    None
}

/// Normalize a subject name to the fixed vocabulary.
///
/// Unrecognized subjects fall back to the lowercased input.
pub fn normalize_subject(raw: &str) -> String {
    const TABLE: &[(&[&str], &str)] = &[
        (&["math", "maths", "mathematics", "numeracy"], "math"),
        (
            &["language", "language arts", "english", "ela", "literacy", "english language arts"],
            "language",
        ),
        (&["science", "sciences", "stem"], "science"),
        (
            &["social studies", "social science", "history", "geography", "civics"],
            "social_studies",
        ),
        (&["french", "francais", "français", "fsl"], "french"),
        (
            &["art", "arts", "visual arts", "music", "drama", "dance"],
            "arts",
        ),
        (
            &["physical education", "phys ed", "pe", "gym", "health", "health and physical education"],
            "health_pe",
        ),
        (
            &["technology", "computer science", "coding", "computers"],
            "technology",
        ),
    ];

    let needle = raw.trim().to_lowercase();
    for (aliases, canonical) in TABLE {
        if aliases.contains(&needle.as_str()) {
            return (*canonical).to_string();
        }
    }
    needle
}

/// Infer an activity type from combined title/description text.
pub fn infer_activity_type(text: &str) -> ActivityType {
    const TABLE: &[(&[&str], ActivityType)] = &[
        (&["video", "watch", "film"], ActivityType::Video),
        (&["game", "bingo", "puzzle", "scavenger"], ActivityType::Game),
        (&["experiment", "lab", "laboratory"], ActivityType::Experiment),
        (&["project", "build a", "design a"], ActivityType::Project),
        (
            &["assessment", "quiz", "test", "rubric", "exit ticket"],
            ActivityType::Assessment,
        ),
        (&["lesson plan", "unit plan", "lesson"], ActivityType::LessonPlan),
        (&["read-aloud", "reading", "story", "book study"], ActivityType::Reading),
        (&["writing", "journal", "essay", "prompt"], ActivityType::Writing),
        (&["craft", "art project", "painting", "drawing", "collage"], ActivityType::ArtCraft),
        (&["center", "station", "rotation"], ActivityType::CenterActivity),
        (&["hands-on", "manipulative", "sorting"], ActivityType::HandsOn),
        (&["document", "handbook", "guide"], ActivityType::Document),
    ];

    let lower = text.to_lowercase();
    for (keywords, kind) in TABLE {
        if keywords.iter().any(|k| lower.contains(k)) {
            return *kind;
        }
    }
    ActivityType::Worksheet
}

const MATERIAL_LABELS: &[&str] = &["materials needed:", "you will need:", "supplies:"];

const COMMON_MATERIALS: &[&str] = &[
    "scissors",
    "glue",
    "paper",
    "pencils",
    "crayons",
    "markers",
    "dice",
    "index cards",
    "counters",
    "blocks",
    "ruler",
    "tape",
    "string",
    "paint",
    "whiteboard",
    "sticky notes",
];

/// Extract a materials list from free text.
///
/// Looks for labeled lists first, then falls back to scanning for common
/// classroom objects. Order of first mention is preserved.
pub fn extract_materials(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut materials: Vec<String> = Vec::new();

    for label in MATERIAL_LABELS {
        if let Some(idx) = lower.find(label) {
            let rest = &lower[idx + label.len()..];
            let line = rest
                .split(['\n', '.'])
                .next()
                .unwrap_or("");
            for item in line.split([',', ';']).flat_map(|s| s.split(" and ")) {
                let item = item.trim().trim_start_matches("a ").trim();
                if !item.is_empty() && !materials.iter().any(|m| m == item) {
                    materials.push(item.to_string());
                }
            }
        }
    }

    for object in COMMON_MATERIALS {
        if lower.contains(object) && !materials.iter().any(|m| m.contains(object)) {
            materials.push((*object).to_string());
        }
    }

    materials
}

/// Partially populated record as parsed from one source.
///
/// [`ActivityDraft::into_activity`] fills every missing field with a safe
/// default, so a sparse source never produces an invalid canonical record.
#[derive(Debug, Clone, Default)]
pub struct ActivityDraft {
    pub source: String,
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_minutes: Option<u32>,
    pub activity_type: Option<ActivityType>,
    /// Explicit grade range; takes precedence over `grade_text`
    pub grade_range: Option<(u8, u8)>,
    pub grade_text: Option<String>,
    pub subject_text: Option<String>,
    pub language: Option<Language>,
    pub materials: Vec<String>,
    pub technology: Option<Vec<String>>,
    pub group_size: Option<String>,
    pub tags: Vec<String>,
    pub price: Option<f64>,
    pub license: Option<String>,
    pub source_rating: Option<f32>,
    pub source_review_count: Option<u32>,
}

impl ActivityDraft {
    pub fn new(
        source: impl Into<String>,
        external_id: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            external_id: external_id.into(),
            url: url.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Normalize into the canonical record, defaulting every gap.
    pub fn into_activity(self) -> DiscoveredActivity {
        let description = self.description.unwrap_or_default();
        let combined = format!("{} {}", self.title, description);

        let (grade_min, grade_max) = self
            .grade_range
            .or_else(|| self.grade_text.as_deref().and_then(parse_grade_range))
            .or_else(|| parse_grade_range(&combined))
            .unwrap_or((0, 12));

        let subject = self
            .subject_text
            .as_deref()
            .map(normalize_subject)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "general".to_string());

        let activity_type = self
            .activity_type
            .unwrap_or_else(|| infer_activity_type(&combined));

        let materials = if self.materials.is_empty() {
            extract_materials(&combined)
        } else {
            self.materials
        };

        let is_free = self.price.map(|p| p <= 0.0).unwrap_or(true);

        DiscoveredActivity {
            source: self.source,
            external_id: self.external_id,
            url: self.url,
            title: self.title,
            description,
            thumbnail_url: self.thumbnail_url,
            duration_minutes: self.duration_minutes,
            activity_type,
            grade_min,
            grade_max,
            subject,
            language: self.language.unwrap_or_default(),
            materials,
            technology: self.technology,
            group_size: self.group_size.unwrap_or_default(),
            tags: self.tags,
            is_free,
            price: self.price.filter(|p| *p > 0.0),
            license: self.license.unwrap_or_default(),
            source_rating: self.source_rating,
            source_review_count: self.source_review_count,
            internal_rating: None,
            internal_review_count: 0,
            last_verified: Utc::now(),
            is_active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_range_table() {
        let cases = [
            ("K", Some((0, 0))),
            ("Kindergarten readiness", Some((0, 0))),
            ("Grade 3", Some((3, 3))),
            ("grade 11 physics", Some((11, 11))),
            ("3rd Grade", Some((3, 3))),
            ("1st grade fun", Some((1, 1))),
            ("Grades 1-3", Some((1, 3))),
            ("Grades K to 2", Some((0, 2))),
            ("Grades 5 through 8", Some((5, 8))),
            ("Grades 3-1", Some((1, 3))),
            ("no grades here", None),
            ("Grade 99", None),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_grade_range(input), expected, "input: {input}");
        }
    }

    #[test]
    fn subject_table() {
        let cases = [
            ("Mathematics", "math"),
            ("maths", "math"),
            ("ELA", "language"),
            ("History", "social_studies"),
            ("Français", "french"),
            ("Phys Ed", "health_pe"),
            ("Visual Arts", "arts"),
            ("Underwater Basket Weaving", "underwater basket weaving"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize_subject(input), expected, "input: {input}");
        }
    }

    #[test]
    fn activity_type_table() {
        let cases = [
            ("Watch this video about frogs", ActivityType::Video),
            ("Fraction bingo game", ActivityType::Game),
            ("Density lab experiment", ActivityType::Experiment),
            ("End of unit quiz", ActivityType::Assessment),
            ("Printable fractions practice", ActivityType::Worksheet),
        ];
        for (input, expected) in cases {
            assert_eq!(infer_activity_type(input), expected, "input: {input}");
        }
    }

    #[test]
    fn materials_from_label() {
        let text = "Materials needed: scissors, glue and construction paper. Cut out the shapes.";
        let materials = extract_materials(text);
        assert_eq!(materials[0], "scissors");
        assert_eq!(materials[1], "glue");
        assert!(materials.iter().any(|m| m.contains("construction paper")));
    }

    #[test]
    fn materials_from_dictionary() {
        let text = "Students roll dice and record sums with markers on the whiteboard.";
        let materials = extract_materials(text);
        assert!(materials.contains(&"dice".to_string()));
        assert!(materials.contains(&"markers".to_string()));
        assert!(materials.contains(&"whiteboard".to_string()));
    }

    #[test]
    fn materials_empty_without_hints() {
        assert!(extract_materials("Discuss the water cycle as a class.").is_empty());
    }

    #[test]
    fn draft_defaults_are_safe() {
        let activity =
            ActivityDraft::new("src", "id-1", "https://example.com/1", "Mystery resource")
                .into_activity();
        assert_eq!(activity.grade_min, 0);
        assert_eq!(activity.grade_max, 12);
        assert_eq!(activity.subject, "general");
        assert_eq!(activity.activity_type, ActivityType::Worksheet);
        assert!(activity.is_free);
        assert!(activity.is_active);
    }

    #[test]
    fn draft_infers_from_combined_text() {
        let mut draft = ActivityDraft::new(
            "src",
            "id-2",
            "https://example.com/2",
            "Grade 2 subtraction game",
        );
        draft.subject_text = Some("Mathematics".to_string());
        let activity = draft.into_activity();
        assert_eq!((activity.grade_min, activity.grade_max), (2, 2));
        assert_eq!(activity.subject, "math");
        assert_eq!(activity.activity_type, ActivityType::Game);
    }

    #[test]
    fn draft_priced_record_is_paid() {
        let mut draft = ActivityDraft::new("src", "id-3", "https://example.com/3", "Unit bundle");
        draft.price = Some(4.99);
        let activity = draft.into_activity();
        assert!(!activity.is_free);
        assert_eq!(activity.price, Some(4.99));
    }

    #[tokio::test]
    async fn retry_gives_up_after_attempts() {
        use crate::fetch::{FetchCache, PageFetcher};
        use crate::models::CacheConfig;
        use async_trait::async_trait;
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        struct AlwaysFails(AtomicU32);

        #[async_trait]
        impl PageFetcher for AlwaysFails {
            async fn get(&self, url: &str) -> crate::error::Result<String> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(AppError::fetch(url, "down"))
            }
        }

        let fetcher = Arc::new(AlwaysFails(AtomicU32::new(0)));
        let cache = FetchCache::new(
            fetcher.clone(),
            &CacheConfig {
                ttl_secs: 900,
                render_settle_ms: 0,
            },
        );
        let policy = RetryPolicy {
            attempts: 3,
            timeout: Duration::from_secs(5),
            base_delay: Duration::from_millis(1),
            rate_limit_backoff: Duration::from_millis(1),
        };

        let result = fetch_with_retry(&cache, "https://example.com/x", &policy).await;
        assert!(result.is_err());
        assert_eq!(fetcher.0.load(Ordering::SeqCst), 3);
    }
}
