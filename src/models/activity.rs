// src/models/activity.rs

//! Canonical activity record and search parameter structures.
//!
//! Every connector translates its source-specific listing shape into
//! [`DiscoveredActivity`]. The `(source, external_id)` pair is the stable
//! composite key: re-discovering the same pair overwrites, never duplicates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resource language.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fr,
}

/// Kind of teaching activity.
///
/// Open set: unknown wire values deserialize to `Worksheet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivityType {
    #[default]
    Worksheet,
    Video,
    Game,
    Experiment,
    Project,
    Assessment,
    LessonPlan,
    Reading,
    Writing,
    ArtCraft,
    CenterActivity,
    HandsOn,
    Document,
}

impl ActivityType {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Worksheet => "worksheet",
            Self::Video => "video",
            Self::Game => "game",
            Self::Experiment => "experiment",
            Self::Project => "project",
            Self::Assessment => "assessment",
            Self::LessonPlan => "lesson_plan",
            Self::Reading => "reading",
            Self::Writing => "writing",
            Self::ArtCraft => "art_craft",
            Self::CenterActivity => "center_activity",
            Self::HandsOn => "hands_on",
            Self::Document => "document",
        }
    }

    /// Parse a wire value, falling back to `Worksheet` for anything unknown.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "video" => Self::Video,
            "game" => Self::Game,
            "experiment" => Self::Experiment,
            "project" => Self::Project,
            "assessment" => Self::Assessment,
            "lesson_plan" => Self::LessonPlan,
            "reading" => Self::Reading,
            "writing" => Self::Writing,
            "art_craft" => Self::ArtCraft,
            "center_activity" => Self::CenterActivity,
            "hands_on" => Self::HandsOn,
            "document" => Self::Document,
            _ => Self::Worksheet,
        }
    }
}

impl Serialize for ActivityType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActivityType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw))
    }
}

/// A teaching activity normalized from an external source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveredActivity {
    /// Connector identifier the record came from
    pub source: String,

    /// Identifier unique within the source
    pub external_id: String,

    /// Canonical URL of the activity
    pub url: String,

    /// Display title
    pub title: String,

    /// Short description
    #[serde(default)]
    pub description: String,

    /// Thumbnail image URL, if the source provides one
    #[serde(default)]
    pub thumbnail_url: Option<String>,

    /// Estimated duration in minutes
    #[serde(default)]
    pub duration_minutes: Option<u32>,

    /// Inferred activity type
    #[serde(default)]
    pub activity_type: ActivityType,

    /// Lowest applicable grade (0 = kindergarten)
    #[serde(default)]
    pub grade_min: u8,

    /// Highest applicable grade
    #[serde(default)]
    pub grade_max: u8,

    /// Subject normalized to the fixed vocabulary
    #[serde(default)]
    pub subject: String,

    /// Resource language
    #[serde(default)]
    pub language: Language,

    /// Required classroom materials, in order of mention
    #[serde(default)]
    pub materials: Vec<String>,

    /// Technology requirements (tablets, internet, ...)
    #[serde(default)]
    pub technology: Option<Vec<String>>,

    /// Suggested group size, free text
    #[serde(default)]
    pub group_size: String,

    /// Pedagogical tags and curriculum alignment codes
    #[serde(default)]
    pub tags: Vec<String>,

    /// Whether the resource is free to use
    #[serde(default = "default_true")]
    pub is_free: bool,

    /// Price in source currency, if paid
    #[serde(default)]
    pub price: Option<f64>,

    /// License string as published by the source
    #[serde(default)]
    pub license: String,

    /// Source-side average rating
    #[serde(default)]
    pub source_rating: Option<f32>,

    /// Source-side review count
    #[serde(default)]
    pub source_review_count: Option<u32>,

    /// Internal average rating
    #[serde(default)]
    pub internal_rating: Option<f32>,

    /// Internal review count
    #[serde(default)]
    pub internal_review_count: u32,

    /// When the record was last confirmed to exist
    pub last_verified: DateTime<Utc>,

    /// False once the source reports the activity gone
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl DiscoveredActivity {
    /// Composite key stable across re-discovery.
    pub fn composite_key(&self) -> String {
        format!("{}:{}", self.source, self.external_id)
    }
}

/// Raw search request as received from a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// Free-text query
    #[serde(default)]
    pub query: Option<String>,

    /// Grade filter (0 = kindergarten)
    #[serde(default)]
    pub grade: Option<u8>,

    /// Legacy alias for `grade`; folded in during normalization
    #[serde(default)]
    pub grade_level: Option<u8>,

    /// Subject filter, normalized before dispatch
    #[serde(default)]
    pub subject: Option<String>,

    /// Language filter
    #[serde(default)]
    pub language: Option<Language>,

    /// Requested page size
    #[serde(default)]
    pub limit: Option<i64>,

    /// Requested page offset
    #[serde(default)]
    pub offset: Option<i64>,

    /// When true (the default), paid resources are filtered out
    #[serde(default = "default_true")]
    pub free_only: bool,
}

/// `free_only` defaults to true on both the serde and the construction path.
impl Default for SearchParams {
    fn default() -> Self {
        Self {
            query: None,
            grade: None,
            grade_level: None,
            subject: None,
            language: None,
            limit: None,
            offset: None,
            free_only: true,
        }
    }
}

/// Search request after normalization and clamping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedSearch {
    pub query: Option<String>,
    pub grade: Option<u8>,
    pub subject: Option<String>,
    pub language: Option<Language>,
    /// Always in `[1, max_limit]`
    pub limit: usize,
    /// Always `>= 0`
    pub offset: usize,
    pub free_only: bool,
}

impl SearchParams {
    /// Normalize a raw request: fold the legacy `grade_level` alias into
    /// `grade`, clamp `limit` to `[1, max_limit]`, and floor `offset` at 0.
    pub fn normalized(&self, default_limit: usize, max_limit: usize) -> NormalizedSearch {
        let limit = match self.limit {
            Some(n) if n < 1 => default_limit,
            Some(n) => (n as usize).min(max_limit),
            None => default_limit,
        };
        let offset = match self.offset {
            Some(n) if n > 0 => n as usize,
            _ => 0,
        };

        NormalizedSearch {
            query: self
                .query
                .as_ref()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty()),
            grade: self.grade.or(self.grade_level),
            subject: self.subject.clone(),
            language: self.language,
            limit: limit.clamp(1, max_limit),
            offset,
            free_only: self.free_only,
        }
    }
}

/// Aggregated search response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    /// Activities within the requested window
    pub activities: Vec<DiscoveredActivity>,

    /// Total matches across all sources before windowing
    pub total: usize,

    /// Whether results exist beyond the window
    pub has_more: bool,

    /// The parameters actually used after normalization
    pub search_params: NormalizedSearch,

    /// Sources that participated in the search
    pub sources: Vec<String>,

    /// Wall-clock execution time
    pub execution_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_clamps_limit_and_offset() {
        let params = SearchParams {
            limit: Some(200),
            offset: Some(-5),
            ..SearchParams::default()
        };
        let norm = params.normalized(20, 100);
        assert_eq!(norm.limit, 100);
        assert_eq!(norm.offset, 0);
    }

    #[test]
    fn normalized_defaults_missing_paging() {
        let norm = SearchParams::default().normalized(20, 100);
        assert_eq!(norm.limit, 20);
        assert_eq!(norm.offset, 0);
        assert!(norm.free_only);
    }

    #[test]
    fn default_params_are_free_only() {
        // Both construction paths must agree on the free-only policy.
        assert!(SearchParams::default().free_only);
        let parsed: SearchParams = serde_json::from_str("{}").unwrap();
        assert!(parsed.free_only);
    }

    #[test]
    fn normalized_rejects_nonpositive_limit() {
        let params = SearchParams {
            limit: Some(0),
            ..SearchParams::default()
        };
        assert_eq!(params.normalized(20, 100).limit, 20);
    }

    #[test]
    fn normalized_folds_grade_level_alias() {
        let params = SearchParams {
            grade_level: Some(4),
            ..SearchParams::default()
        };
        assert_eq!(params.normalized(20, 100).grade, Some(4));

        // Canonical field wins when both are present.
        let params = SearchParams {
            grade: Some(2),
            grade_level: Some(4),
            ..SearchParams::default()
        };
        assert_eq!(params.normalized(20, 100).grade, Some(2));
    }

    #[test]
    fn normalized_drops_blank_query() {
        let params = SearchParams {
            query: Some("   ".to_string()),
            ..SearchParams::default()
        };
        assert_eq!(params.normalized(20, 100).query, None);
    }

    #[test]
    fn activity_type_unknown_defaults_to_worksheet() {
        let parsed: ActivityType = serde_json::from_str("\"interpretive_dance\"").unwrap();
        assert_eq!(parsed, ActivityType::Worksheet);
    }

    #[test]
    fn activity_round_trips_through_json() {
        let activity = DiscoveredActivity {
            source: "mock".to_string(),
            external_id: "a-1".to_string(),
            url: "https://example.com/a-1".to_string(),
            title: "Fraction Bingo".to_string(),
            description: "A bingo game for practicing fractions".to_string(),
            thumbnail_url: Some("https://example.com/a-1.png".to_string()),
            duration_minutes: Some(30),
            activity_type: ActivityType::Game,
            grade_min: 3,
            grade_max: 5,
            subject: "math".to_string(),
            language: Language::En,
            materials: vec!["bingo cards".to_string(), "counters".to_string()],
            technology: None,
            group_size: "whole class".to_string(),
            tags: vec!["B1.4".to_string()],
            is_free: true,
            price: None,
            license: "CC BY 4.0".to_string(),
            source_rating: Some(4.5),
            source_review_count: Some(12),
            internal_rating: None,
            internal_review_count: 0,
            last_verified: Utc::now(),
            is_active: true,
        };

        let json = serde_json::to_string(&activity).unwrap();
        let parsed: DiscoveredActivity = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, activity);
    }
}
