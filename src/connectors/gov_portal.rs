// src/connectors/gov_portal.rs

//! Connector for the provincial curriculum portal.
//!
//! Everything on the portal is openly licensed, so records are always free.
//! The portal encodes kindergarten as the literal grade token `K` and keys
//! subjects by its own slug vocabulary.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use crate::connectors::base::{fetch_with_retry, ActivityDraft, RetryPolicy};
use crate::connectors::SourceConnector;
use crate::fetch::FetchCache;
use crate::models::{ActivityType, DiscoveredActivity, Language, NormalizedSearch};
use crate::utils::resolve_url;

const SOURCE_ID: &str = "gov_portal";
const DEFAULT_BASE: &str = "https://www.dcp.edu.gov.on.ca";
const LICENSE: &str = "Open Government Licence - Ontario";

/// Adapter for the provincial government curriculum portal.
pub struct GovPortalConnector {
    cache: Arc<FetchCache>,
    policy: RetryPolicy,
    base_url: String,
    active: bool,
}

impl GovPortalConnector {
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
        let lang = match params.language {
            Some(Language::Fr) => "fr",
            _ => "en",
        };
        let mut url = format!("{}/{}/search?", self.base_url, lang);

        if let Some(query) = &params.query {
            url.push_str(&format!("keyword={}&", urlencode(query)));
        }
        if let Some(grade) = params.grade {
            url.push_str(&format!("grade={}&", grade_token(grade)));
        }
        if let Some(subject) = &params.subject {
            url.push_str(&format!("subject={}&", portal_subject(subject)));
        }
        url.trim_end_matches(['&', '?']).to_string()
    }

    fn detail_url(&self, external_id: &str) -> String {
        format!("{}/en/resource/{}", self.base_url, external_id)
    }
}

/// Portal grade token: kindergarten is `K`, other grades are numbers.
fn grade_token(grade: u8) -> String {
    if grade == 0 {
        "K".to_string()
    } else {
        grade.to_string()
    }
}

/// Map a normalized subject to the portal's slug vocabulary.
fn portal_subject(subject: &str) -> &str {
    match subject {
        "math" => "mathematics",
        "language" => "language",
        "science" => "science-technology",
        "social_studies" => "social-studies",
        "french" => "french-as-a-second-language",
        "arts" => "the-arts",
        "health_pe" => "health-and-physical-education",
        other => other,
    }
}

fn urlencode(s: &str) -> String {
    s.replace(' ', "+")
}

/// Transient listing shape parsed from one search-result row.
struct PortalListing {
    external_id: String,
    url: String,
    title: String,
    summary: Option<String>,
    grade_text: Option<String>,
}

/// Parse the portal search listing. Synchronous: `Html` is not `Send`.
fn parse_listing(html: &str, base_url: &str) -> Vec<PortalListing> {
    let document = Html::parse_document(html);
    let row_sel = Selector::parse("li.search-result").expect("static selector");
    let title_sel = Selector::parse("a.result-title").expect("static selector");
    let summary_sel = Selector::parse("p.result-summary").expect("static selector");
    let grade_sel = Selector::parse("span.result-grade").expect("static selector");

    let base = Url::parse(base_url).ok();
    let mut listings = Vec::new();

    for row in document.select(&row_sel) {
        let Some(title_elem) = row.select(&title_sel).next() else {
            continue;
        };
        let title: String = title_elem.text().collect::<String>().trim().to_string();
        let Some(href) = title_elem.value().attr("href") else {
            continue;
        };
        if title.is_empty() {
            continue;
        }

        let url = match &base {
            Some(base) => resolve_url(base, href),
            None => href.to_string(),
        };
        let Some(external_id) = id_from_url(&url) else {
            continue;
        };

        listings.push(PortalListing {
            external_id,
            url,
            title,
            summary: row
                .select(&summary_sel)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string()),
            grade_text: row
                .select(&grade_sel)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string()),
        });
    }

    listings
}

/// Parse a detail page into a draft, or `None` when the page has no title.
fn parse_detail(html: &str, external_id: &str, url: &str) -> Option<ActivityDraft> {
    let document = Html::parse_document(html);
    let title_sel = Selector::parse("h1").expect("static selector");
    let desc_sel = Selector::parse(".resource-description").expect("static selector");
    let code_sel = Selector::parse(".expectation-code").expect("static selector");
    let grade_sel = Selector::parse(".resource-grade").expect("static selector");

    let title: String = document
        .select(&title_sel)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    if title.is_empty() {
        return None;
    }

    let mut draft = ActivityDraft::new(SOURCE_ID, external_id, url, title);
    draft.description = document
        .select(&desc_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string());
    draft.grade_text = document
        .select(&grade_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string());
    draft.tags = document
        .select(&code_sel)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    draft.activity_type = Some(ActivityType::Document);
    draft.license = Some(LICENSE.to_string());
    Some(draft)
}

fn id_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    Some(last.to_string())
}

#[async_trait]
impl SourceConnector for GovPortalConnector {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    fn is_active(&self) -> bool {
        self.active
    }

    async fn search(&self, params: &NormalizedSearch) -> Vec<DiscoveredActivity> {
        let url = self.search_url(params);
        let html = match fetch_with_retry(&self.cache, &url, &self.policy).await {
            Ok(html) => html,
            Err(e) => {
                log::warn!("{SOURCE_ID}: search fetch failed: {e}");
                return Vec::new();
            }
        };

        parse_listing(&html, &self.base_url)
            .into_iter()
            .map(|listing| {
                let mut draft = ActivityDraft::new(
                    SOURCE_ID,
                    listing.external_id,
                    listing.url,
                    listing.title,
                );
                draft.description = listing.summary;
                draft.grade_text = listing.grade_text;
                draft.language = params.language;
                draft.license = Some(LICENSE.to_string());
                draft.activity_type = Some(ActivityType::Document);
                draft.into_activity()
            })
            .collect()
    }

    async fn activity_details(&self, external_id: &str) -> Option<DiscoveredActivity> {
        let url = self.detail_url(external_id);
        let html = match fetch_with_retry(&self.cache, &url, &self.policy).await {
            Ok(html) => html,
            Err(e) => {
                log::debug!("{SOURCE_ID}: detail fetch failed for {external_id}: {e}");
                return None;
            }
        };
        parse_detail(&html, external_id, &url).map(ActivityDraft::into_activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_HTML: &str = r#"
        <html><body><ul>
          <li class="search-result">
            <a class="result-title" href="/en/resource/math-g3-fractions">Fractions overview</a>
            <span class="result-grade">Grade 3</span>
            <p class="result-summary">Expectations for fractions.</p>
          </li>
          <li class="search-result">
            <a class="result-title" href="/en/resource/sci-g5-matter">Properties of matter</a>
            <span class="result-grade">Grade 5</span>
          </li>
          <li class="search-result"><p>malformed row, no link</p></li>
        </ul></body></html>
    "#;

    #[test]
    fn parses_listing_and_skips_malformed_rows() {
        let listings = parse_listing(LISTING_HTML, DEFAULT_BASE);
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].external_id, "math-g3-fractions");
        assert_eq!(
            listings[0].url,
            format!("{DEFAULT_BASE}/en/resource/math-g3-fractions")
        );
        assert_eq!(listings[0].grade_text.as_deref(), Some("Grade 3"));
        assert_eq!(listings[1].summary, None);
    }

    #[test]
    fn parses_detail_page() {
        let html = r#"
            <html><body>
              <h1>Fractions overview</h1>
              <div class="resource-grade">Grades 3-4</div>
              <div class="resource-description">Comparing and ordering fractions.</div>
              <span class="expectation-code">B1.4</span>
              <span class="expectation-code">B1.5</span>
            </body></html>
        "#;
        let draft = parse_detail(html, "math-g3-fractions", "https://x/en/resource/math-g3-fractions")
            .unwrap();
        let activity = draft.into_activity();
        assert_eq!((activity.grade_min, activity.grade_max), (3, 4));
        assert_eq!(activity.tags, vec!["B1.4", "B1.5"]);
        assert!(activity.is_free);
        assert_eq!(activity.license, LICENSE);
    }

    #[test]
    fn search_url_uses_portal_vocabulary() {
        let connector = GovPortalConnector::new(
            Arc::new(FetchCache::new(
                Arc::new(NullFetcher),
                &crate::models::CacheConfig::default(),
            )),
            RetryPolicy::default(),
        );
        let params = NormalizedSearch {
            query: Some("number sense".to_string()),
            grade: Some(0),
            subject: Some("math".to_string()),
            language: Some(Language::Fr),
            limit: 20,
            offset: 0,
            free_only: true,
        };
        let url = connector.search_url(&params);
        assert!(url.starts_with(&format!("{DEFAULT_BASE}/fr/search?")));
        assert!(url.contains("keyword=number+sense"));
        assert!(url.contains("grade=K"));
        assert!(url.contains("subject=mathematics"));
    }

    struct NullFetcher;

    #[async_trait]
    impl crate::fetch::PageFetcher for NullFetcher {
        async fn get(&self, url: &str) -> crate::error::Result<String> {
            Err(crate::error::AppError::fetch(url, "offline"))
        }
    }
}
