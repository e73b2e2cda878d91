// src/connectors/edu_hub.rs

//! Connector for a general educational activity site.
//!
//! Listing cards carry only summary fields; the connector enriches the
//! first few candidates with a detail-page fetch for materials and group
//! size. Enrichment is best-effort: a failed detail fetch keeps the
//! partial record.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use crate::connectors::base::{fetch_with_retry, ActivityDraft, RetryPolicy};
use crate::connectors::SourceConnector;
use crate::fetch::FetchCache;
use crate::models::{DiscoveredActivity, Language, NormalizedSearch};
use crate::utils::resolve_url;

const SOURCE_ID: &str = "edu_hub";
const DEFAULT_BASE: &str = "https://www.educatorhub.ca";

/// Listings beyond this many skip the detail-page enrichment fetch.
const ENRICH_LIMIT: usize = 5;

/// Adapter for the educator activity hub.
pub struct EduHubConnector {
    cache: Arc<FetchCache>,
    policy: RetryPolicy,
    base_url: String,
    active: bool,
}

impl EduHubConnector {
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
        let mut url = format!("{}/activities?", self.base_url);
        if let Some(query) = &params.query {
            url.push_str(&format!("q={}&", query.replace(' ', "+")));
        }
        if let Some(grade) = params.grade {
            // The hub uses "k" for kindergarten, otherwise the number.
            let token = if grade == 0 {
                "k".to_string()
            } else {
                grade.to_string()
            };
            url.push_str(&format!("grades={token}&"));
        }
        if let Some(subject) = &params.subject {
            url.push_str(&format!("topic={}&", subject.replace(' ', "-")));
        }
        let lang = match params.language {
            Some(Language::Fr) => "fr",
            _ => "en",
        };
        url.push_str(&format!("lang={lang}"));
        url
    }

    fn detail_url(&self, external_id: &str) -> String {
        format!("{}/activity/{}", self.base_url, external_id)
    }
}

/// Transient card shape from the listing page.
struct HubCard {
    external_id: String,
    url: String,
    title: String,
    thumbnail: Option<String>,
    grade_text: Option<String>,
    topic: Option<String>,
    duration_minutes: Option<u32>,
}

fn parse_listing(html: &str, base_url: &str) -> Vec<HubCard> {
    let document = Html::parse_document(html);
    let card_sel = Selector::parse("div.activity-card").expect("static selector");
    let link_sel = Selector::parse("a.activity-link").expect("static selector");
    let thumb_sel = Selector::parse("img.activity-thumb").expect("static selector");
    let grade_sel = Selector::parse("span.activity-grades").expect("static selector");
    let topic_sel = Selector::parse("span.activity-topic").expect("static selector");
    let duration_sel = Selector::parse("span.activity-duration").expect("static selector");

    let base = Url::parse(base_url).ok();
    let mut cards = Vec::new();

    for card in document.select(&card_sel) {
        let Some(link) = card.select(&link_sel).next() else {
            continue;
        };
        let title: String = link.text().collect::<String>().trim().to_string();
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if title.is_empty() {
            continue;
        }

        let url = match &base {
            Some(base) => resolve_url(base, href),
            None => href.to_string(),
        };
        let external_id = url
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_string();
        if external_id.is_empty() {
            continue;
        }

        cards.push(HubCard {
            external_id,
            url,
            title,
            thumbnail: card
                .select(&thumb_sel)
                .next()
                .and_then(|el| el.value().attr("src"))
                .map(|src| match &base {
                    Some(base) => resolve_url(base, src),
                    None => src.to_string(),
                }),
            grade_text: text_of(&card, &grade_sel),
            topic: text_of(&card, &topic_sel),
            duration_minutes: text_of(&card, &duration_sel).and_then(|t| parse_minutes(&t)),
        });
    }

    cards
}

fn text_of(card: &scraper::ElementRef, selector: &Selector) -> Option<String> {
    card.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Parse "30 min" / "1 hour" style duration hints.
fn parse_minutes(text: &str) -> Option<u32> {
    let lower = text.to_lowercase();
    let digits: String = lower.chars().filter(|c| c.is_ascii_digit()).collect();
    let value: u32 = digits.parse().ok()?;
    if lower.contains("hour") {
        Some(value * 60)
    } else {
        Some(value)
    }
}

/// Pull materials and group size out of a detail page into the draft.
fn enrich_from_detail(draft: &mut ActivityDraft, html: &str) {
    let document = Html::parse_document(html);
    let materials_sel = Selector::parse("ul.materials-list li").expect("static selector");
    let group_sel = Selector::parse("span.group-size").expect("static selector");
    let desc_sel = Selector::parse("div.activity-description").expect("static selector");

    let materials: Vec<String> = document
        .select(&materials_sel)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();
    if !materials.is_empty() {
        draft.materials = materials;
    }
    if let Some(group) = document
        .select(&group_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
    {
        draft.group_size = Some(group);
    }
    if draft.description.is_none() {
        draft.description = document
            .select(&desc_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string());
    }
}

fn card_to_draft(card: HubCard, language: Option<Language>) -> ActivityDraft {
    let mut draft = ActivityDraft::new(SOURCE_ID, card.external_id, card.url, card.title);
    draft.thumbnail_url = card.thumbnail;
    draft.grade_text = card.grade_text;
    draft.subject_text = card.topic;
    draft.duration_minutes = card.duration_minutes;
    draft.language = language;
    draft
}

#[async_trait]
impl SourceConnector for EduHubConnector {
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

        let cards = parse_listing(&html, &self.base_url);
        let mut activities = Vec::new();

        for (index, card) in cards.into_iter().enumerate() {
            let detail_url = self.detail_url(&card.external_id);
            let mut draft = card_to_draft(card, params.language);

            if index < ENRICH_LIMIT {
                match fetch_with_retry(&self.cache, &detail_url, &self.policy).await {
                    Ok(detail_html) => enrich_from_detail(&mut draft, &detail_html),
                    Err(e) => {
                        log::debug!("{SOURCE_ID}: enrichment failed for {detail_url}: {e}");
                    }
                }
            }

            activities.push(draft.into_activity());
        }

        activities
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

        let document = Html::parse_document(&html);
        let title_sel = Selector::parse("h1.activity-title").expect("static selector");
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
        drop(document);

        let mut draft = ActivityDraft::new(SOURCE_ID, external_id, &url, title);
        enrich_from_detail(&mut draft, &html);
        Some(draft.into_activity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_HTML: &str = r#"
        <html><body>
          <div class="activity-card">
            <a class="activity-link" href="/activity/fraction-bingo">Fraction Bingo</a>
            <img class="activity-thumb" src="/img/bingo.png">
            <span class="activity-grades">Grades 2-4</span>
            <span class="activity-topic">Mathematics</span>
            <span class="activity-duration">30 min</span>
          </div>
          <div class="activity-card">
            <a class="activity-link" href="/activity/plant-journal">Plant Journal</a>
            <span class="activity-topic">Science</span>
            <span class="activity-duration">1 hour</span>
          </div>
        </body></html>
    "#;

    #[test]
    fn parses_cards_with_partial_fields() {
        let cards = parse_listing(LISTING_HTML, DEFAULT_BASE);
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].external_id, "fraction-bingo");
        assert_eq!(cards[0].duration_minutes, Some(30));
        assert_eq!(
            cards[0].thumbnail.as_deref(),
            Some("https://www.educatorhub.ca/img/bingo.png")
        );
        assert_eq!(cards[1].duration_minutes, Some(60));
        assert!(cards[1].thumbnail.is_none());
        assert!(cards[1].grade_text.is_none());
    }

    #[test]
    fn enrichment_fills_materials_and_group_size() {
        let detail = r#"
            <html><body>
              <div class="activity-description">Play bingo with fraction cards.</div>
              <ul class="materials-list"><li>bingo cards</li><li>counters</li></ul>
              <span class="group-size">small groups</span>
            </body></html>
        "#;
        let mut draft = ActivityDraft::new(SOURCE_ID, "x", "https://x/activity/x", "Fraction Bingo");
        enrich_from_detail(&mut draft, detail);
        assert_eq!(draft.materials, vec!["bingo cards", "counters"]);
        assert_eq!(draft.group_size.as_deref(), Some("small groups"));
        assert_eq!(
            draft.description.as_deref(),
            Some("Play bingo with fraction cards.")
        );
    }

    #[test]
    fn parse_minutes_handles_hours() {
        assert_eq!(parse_minutes("45 min"), Some(45));
        assert_eq!(parse_minutes("2 hours"), Some(120));
        assert_eq!(parse_minutes("varies"), None);
    }
}
