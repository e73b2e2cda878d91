// src/connectors/marketplace.rs

//! Connector for a teacher resource marketplace.
//!
//! The marketplace mixes free and paid products. Price is parsed from the
//! listing cell; paid products are dropped before any detail fetch when
//! the request is free-only.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use crate::connectors::base::{fetch_with_retry, ActivityDraft, RetryPolicy};
use crate::connectors::SourceConnector;
use crate::fetch::FetchCache;
use crate::models::{DiscoveredActivity, NormalizedSearch};
use crate::utils::resolve_url;

const SOURCE_ID: &str = "resource_market";
const DEFAULT_BASE: &str = "https://www.teachmarket.com";

/// Adapter for the teacher resource marketplace.
pub struct MarketplaceConnector {
    cache: Arc<FetchCache>,
    policy: RetryPolicy,
    base_url: String,
    active: bool,
}

impl MarketplaceConnector {
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
        let mut url = format!("{}/browse?", self.base_url);
        if let Some(query) = &params.query {
            url.push_str(&format!("search={}&", query.replace(' ', "+")));
        }
        if let Some(grade) = params.grade {
            // Marketplace grade slugs: "grade-k", "grade-1", ...
            let slug = if grade == 0 {
                "grade-k".to_string()
            } else {
                format!("grade-{grade}")
            };
            url.push_str(&format!("grade-level={slug}&"));
        }
        if let Some(subject) = &params.subject {
            url.push_str(&format!("category={}&", subject.replace('_', "-")));
        }
        let price = if params.free_only { "free" } else { "all" };
        url.push_str(&format!("price={price}"));
        url
    }

    fn detail_url(&self, external_id: &str) -> String {
        format!("{}/product/{}", self.base_url, external_id)
    }
}

/// Transient product shape from the listing page.
struct ProductCell {
    external_id: String,
    url: String,
    title: String,
    price: Option<f64>,
    grade_text: Option<String>,
    thumbnail: Option<String>,
    rating: Option<f32>,
    review_count: Option<u32>,
}

/// Parse "$4.99" / "FREE" price labels.
fn parse_price(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("free") {
        return Some(0.0);
    }
    trimmed.trim_start_matches('$').parse::<f64>().ok()
}

fn parse_listing(html: &str, base_url: &str) -> Vec<ProductCell> {
    let document = Html::parse_document(html);
    let cell_sel = Selector::parse("div.product-cell").expect("static selector");
    let title_sel = Selector::parse("a.product-title").expect("static selector");
    let price_sel = Selector::parse("span.product-price").expect("static selector");
    let grade_sel = Selector::parse("span.product-grades").expect("static selector");
    let thumb_sel = Selector::parse("img.product-thumb").expect("static selector");
    let rating_sel = Selector::parse("span.product-rating").expect("static selector");
    let reviews_sel = Selector::parse("span.product-rating-count").expect("static selector");

    let base = Url::parse(base_url).ok();
    let mut cells = Vec::new();

    for cell in document.select(&cell_sel) {
        let Some(link) = cell.select(&title_sel).next() else {
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

        let text = |sel: &Selector| {
            cell.select(sel)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty())
        };

        cells.push(ProductCell {
            external_id,
            url,
            title,
            price: text(&price_sel).and_then(|t| parse_price(&t)),
            grade_text: text(&grade_sel),
            thumbnail: cell
                .select(&thumb_sel)
                .next()
                .and_then(|el| el.value().attr("src"))
                .map(String::from),
            rating: text(&rating_sel).and_then(|t| t.parse().ok()),
            review_count: text(&reviews_sel)
                .map(|t| t.trim_matches(['(', ')']).to_string())
                .and_then(|t| t.parse().ok()),
        });
    }

    cells
}

/// Extract materials/alignment detail from a product page into the draft.
fn enrich_from_detail(draft: &mut ActivityDraft, html: &str) {
    let document = Html::parse_document(html);
    let desc_sel = Selector::parse("div.product-description").expect("static selector");
    let standard_sel = Selector::parse("span.standard-code").expect("static selector");

    if draft.description.is_none() {
        draft.description = document
            .select(&desc_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string());
    }
    let codes: Vec<String> = document
        .select(&standard_sel)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if !codes.is_empty() {
        draft.tags = codes;
    }
}

#[async_trait]
impl SourceConnector for MarketplaceConnector {
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

        let mut activities = Vec::new();
        for cell in parse_listing(&html, &self.base_url) {
            // The price filter is also sent upstream, but listings are not
            // trusted to honor it.
            if params.free_only && cell.price.map(|p| p > 0.0).unwrap_or(false) {
                continue;
            }

            let mut draft =
                ActivityDraft::new(SOURCE_ID, cell.external_id, cell.url, cell.title);
            draft.price = cell.price;
            draft.grade_text = cell.grade_text;
            draft.thumbnail_url = cell.thumbnail;
            draft.source_rating = cell.rating;
            draft.source_review_count = cell.review_count;
            draft.language = params.language;
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

        let (title, price) = {
            let document = Html::parse_document(&html);
            let title_sel = Selector::parse("h1.product-name").expect("static selector");
            let price_sel = Selector::parse("span.product-price").expect("static selector");
            let title: String = document
                .select(&title_sel)
                .next()?
                .text()
                .collect::<String>()
                .trim()
                .to_string();
            let price = document
                .select(&price_sel)
                .next()
                .map(|el| el.text().collect::<String>())
                .and_then(|t| parse_price(&t));
            (title, price)
        };
        if title.is_empty() {
            return None;
        }

        let mut draft = ActivityDraft::new(SOURCE_ID, external_id, &url, title);
        draft.price = price;
        enrich_from_detail(&mut draft, &html);
        Some(draft.into_activity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_HTML: &str = r#"
        <html><body>
          <div class="product-cell">
            <a class="product-title" href="/product/fraction-pack">Fraction Practice Pack</a>
            <span class="product-price">FREE</span>
            <span class="product-grades">Grades 3-5</span>
            <span class="product-rating">4.8</span>
            <span class="product-rating-count">(231)</span>
          </div>
          <div class="product-cell">
            <a class="product-title" href="/product/mega-bundle">Mega Math Bundle</a>
            <span class="product-price">$12.50</span>
          </div>
        </body></html>
    "#;

    #[test]
    fn parse_price_labels() {
        assert_eq!(parse_price("FREE"), Some(0.0));
        assert_eq!(parse_price("free"), Some(0.0));
        assert_eq!(parse_price("$4.99"), Some(4.99));
        assert_eq!(parse_price("contact us"), None);
    }

    #[test]
    fn parses_product_cells() {
        let cells = parse_listing(LISTING_HTML, DEFAULT_BASE);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].external_id, "fraction-pack");
        assert_eq!(cells[0].price, Some(0.0));
        assert_eq!(cells[0].rating, Some(4.8));
        assert_eq!(cells[0].review_count, Some(231));
        assert_eq!(cells[1].price, Some(12.50));
    }

    #[test]
    fn paid_cells_survive_parsing_for_non_free_searches() {
        // Free-only filtering happens in search(), not in the parser.
        let cells = parse_listing(LISTING_HTML, DEFAULT_BASE);
        assert!(cells.iter().any(|c| c.price == Some(12.50)));
    }

    #[test]
    fn search_url_encodes_price_policy() {
        let connector = MarketplaceConnector::new(
            Arc::new(FetchCache::new(
                Arc::new(NullFetcher),
                &crate::models::CacheConfig::default(),
            )),
            RetryPolicy::default(),
        );
        let mut params = NormalizedSearch {
            query: Some("fractions".to_string()),
            grade: Some(3),
            subject: Some("math".to_string()),
            language: None,
            limit: 20,
            offset: 0,
            free_only: true,
        };
        assert!(connector.search_url(&params).ends_with("price=free"));
        params.free_only = false;
        assert!(connector.search_url(&params).ends_with("price=all"));
        assert!(connector.search_url(&params).contains("grade-level=grade-3"));
    }

    struct NullFetcher;

    #[async_trait]
    impl crate::fetch::PageFetcher for NullFetcher {
        async fn get(&self, url: &str) -> crate::error::Result<String> {
            Err(crate::error::AppError::fetch(url, "offline"))
        }
    }
}
