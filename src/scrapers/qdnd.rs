//! Quân đội Nhân dân (QĐND) article scraper.
//!
//! [qdnd.vn](https://www.qdnd.vn) exposes publish dates in several places
//! depending on the page template. They are tried in order:
//!
//! 1. JSON-LD `datePublished` (object or array form)
//! 2. `<time datetime="...">`, then the element text
//! 3. `<meta property="article:published_time">`
//!
//! ISO timestamps are rewritten into the `Thứ hai, 25/11/2025, 10:30 (GMT+7)`
//! form used by the other sources so the artifact date line always carries a
//! `D/M/YYYY` date.

use super::http::{self, ARTICLE_TIMEOUT};
use super::{SourceAdapter, dedup_links, element_text, resolve_link};
use crate::error::Result;
use crate::models::ArticleFields;
use crate::recency;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, Weekday};
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

static ARTICLE_BLOCK: Lazy<Selector> = Lazy::new(|| Selector::parse("article").unwrap());
static HEADLINE_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("h3 a[href]").unwrap());
static ANY_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static OG_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static JSON_LD: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
static TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time").unwrap());
static META_PUBLISHED: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="article:published_time"]"#).unwrap());
static SAPO: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[class*="sapo"], [class*="lead"], [class*="summary"]"#).unwrap());
static CONTENT: Lazy<Selector> = Lazy::new(|| Selector::parse("div.articleContent").unwrap());
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

const LISTING_TIMEOUT: Duration = Duration::from_secs(15);

const CATEGORIES: &[&str] = &[
    "quoc-phong-an-ninh",
    "chinh-tri",
    "quoc-te",
    "kinh-te",
    "xa-hoi",
];

/// Adapter for qdnd.vn.
#[derive(Debug, Clone)]
pub struct Qdnd {
    client: Client,
    base_url: Url,
}

impl Qdnd {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, Url::parse("https://www.qdnd.vn").expect("static url"))
    }

    pub fn with_base_url(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn listing_url(&self, category: &str, page: u32) -> String {
        let root = self.base_url.as_str().trim_end_matches('/');
        if page <= 1 {
            format!("{root}/{category}")
        } else {
            format!("{root}/{category}/p/{page}")
        }
    }
}

#[async_trait]
impl SourceAdapter for Qdnd {
    fn name(&self) -> &str {
        "qdnd"
    }

    fn categories(&self) -> Vec<String> {
        CATEGORIES.iter().map(|c| c.to_string()).collect()
    }

    #[instrument(level = "debug", skip(self))]
    async fn discover_page(&self, category: &str, page: u32) -> Result<Vec<String>> {
        let url = self.listing_url(category, page);
        let html = http::get_text(&self.client, &url, LISTING_TIMEOUT, None).await?;
        let urls = parse_listing(&html, &self.base_url);
        debug!(count = urls.len(), %url, "Indexed QĐND listing");
        Ok(urls)
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_article(&self, url: &str) -> Result<Option<ArticleFields>> {
        let html = http::get_text(&self.client, url, ARTICLE_TIMEOUT, None).await?;
        Ok(parse_article(&html))
    }

    fn parse_date(&self, text: &str) -> Option<NaiveDateTime> {
        recency::parse_dmy(text).or_else(|| parse_iso(text).map(|dt| dt.naive_local()))
    }
}

pub fn parse_listing(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let links = document
        .select(&ARTICLE_BLOCK)
        .filter_map(|article| {
            article
                .select(&HEADLINE_LINK)
                .next()
                .or_else(|| article.select(&ANY_LINK).next())
        })
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| resolve_link(base, href))
        .collect();
    dedup_links(links)
}

pub fn parse_article(html: &str) -> Option<ArticleFields> {
    let document = Html::parse_document(html);

    let title = document
        .select(&H1)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
        .or_else(|| {
            document
                .select(&OG_TITLE)
                .next()
                .and_then(|m| m.value().attr("content"))
                .map(|c| c.trim().to_string())
        })?;

    let date = extract_date(&document).map(|raw| format_date(&raw));

    let description = document.select(&SAPO).next().map(element_text).into_iter().collect();

    let content = document
        .select(&CONTENT)
        .next()
        .or_else(|| document.select(&ARTICLE_BLOCK).next());
    let paragraphs = content
        .map(|c| c.select(&PARAGRAPH).map(element_text).collect())
        .unwrap_or_default();

    Some(ArticleFields {
        title,
        date,
        description,
        paragraphs,
    })
}

fn extract_date(document: &Html) -> Option<String> {
    for script in document.select(&JSON_LD) {
        let raw = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        if let Some(date) = date_published(&value) {
            return Some(date);
        }
    }

    if let Some(time) = document.select(&TIME).next() {
        let value = time
            .value()
            .attr("datetime")
            .map(str::to_string)
            .unwrap_or_else(|| element_text(time));
        if !value.trim().is_empty() {
            return Some(value.trim().to_string());
        }
    }

    document
        .select(&META_PUBLISHED)
        .next()
        .and_then(|m| m.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn date_published(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map.get("datePublished").and_then(Value::as_str).map(str::to_string),
        Value::Array(items) => items.iter().find_map(date_published),
        _ => None,
    }
}

fn parse_iso(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
        .ok()?;
    naive.and_local_timezone(vietnam_offset()).single()
}

fn vietnam_offset() -> FixedOffset {
    FixedOffset::east_opt(7 * 3600).expect("valid offset")
}

fn weekday_vi(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Thứ hai",
        Weekday::Tue => "Thứ ba",
        Weekday::Wed => "Thứ tư",
        Weekday::Thu => "Thứ năm",
        Weekday::Fri => "Thứ sáu",
        Weekday::Sat => "Thứ bảy",
        Weekday::Sun => "Chủ nhật",
    }
}

/// Rewrite ISO timestamps as `Weekday, DD/MM/YYYY, HH:MM (GMT+7)`; anything
/// else is returned unchanged.
pub fn format_date(raw: &str) -> String {
    match parse_iso(raw) {
        Some(dt) => {
            let local = dt.with_timezone(&vietnam_offset());
            format!(
                "{}, {}, {} (GMT+7)",
                weekday_vi(local.weekday()),
                local.format("%d/%m/%Y"),
                local.format("%H:%M")
            )
        }
        None => raw.trim().to_string(),
    }
}
