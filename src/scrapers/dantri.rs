//! Dân Trí article scraper.
//!
//! [Dân Trí](https://dantri.com.vn) rejects obvious bots, so every request
//! carries browser-like headers and is preceded by a short random delay.
//! Listing links are mostly relative and resolved against the site root.

use super::http::{self, ARTICLE_TIMEOUT, LISTING_TIMEOUT};
use super::{SourceAdapter, dedup_links, element_text, resolve_link};
use crate::error::Result;
use crate::models::ArticleFields;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

static LISTING_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse(".article-title a[href]").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("h1.title-page.detail").unwrap());
static DATE: Lazy<Selector> = Lazy::new(|| Selector::parse("time.author-time").unwrap());
static SAPO: Lazy<Selector> = Lazy::new(|| Selector::parse("h2.singular-sapo").unwrap());
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("div.singular-content p").unwrap());

const CATEGORIES: &[&str] = &[
    "xa-hoi",
    "the-gioi",
    "kinh-doanh",
    "the-thao",
    "giao-duc",
    "suc-khoe",
    "phap-luat",
];

/// Delay bounds before listing and article requests.
#[derive(Debug, Clone, Copy)]
pub struct Politeness {
    pub listing: (Duration, Duration),
    pub article: (Duration, Duration),
}

impl Default for Politeness {
    fn default() -> Self {
        Self {
            listing: (Duration::from_secs(1), Duration::from_secs(3)),
            article: (Duration::from_millis(500), Duration::from_secs(2)),
        }
    }
}

/// Adapter for dantri.com.vn.
#[derive(Debug, Clone)]
pub struct DanTri {
    client: Client,
    base_url: Url,
    politeness: Politeness,
}

impl DanTri {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, Url::parse("https://dantri.com.vn").expect("static url"), Politeness::default())
    }

    pub fn with_base_url(client: Client, base_url: Url, politeness: Politeness) -> Self {
        Self {
            client,
            base_url,
            politeness,
        }
    }

    fn listing_url(&self, category: &str, page: u32) -> String {
        format!(
            "{}/{}/trang-{}.htm",
            self.base_url.as_str().trim_end_matches('/'),
            category,
            page
        )
    }
}

#[async_trait]
impl SourceAdapter for DanTri {
    fn name(&self) -> &str {
        "dantri"
    }

    fn categories(&self) -> Vec<String> {
        CATEGORIES.iter().map(|c| c.to_string()).collect()
    }

    #[instrument(level = "debug", skip(self))]
    async fn discover_page(&self, category: &str, page: u32) -> Result<Vec<String>> {
        let (min, max) = self.politeness.listing;
        http::polite_delay(min, max).await;

        let url = self.listing_url(category, page);
        let html = http::get_text(&self.client, &url, LISTING_TIMEOUT, Some(http::browser_headers())).await?;
        let urls = parse_listing(&html, &self.base_url);
        debug!(count = urls.len(), %url, "Indexed Dân Trí listing");
        Ok(urls)
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_article(&self, url: &str) -> Result<Option<ArticleFields>> {
        let (min, max) = self.politeness.article;
        http::polite_delay(min, max).await;

        let html = http::get_text(&self.client, url, ARTICLE_TIMEOUT, Some(http::browser_headers())).await?;
        Ok(parse_article(&html))
    }
}

pub fn parse_listing(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let links = document
        .select(&LISTING_LINK)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| resolve_link(base, href))
        .collect();
    dedup_links(links)
}

pub fn parse_article(html: &str) -> Option<ArticleFields> {
    let document = Html::parse_document(html);
    let title = element_text(document.select(&TITLE).next()?);

    Some(ArticleFields {
        title,
        date: document.select(&DATE).next().map(element_text),
        description: document.select(&SAPO).next().map(element_text).into_iter().collect(),
        paragraphs: document.select(&PARAGRAPH).map(element_text).collect(),
    })
}
