//! VietNamNet article scraper.
//!
//! The first page of a [VietNamNet](https://vietnamnet.vn) category has no
//! suffix; later pages use a zero-based `-page{n}` suffix, so page 2 is
//! `/{category}-page1`.

use super::http::{self, ARTICLE_TIMEOUT};
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

static LISTING_LINK: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".horizontalPost__main-title a[href], .vnn-title a[href], .title-bold a[href]").unwrap()
});
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("h1.content-detail-title").unwrap());
static DATE: Lazy<Selector> = Lazy::new(|| Selector::parse("div.bread-crumb-detail__time").unwrap());
static SAPO: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h2.content-detail-sapo, h2.sm-sapo-mb-0").unwrap());
static CONTENT: Lazy<Selector> = Lazy::new(|| Selector::parse("div.maincontent, div.main-content").unwrap());
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

const LISTING_TIMEOUT: Duration = Duration::from_secs(15);

const CATEGORIES: &[&str] = &[
    "thoi-su",
    "kinh-doanh",
    "the-gioi",
    "giao-duc",
    "suc-khoe",
    "the-thao",
    "phap-luat",
];

/// Adapter for vietnamnet.vn.
#[derive(Debug, Clone)]
pub struct VietNamNet {
    client: Client,
    base_url: Url,
}

impl VietNamNet {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, Url::parse("https://vietnamnet.vn").expect("static url"))
    }

    pub fn with_base_url(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn listing_url(&self, category: &str, page: u32) -> String {
        let root = self.base_url.as_str().trim_end_matches('/');
        if page <= 1 {
            format!("{root}/{category}")
        } else {
            format!("{root}/{category}-page{}", page - 1)
        }
    }
}

#[async_trait]
impl SourceAdapter for VietNamNet {
    fn name(&self) -> &str {
        "vietnamnet"
    }

    fn categories(&self) -> Vec<String> {
        CATEGORIES.iter().map(|c| c.to_string()).collect()
    }

    #[instrument(level = "debug", skip(self))]
    async fn discover_page(&self, category: &str, page: u32) -> Result<Vec<String>> {
        let url = self.listing_url(category, page);
        let html = http::get_text(&self.client, &url, LISTING_TIMEOUT, None).await?;
        let urls = parse_listing(&html, &self.base_url);
        debug!(count = urls.len(), %url, "Indexed VietNamNet listing");
        Ok(urls)
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_article(&self, url: &str) -> Result<Option<ArticleFields>> {
        let html = http::get_text(&self.client, url, ARTICLE_TIMEOUT, None).await?;
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

    let paragraphs = document
        .select(&CONTENT)
        .next()
        .map(|content| content.select(&PARAGRAPH).map(element_text).collect())
        .unwrap_or_default();

    Some(ArticleFields {
        title,
        date: document.select(&DATE).next().map(element_text),
        description: document.select(&SAPO).next().map(element_text).into_iter().collect(),
        paragraphs,
    })
}
