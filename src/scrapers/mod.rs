//! News source adapters.
//!
//! Every site implements [`SourceAdapter`], which exposes the two operations
//! the crawl engine needs:
//!
//! 1. **Discovery**: list article URLs on one page of a category
//! 2. **Fetching**: download one article and extract its fields
//!
//! # Supported Sources
//!
//! | Source | Module | Listing URL | Notes |
//! |--------|--------|-------------|-------|
//! | VnExpress | [`vnexpress`] | `/{category}-p{page}` | Absolute links |
//! | Dân Trí | [`dantri`] | `/{category}/trang-{page}.htm` | Browser headers, random delay |
//! | VietNamNet | [`vietnamnet`] | `/{category}-page{page-1}` | Page 1 has no suffix |
//! | QĐND | [`qdnd`] | `/{category}/p/{page}` | Dates from JSON-LD or meta tags |
//!
//! Adapters are built by name through [`build_adapter`], the single registry
//! the configuration is validated against.
//!
//! HTML parsing happens in plain functions over `&str` so that the
//! non-`Send` [`scraper::Html`] never lives across an `.await`.

pub mod dantri;
pub mod http;
pub mod qdnd;
pub mod vietnamnet;
pub mod vnexpress;

use crate::error::{CrawlError, Result};
use crate::models::ArticleFields;
use crate::recency;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Client;
use scraper::ElementRef;
use std::sync::Arc;
use url::Url;

/// Names accepted in `webname` / `crawlers[].name`.
pub const SOURCES: &[&str] = &["vnexpress", "dantri", "vietnamnet", "qdnd"];

/// One news site.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Registry name, also used as the `source` field in the index.
    fn name(&self) -> &str;

    /// Categories crawled when `article_type` is `all`.
    fn categories(&self) -> Vec<String>;

    /// Article URLs listed on `page` (1-based) of `category`.
    async fn discover_page(&self, category: &str, page: u32) -> Result<Vec<String>>;

    /// Fetch and extract one article. `Ok(None)` means the page is not an
    /// article (no title found).
    async fn fetch_article(&self, url: &str) -> Result<Option<ArticleFields>>;

    /// Publish date text of one article, used by time-filtered discovery.
    async fn fetch_publish_date(&self, url: &str) -> Result<Option<String>> {
        Ok(self.fetch_article(url).await?.and_then(|article| article.date))
    }

    /// Parse this site's date text.
    fn parse_date(&self, text: &str) -> Option<NaiveDateTime> {
        recency::parse_dmy(text)
    }
}

/// Fail with [`CrawlError::UnknownSource`] unless `name` is registered.
pub fn ensure_known(name: &str) -> Result<()> {
    if SOURCES.contains(&name) {
        Ok(())
    } else {
        Err(CrawlError::UnknownSource {
            name: name.to_string(),
            available: SOURCES.join(", "),
        })
    }
}

/// Build the adapter registered under `name`.
pub fn build_adapter(name: &str, client: Client) -> Result<Arc<dyn SourceAdapter>> {
    let adapter: Arc<dyn SourceAdapter> = match name {
        "vnexpress" => Arc::new(vnexpress::VnExpress::new(client)),
        "dantri" => Arc::new(dantri::DanTri::new(client)),
        "vietnamnet" => Arc::new(vietnamnet::VietNamNet::new(client)),
        "qdnd" => Arc::new(qdnd::Qdnd::new(client)),
        other => {
            return Err(CrawlError::UnknownSource {
                name: other.to_string(),
                available: SOURCES.join(", "),
            });
        }
    };
    Ok(adapter)
}

/// Visible text of an element on a single line.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve a possibly relative link against the site root.
pub(crate) fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}

/// Drop repeated links while keeping page order.
pub(crate) fn dedup_links(links: Vec<String>) -> Vec<String> {
    use itertools::Itertools;
    links.into_iter().unique().collect()
}
