//! VnExpress article scraper.
//!
//! Scrapes articles from [VnExpress](https://vnexpress.net). Category listings
//! are paginated with a `-p{page}` suffix and link to articles with absolute
//! URLs such as `https://vnexpress.net/article-slug-4812345.html`.

use super::http::{self, ARTICLE_TIMEOUT, LISTING_TIMEOUT};
use super::{SourceAdapter, dedup_links, element_text, resolve_link};
use crate::error::Result;
use crate::models::ArticleFields;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

static LISTING_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse(".title-news a[href]").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("h1.title-detail").unwrap());
static DATE: Lazy<Selector> = Lazy::new(|| Selector::parse("span.date").unwrap());
static DESCRIPTION: Lazy<Selector> = Lazy::new(|| Selector::parse("p.description").unwrap());
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p.Normal").unwrap());

const CATEGORIES: &[&str] = &[
    "thoi-su",
    "the-gioi",
    "kinh-doanh",
    "khoa-hoc",
    "giai-tri",
    "the-thao",
    "phap-luat",
    "giao-duc",
    "suc-khoe",
    "doi-song",
    "du-lich",
];

/// Adapter for vnexpress.net.
#[derive(Debug, Clone)]
pub struct VnExpress {
    client: Client,
    base_url: Url,
}

impl VnExpress {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, Url::parse("https://vnexpress.net").expect("static url"))
    }

    pub fn with_base_url(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn listing_url(&self, category: &str, page: u32) -> String {
        format!("{}/{}-p{}", self.base_url.as_str().trim_end_matches('/'), category, page)
    }
}

#[async_trait]
impl SourceAdapter for VnExpress {
    fn name(&self) -> &str {
        "vnexpress"
    }

    fn categories(&self) -> Vec<String> {
        CATEGORIES.iter().map(|c| c.to_string()).collect()
    }

    #[instrument(level = "debug", skip(self))]
    async fn discover_page(&self, category: &str, page: u32) -> Result<Vec<String>> {
        let url = self.listing_url(category, page);
        let html = http::get_text(&self.client, &url, LISTING_TIMEOUT, None).await?;
        let urls = parse_listing(&html, &self.base_url);
        debug!(count = urls.len(), %url, "Indexed VnExpress listing");
        Ok(urls)
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_article(&self, url: &str) -> Result<Option<ArticleFields>> {
        let html = http::get_text(&self.client, url, ARTICLE_TIMEOUT, None).await?;
        Ok(parse_article(&html))
    }
}

/// Extract article links from a category listing page.
pub fn parse_listing(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let links = document
        .select(&LISTING_LINK)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| resolve_link(base, href))
        .collect();
    dedup_links(links)
}

/// Extract article fields, or `None` when the page has no headline.
pub fn parse_article(html: &str) -> Option<ArticleFields> {
    let document = Html::parse_document(html);
    let title = element_text(document.select(&TITLE).next()?);

    let date = document.select(&DATE).next().map(element_text);
    let description = document.select(&DESCRIPTION).next().map(element_text).into_iter().collect();
    let paragraphs = document.select(&PARAGRAPH).map(element_text).collect();

    Some(ArticleFields {
        title,
        date,
        description,
        paragraphs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LISTING: &str = r#"
        <html><body>
          <h3 class="title-news"><a href="https://vnexpress.net/bai-mot-1.html">Một</a></h3>
          <h3 class="title-news"><a href="https://vnexpress.net/bai-hai-2.html">Hai</a></h3>
          <h3 class="title-news"><a href="https://vnexpress.net/bai-mot-1.html">Một lần nữa</a></h3>
          <h3 class="title-news">Không có link</h3>
        </body></html>"#;

    const ARTICLE: &str = r#"
        <html><body>
          <h1 class="title-detail">Mưa lớn ở miền Trung</h1>
          <span class="date">Thứ hai, 25/11/2025, 10:30 (GMT+7)</span>
          <p class="description">Nhiều tỉnh bị ngập.</p>
          <p class="Normal">Đoạn thứ nhất.</p>
          <p class="Normal">Đoạn thứ hai.</p>
        </body></html>"#;

    #[test]
    fn test_parse_listing() {
        let base = Url::parse("https://vnexpress.net").unwrap();
        let urls = parse_listing(LISTING, &base);
        assert_eq!(
            urls,
            vec![
                "https://vnexpress.net/bai-mot-1.html".to_string(),
                "https://vnexpress.net/bai-hai-2.html".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_article() {
        let article = parse_article(ARTICLE).unwrap();
        assert_eq!(article.title, "Mưa lớn ở miền Trung");
        assert_eq!(article.date.as_deref(), Some("Thứ hai, 25/11/2025, 10:30 (GMT+7)"));
        assert_eq!(article.description, vec!["Nhiều tỉnh bị ngập.".to_string()]);
        assert_eq!(article.paragraphs.len(), 2);
    }

    #[test]
    fn test_page_without_title_is_not_an_article() {
        assert!(parse_article("<html><body><p class='Normal'>x</p></body></html>").is_none());
    }

    #[test]
    fn test_listing_url() {
        let adapter = VnExpress::new(Client::new());
        assert_eq!(adapter.listing_url("the-gioi", 3), "https://vnexpress.net/the-gioi-p3");
    }

    #[tokio::test]
    async fn test_discover_and_fetch_against_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/the-gioi-p1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bai.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ARTICLE))
            .mount(&server)
            .await;

        let adapter = VnExpress::with_base_url(Client::new(), Url::parse(&server.uri()).unwrap());
        let urls = adapter.discover_page("the-gioi", 1).await.unwrap();
        assert_eq!(urls.len(), 2);

        let date = adapter
            .fetch_publish_date(&format!("{}/bai.html", server.uri()))
            .await
            .unwrap();
        assert_eq!(date.as_deref(), Some("Thứ hai, 25/11/2025, 10:30 (GMT+7)"));
    }
}
