//! In-process source adapter for exercising the crawl engine without a network.

use crate::error::{CrawlError, Result};
use crate::models::ArticleFields;
use crate::scrapers::SourceAdapter;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted pages and articles, with a log of every call made.
#[derive(Debug, Default)]
pub struct FixtureSource {
    pub name: String,
    pub categories: Vec<String>,
    pages: HashMap<(String, u32), std::result::Result<Vec<String>, String>>,
    articles: HashMap<String, std::result::Result<Option<ArticleFields>, String>>,
    latency: Duration,
    pub page_calls: Mutex<Vec<(String, u32)>>,
    pub article_calls: Mutex<Vec<String>>,
    pub date_calls: Mutex<Vec<String>>,
}

impl FixtureSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            categories: vec!["tin-tuc".to_string()],
            ..Default::default()
        }
    }

    /// Delay applied to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn page(mut self, category: &str, page: u32, urls: &[&str]) -> Self {
        self.pages
            .insert((category.to_string(), page), Ok(urls.iter().map(|u| u.to_string()).collect()));
        self
    }

    pub fn failing_page(mut self, category: &str, page: u32) -> Self {
        self.pages
            .insert((category.to_string(), page), Err("listing unavailable".to_string()));
        self
    }

    /// Register an article with the given title and date text.
    pub fn article(mut self, url: &str, title: &str, date: Option<&str>) -> Self {
        let fields = ArticleFields {
            title: title.to_string(),
            date: date.map(str::to_string),
            description: vec![format!("Mô tả {title}")],
            paragraphs: vec![format!("Nội dung {title}")],
        };
        self.articles.insert(url.to_string(), Ok(Some(fields)));
        self
    }

    /// Register a URL whose page has no article.
    pub fn not_an_article(mut self, url: &str) -> Self {
        self.articles.insert(url.to_string(), Ok(None));
        self
    }

    pub fn failing_article(mut self, url: &str) -> Self {
        self.articles.insert(url.to_string(), Err("connection reset".to_string()));
        self
    }

    pub fn pages_requested(&self) -> Vec<u32> {
        self.page_calls.lock().unwrap().iter().map(|(_, p)| *p).collect()
    }

    pub fn article_fetches(&self, url: &str) -> usize {
        self.article_calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    async fn wait(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl SourceAdapter for FixtureSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn categories(&self) -> Vec<String> {
        self.categories.clone()
    }

    async fn discover_page(&self, category: &str, page: u32) -> Result<Vec<String>> {
        self.page_calls.lock().unwrap().push((category.to_string(), page));
        self.wait().await;
        match self.pages.get(&(category.to_string(), page)) {
            Some(Ok(urls)) => Ok(urls.clone()),
            Some(Err(msg)) => Err(CrawlError::Io(std::io::Error::other(msg.clone()))),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_article(&self, url: &str) -> Result<Option<ArticleFields>> {
        self.article_calls.lock().unwrap().push(url.to_string());
        self.wait().await;
        match self.articles.get(url) {
            Some(Ok(fields)) => Ok(fields.clone()),
            Some(Err(msg)) => Err(CrawlError::Io(std::io::Error::other(msg.clone()))),
            None => Ok(None),
        }
    }

    async fn fetch_publish_date(&self, url: &str) -> Result<Option<String>> {
        self.date_calls.lock().unwrap().push(url.to_string());
        self.wait().await;
        match self.articles.get(url) {
            Some(Ok(fields)) => Ok(fields.as_ref().and_then(|f| f.date.clone())),
            Some(Err(msg)) => Err(CrawlError::Io(std::io::Error::other(msg.clone()))),
            None => Ok(None),
        }
    }
}

/// `D/M/YYYY` text for a date `days` before today.
pub fn days_ago(days: i64) -> String {
    (chrono::Local::now() - chrono::Duration::days(days))
        .format("%d/%m/%Y")
        .to_string()
}
