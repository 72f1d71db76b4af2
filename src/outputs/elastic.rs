//! Elasticsearch indexing sink.
//!
//! Each written artifact is parsed back into `title` / `publish_date` / `body`
//! and upserted under a SHA-256 fingerprint of `"{title}_{source}"`, so the
//! same story crawled twice (or under two URLs) lands on one document.
//!
//! The sink talks to the REST API directly:
//!
//! | Call | Purpose |
//! |------|---------|
//! | `HEAD /{index}` / `PUT /{index}` | create the index with Vietnamese analyzers on first use |
//! | `PUT /{index}/_doc/{id}` | upsert one article |
//! | `GET /{index}/_count` | total documents, for cycle statistics |
//! | `POST /{index}/_search` | per-source document counts |
//!
//! Failures here never abort a crawl; the scheduler logs and moves on.

use crate::config::ElasticConfig;
use crate::error::{CrawlError, Result};
use crate::models::{ParsedArticle, parse_artifact};
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info, instrument};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const VIETNAMESE_STOPWORDS: &[&str] = &[
    "tôi", "tao", "mình", "ta", "chúng tôi", "chúng ta", "họ", "nó", "ông", "bà", "anh", "chị",
    "em", "cô", "chú", "cậu", "mày", "thằng", "con", "bị", "bởi", "cả", "các", "cái", "cần",
    "càng", "chỉ", "chiếc", "cho", "chứ", "chưa", "chuyện", "có", "có thể", "cứ", "của", "cùng",
    "cũng", "đã", "đang", "đây", "để", "đến nỗi", "đều", "điều", "do", "đó", "được", "dưới",
    "gì", "khi", "không", "là", "lại", "lên", "lúc", "mà", "mỗi", "một cách", "này", "nên",
    "nếu", "ngay", "nhiều", "như", "nhưng", "những", "nơi", "nữa", "phải", "qua", "ra", "rằng",
    "rất", "rồi", "sau", "sẽ", "so", "sự", "tại", "theo", "thì", "trên", "trước", "từ", "từng",
    "và", "vẫn", "vào", "vậy", "vì", "việc", "với", "vừa",
];

/// Receiver of successfully written artifacts.
#[async_trait]
pub trait IndexSink: Send + Sync {
    /// Index one artifact. `Ok(false)` means the text held no article.
    async fn index(&self, article_text: &str, source: &str, category: &str, url: &str) -> Result<bool>;

    /// Document totals for the end-of-cycle report.
    async fn summary(&self) -> Result<IndexSummary>;
}

/// Document counts held by the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub total: u64,
    pub by_source: Vec<(String, u64)>,
}

/// Stable document id for an article.
pub fn document_id(title: &str, source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{title}_{source}").as_bytes());
    format!("{:x}", hasher.finalize())
}

/// JSON body stored for one article.
pub fn document_body(article: &ParsedArticle, source: &str, category: &str, url: &str) -> Value {
    json!({
        "title": article.title,
        "publish_date_str": article.publish_date_str,
        "publish_date": article.publish_date,
        "body": article.body,
        "source": source,
        "category": category,
        "url": url,
    })
}

fn index_definition() -> Value {
    let analyzed = json!({
        "type": "text",
        "analyzer": "vietnamese_analyzer",
        "fields": { "no_accent": { "type": "text", "analyzer": "vietnamese_no_accent" } }
    });
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 0,
            "analysis": {
                "filter": {
                    "vietnamese_stop": { "type": "stop", "stopwords": VIETNAMESE_STOPWORDS },
                    "ascii_folding": { "type": "asciifolding", "preserve_original": false }
                },
                "analyzer": {
                    "vietnamese_analyzer": {
                        "type": "custom",
                        "tokenizer": "standard",
                        "filter": ["lowercase", "vietnamese_stop"]
                    },
                    "vietnamese_no_accent": {
                        "type": "custom",
                        "tokenizer": "standard",
                        "filter": ["lowercase", "ascii_folding", "vietnamese_stop"]
                    }
                }
            }
        },
        "mappings": {
            "properties": {
                "title": analyzed.clone(),
                "body": analyzed,
                "publish_date": { "type": "date", "format": "yyyy-MM-dd", "ignore_malformed": true },
                "publish_date_str": { "type": "text" },
                "source": { "type": "keyword" },
                "category": { "type": "keyword" },
                "url": { "type": "keyword" }
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    aggregations: Aggregations,
}

#[derive(Debug, Deserialize)]
struct Aggregations {
    by_source: Terms,
}

#[derive(Debug, Deserialize)]
struct Terms {
    buckets: Vec<Bucket>,
}

#[derive(Debug, Deserialize)]
struct Bucket {
    key: String,
    doc_count: u64,
}

/// [`IndexSink`] backed by an Elasticsearch cluster.
#[derive(Debug, Clone)]
pub struct ElasticSink {
    client: Client,
    config: ElasticConfig,
}

impl ElasticSink {
    /// Build the client and make sure the index exists.
    #[instrument(level = "info", skip_all, fields(url = %config.url, index = %config.index))]
    pub async fn connect(config: ElasticConfig) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let sink = Self { client, config };
        sink.ensure_index().await?;
        info!("Elasticsearch sink ready");
        Ok(sink)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.config.url.trim_end_matches('/'), path);
        let request = self.client.request(method, url);
        match &self.config.username {
            Some(user) => request.basic_auth(user, self.config.password.as_ref()),
            None => request,
        }
    }

    async fn ensure_index(&self) -> Result<()> {
        let exists = self.request(Method::HEAD, &self.config.index).send().await?;
        match exists.status() {
            StatusCode::OK => return Ok(()),
            StatusCode::NOT_FOUND => {}
            status => return Err(CrawlError::Sink(format!("index check returned {status}"))),
        }

        let response = self
            .request(Method::PUT, &self.config.index)
            .json(&index_definition())
            .send()
            .await?;
        check(response).await?;
        info!(index = %self.config.index, "Created index");
        Ok(())
    }
}

/// Turn a non-2xx response into [`CrawlError::Sink`].
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CrawlError::Sink(format!("{status}: {}", truncate_for_log(&body, 300))))
}

#[async_trait]
impl IndexSink for ElasticSink {
    #[instrument(level = "debug", skip(self, article_text))]
    async fn index(&self, article_text: &str, source: &str, category: &str, url: &str) -> Result<bool> {
        let Some(article) = parse_artifact(article_text) else {
            return Ok(false);
        };
        let id = document_id(&article.title, source);
        let body = document_body(&article, source, category, url);

        let path = format!("{}/_doc/{}", self.config.index, id);
        check(self.request(Method::PUT, &path).json(&body).send().await?).await?;
        debug!(%id, "Indexed article");
        Ok(true)
    }

    async fn summary(&self) -> Result<IndexSummary> {
        let count_path = format!("{}/_count", self.config.index);
        let count: CountResponse = check(self.request(Method::GET, &count_path).send().await?)
            .await?
            .json()
            .await?;

        let aggs = json!({
            "size": 0,
            "aggs": { "by_source": { "terms": { "field": "source", "size": 100 } } }
        });
        let search_path = format!("{}/_search", self.config.index);
        let search: SearchResponse = check(self.request(Method::POST, &search_path).json(&aggs).send().await?)
            .await?
            .json()
            .await?;

        Ok(IndexSummary {
            total: count.count,
            by_source: search
                .aggregations
                .by_source
                .buckets
                .into_iter()
                .map(|b| (b.key, b.doc_count))
                .collect(),
        })
    }
}
