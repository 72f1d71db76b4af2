//! Bounded-concurrency article fetching for one category.
//!
//! [`FetchScheduler::fetch_all`] takes the discovered URL list and turns each
//! URL into one [`FetchOutcome`]:
//!
//! 1. URLs already crawled in this process are dropped before dispatch, and
//!    checked again by the worker in case another category got there first.
//! 2. With a [`FreshnessCheck`], a HEAD request fingerprints the URL. A
//!    fingerprint equal to the one stored by the last successful fetch
//!    means the article is skipped. Failed fetches store nothing, so a
//!    failed URL is always tried again.
//! 3. The adapter fetches the article; the artifact is written to
//!    `url_{NNN}.txt` under the category's result directory.
//! 4. The URL is marked crawled and, if configured, the artifact is handed to
//!    the index sink. Sink failures are logged and do not fail the URL.
//!
//! At most `num_workers` URLs are in flight at once. Outcomes are returned in
//! completion order.

use crate::error::Result;
use crate::models::FetchOutcome;
use crate::outputs::artifact::{artifact_path, index_width, remove_partial_artifacts, write_artifact};
use crate::outputs::elastic::IndexSink;
use crate::record::CrawlRecord;
use crate::scrapers::SourceAdapter;
use crate::scrapers::http::HEAD_TIMEOUT;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use reqwest::Client;
use reqwest::header::{ETAG, HeaderMap, LAST_MODIFIED};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// HEAD-based change detection.
#[derive(Debug, Clone)]
pub struct FreshnessCheck {
    client: Client,
}

impl FreshnessCheck {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fingerprint of `url` from its `ETag` and `Last-Modified` headers.
    ///
    /// `Ok(None)` when the server sends neither header.
    pub async fn fingerprint(&self, url: &str) -> Result<Option<String>> {
        let response = self
            .client
            .head(url)
            .timeout(HEAD_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(fingerprint_headers(response.headers()))
    }
}

fn fingerprint_headers(headers: &HeaderMap) -> Option<String> {
    let etag = headers.get(ETAG).and_then(|v| v.to_str().ok());
    let last_modified = headers.get(LAST_MODIFIED).and_then(|v| v.to_str().ok());
    if etag.is_none() && last_modified.is_none() {
        return None;
    }
    let mut hasher = Sha256::new();
    hasher.update(etag.unwrap_or_default());
    hasher.update(last_modified.unwrap_or_default());
    Some(format!("{:x}", hasher.finalize()))
}

/// Fetches articles for one source, sharing its [`CrawlRecord`].
pub struct FetchScheduler {
    adapter: Arc<dyn SourceAdapter>,
    record: Arc<CrawlRecord>,
    freshness: Option<FreshnessCheck>,
    sink: Option<Arc<dyn IndexSink>>,
    num_workers: usize,
}

impl FetchScheduler {
    pub fn new(adapter: Arc<dyn SourceAdapter>, record: Arc<CrawlRecord>, num_workers: usize) -> Self {
        Self {
            adapter,
            record,
            freshness: None,
            sink: None,
            num_workers: num_workers.max(1),
        }
    }

    pub fn with_freshness_check(mut self, check: FreshnessCheck) -> Self {
        self.freshness = Some(check);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn IndexSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn record(&self) -> &CrawlRecord {
        &self.record
    }

    /// Fetch every not-yet-crawled URL in `urls` into `destination`.
    ///
    /// Per-URL failures are reported as [`FetchOutcome::Failed`]; only a
    /// failure to prepare `destination` is returned as an error.
    #[instrument(level = "info", skip_all, fields(source = %self.adapter.name(), category = %category))]
    pub async fn fetch_all(&self, urls: &[String], destination: &Path, category: &str) -> Result<Vec<FetchOutcome>> {
        let pending: Vec<String> = urls
            .iter()
            .unique()
            .filter(|url| !self.record.is_crawled(url))
            .cloned()
            .collect();
        if pending.is_empty() {
            info!(candidates = urls.len(), "No new URLs to fetch");
            return Ok(Vec::new());
        }

        tokio::fs::create_dir_all(destination).await?;
        remove_partial_artifacts(destination).await?;
        let width = index_width(pending.len());
        let total = pending.len();
        let report_every = (total / 10).max(1);
        info!(total, workers = self.num_workers, "Fetching articles");

        let mut outcomes = Vec::with_capacity(total);
        let mut fetches = stream::iter(pending.into_iter().enumerate())
            .map(|(index, url)| {
                let path = artifact_path(destination, index, width);
                async move { self.fetch_one(&url, path, category).await }
            })
            .buffer_unordered(self.num_workers);
        while let Some(outcome) = fetches.next().await {
            outcomes.push(outcome);
            if outcomes.len() % report_every == 0 || outcomes.len() == total {
                info!(done = outcomes.len(), total, "Fetch progress");
            }
        }

        let failed = outcomes.iter().filter(|o| o.failed_url().is_some()).count();
        info!(total, failed, "Fetched articles");
        Ok(outcomes)
    }

    async fn fetch_one(&self, url: &str, path: PathBuf, category: &str) -> FetchOutcome {
        if self.record.is_crawled(url) {
            debug!(%url, "Already crawled");
            return FetchOutcome::Skipped;
        }

        let fingerprint = match &self.freshness {
            Some(check) => match check.fingerprint(url).await {
                Ok(Some(fp)) if self.record.fingerprint_matches(url, &fp) => {
                    debug!(%url, "Unchanged since last fetch");
                    return FetchOutcome::Skipped;
                }
                Ok(fp) => fp,
                Err(e) => {
                    debug!(%url, error = %e, "HEAD check failed; fetching anyway");
                    None
                }
            },
            None => None,
        };

        let fields = match self.adapter.fetch_article(url).await {
            Ok(Some(fields)) if fields.has_title() => fields,
            Ok(_) => {
                warn!(%url, "No article content found");
                return FetchOutcome::Failed(url.to_string());
            }
            Err(e) => {
                warn!(%url, error = %e, "Article fetch failed");
                return FetchOutcome::Failed(url.to_string());
            }
        };

        let text = fields.to_artifact();
        if let Err(e) = write_artifact(&path, &text).await {
            error!(%url, path = %path.display(), error = %e, "Failed to write artifact");
            return FetchOutcome::Failed(url.to_string());
        }
        self.record.mark_crawled(url);
        if let Some(fp) = fingerprint {
            self.record.store_fingerprint(url, fp);
        }
        debug!(%url, path = %path.display(), "Wrote artifact");

        if let Some(sink) = &self.sink {
            match sink.index(&text, self.adapter.name(), category, url).await {
                Ok(true) => debug!(%url, "Indexed article"),
                Ok(false) => warn!(%url, "Artifact not indexable"),
                Err(e) => warn!(%url, error = %e, "Indexing failed"),
            }
        }
        FetchOutcome::Written(path)
    }
}
