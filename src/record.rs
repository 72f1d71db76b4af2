//! Process-lifetime dedup state for one source.
//!
//! [`CrawlRecord`] is shared by every worker of a source's fetch scheduler.
//! Both collections are concurrent maps, so workers check and update them
//! without a global lock. The record is never persisted; a restart begins
//! with an empty one.

use dashmap::{DashMap, DashSet};

/// URLs fetched so far and their last freshness fingerprints.
#[derive(Debug, Default)]
pub struct CrawlRecord {
    crawled_urls: DashSet<String>,
    url_hashes: DashMap<String, String>,
}

impl CrawlRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_crawled(&self, url: &str) -> bool {
        self.crawled_urls.contains(url)
    }

    /// Mark `url` as successfully fetched. Returns `false` if it already was.
    pub fn mark_crawled(&self, url: &str) -> bool {
        self.crawled_urls.insert(url.to_string())
    }

    pub fn crawled_count(&self) -> usize {
        self.crawled_urls.len()
    }

    /// Whether `fingerprint` equals the one stored for `url` by the last
    /// successful fetch.
    pub fn fingerprint_matches(&self, url: &str, fingerprint: &str) -> bool {
        self.url_hashes
            .get(url)
            .is_some_and(|stored| stored.value() == fingerprint)
    }

    /// Remember the fingerprint of a successfully fetched `url`.
    pub fn store_fingerprint(&self, url: &str, fingerprint: String) {
        self.url_hashes.insert(url.to_string(), fingerprint);
    }
}
