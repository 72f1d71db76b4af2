//! Candidate URL discovery for one category.
//!
//! Two strategies, chosen by configuration rather than by probing the
//! adapter:
//!
//! - [`PagedDiscovery`] fetches pages `1..=total_pages` concurrently and
//!   returns the union of their links.
//! - [`TimeFilteredDiscovery`] walks pages in order, looks up each link's
//!   publish date and keeps only recent articles. It stops at the first empty
//!   page, or once `stale_page_threshold` consecutive pages held nothing
//!   recent, so open-ended archives are not paged through to the end.
//!
//! Listing and date lookup errors are logged and contribute no URLs; they
//! never abort discovery of the remaining pages. A page whose listing failed
//! counts as stale. A page where some date lookup failed does not.

use crate::config::SourceSettings;
use crate::error::Result;
use crate::models::CrawlTarget;
use crate::recency;
use crate::scrapers::SourceAdapter;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::fmt::Debug;
use tracing::{debug, info, instrument, warn};

/// Builds the candidate URL set for one [`CrawlTarget`].
#[async_trait]
pub trait DiscoveryStrategy: Send + Sync + Debug {
    /// Unique candidate URLs, in first-seen order.
    async fn discover(&self, adapter: &dyn SourceAdapter, target: &CrawlTarget) -> Vec<String>;
}

/// Pick the strategy for a source: time-filtered when `max_days_old` is set.
pub fn strategy_for(settings: &SourceSettings) -> Box<dyn DiscoveryStrategy> {
    match settings.max_days_old {
        Some(_) => Box::new(TimeFilteredDiscovery::new(
            settings.num_workers,
            settings.stale_page_threshold,
            settings.cache_publish_dates,
        )),
        None => Box::new(PagedDiscovery::new(settings.num_workers)),
    }
}

/// Concurrent page scan without any date filtering.
#[derive(Debug, Clone)]
pub struct PagedDiscovery {
    num_workers: usize,
}

impl PagedDiscovery {
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers: num_workers.max(1),
        }
    }
}

#[async_trait]
impl DiscoveryStrategy for PagedDiscovery {
    #[instrument(level = "info", skip_all, fields(source = %target.source, category = %target.category))]
    async fn discover(&self, adapter: &dyn SourceAdapter, target: &CrawlTarget) -> Vec<String> {
        let pages: Vec<Vec<String>> = stream::iter(1..=target.total_pages)
            .map(|page| async move {
                match adapter.discover_page(&target.category, page).await {
                    Ok(urls) => {
                        debug!(page, count = urls.len(), "Listed page");
                        urls
                    }
                    Err(e) => {
                        warn!(page, error = %e, "Listing page failed");
                        Vec::new()
                    }
                }
            })
            .buffered(self.num_workers)
            .collect()
            .await;

        let urls: Vec<String> = pages.into_iter().flatten().unique().collect();
        info!(pages = target.total_pages, count = urls.len(), "Discovered URLs");
        urls
    }
}

/// Sequential page scan keeping only recent articles.
#[derive(Debug)]
pub struct TimeFilteredDiscovery {
    num_workers: usize,
    stale_page_threshold: u32,
    /// Publish dates already looked up, keyed by URL.
    date_cache: Option<DashMap<String, Option<String>>>,
}

impl TimeFilteredDiscovery {
    pub fn new(num_workers: usize, stale_page_threshold: u32, cache_dates: bool) -> Self {
        Self {
            num_workers: num_workers.max(1),
            stale_page_threshold: stale_page_threshold.max(1),
            date_cache: cache_dates.then(DashMap::new),
        }
    }

    async fn publish_date(&self, adapter: &dyn SourceAdapter, url: &str) -> Result<Option<String>> {
        if let Some(hit) = self.date_cache.as_ref().and_then(|cache| cache.get(url)) {
            return Ok(hit.clone());
        }
        let date = adapter.fetch_publish_date(url).await?;
        if let Some(cache) = &self.date_cache {
            cache.insert(url.to_string(), date.clone());
        }
        Ok(date)
    }

    /// Recent URLs on one page of candidates.
    async fn recent_urls(&self, adapter: &dyn SourceAdapter, target: &CrawlTarget, urls: Vec<String>) -> PageDates {
        let lookups: Vec<(String, Result<Option<String>>)> = stream::iter(urls)
            .map(|url| async move {
                let date = self.publish_date(adapter, &url).await;
                (url, date)
            })
            .buffered(self.num_workers)
            .collect()
            .await;

        let mut page = PageDates::default();
        for (url, lookup) in lookups {
            match lookup {
                Ok(date) => {
                    let keep = target.max_days_old.is_none_or(|max_days| {
                        recency::is_recent(date.as_deref(), max_days, |text| adapter.parse_date(text))
                    });
                    if keep {
                        page.recent.push(url);
                    } else {
                        debug!(%url, date = ?date, "Skipping old article");
                    }
                }
                Err(e) => {
                    warn!(%url, error = %e, "Publish date lookup failed");
                    page.undetermined += 1;
                }
            }
        }
        page
    }
}

/// Date filtering result for one listing page.
#[derive(Debug, Default)]
struct PageDates {
    recent: Vec<String>,
    /// Candidates whose date lookup failed.
    undetermined: usize,
}

#[async_trait]
impl DiscoveryStrategy for TimeFilteredDiscovery {
    #[instrument(
        level = "info",
        skip_all,
        fields(source = %target.source, category = %target.category, max_days_old = ?target.max_days_old)
    )]
    async fn discover(&self, adapter: &dyn SourceAdapter, target: &CrawlTarget) -> Vec<String> {
        let mut found = Vec::new();
        let mut stale_pages = 0u32;
        let mut scanned = 0u32;

        for page in 1..=target.total_pages {
            scanned = page;
            let candidates = match adapter.discover_page(&target.category, page).await {
                Ok(urls) => urls,
                Err(e) => {
                    warn!(page, error = %e, "Listing page failed");
                    stale_pages += 1;
                    if stale_pages >= self.stale_page_threshold {
                        info!(page, stale_pages, "Stopping after consecutive pages without recent articles");
                        break;
                    }
                    continue;
                }
            };

            if candidates.is_empty() {
                info!(page, "Page has no articles; end of listing");
                break;
            }

            let total = candidates.len();
            let dates = self.recent_urls(adapter, target, candidates).await;
            info!(
                page,
                total,
                recent = dates.recent.len(),
                undetermined = dates.undetermined,
                "Filtered page by publish date"
            );

            if dates.recent.is_empty() && dates.undetermined == 0 {
                stale_pages += 1;
                if stale_pages >= self.stale_page_threshold {
                    info!(page, stale_pages, "Stopping after consecutive pages without recent articles");
                    break;
                }
            } else {
                stale_pages = 0;
                found.extend(dates.recent);
            }
        }

        let urls: Vec<String> = found.into_iter().unique().collect();
        info!(pages_scanned = scanned, count = urls.len(), "Discovered recent URLs");
        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArticleType, Task};
    use crate::testing::{FixtureSource, days_ago};
    use std::collections::HashSet;
    use std::path::PathBuf;

    fn target(total_pages: u32, max_days_old: Option<u32>) -> CrawlTarget {
        CrawlTarget {
            source: "fixture".into(),
            category: "tin-tuc".into(),
            total_pages,
            max_days_old,
        }
    }

    fn urls(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("https://site/{prefix}/{i}")).collect()
    }

    fn refs(v: &[String]) -> Vec<&str> {
        v.iter().map(String::as_str).collect()
    }

    /// Three pages of five links, page 2 repeating two links from page 1.
    fn three_page_fixture() -> FixtureSource {
        let p1 = urls("p1", 5);
        let mut p2 = urls("p2", 3);
        p2.extend_from_slice(&p1[..2]);
        let p3 = urls("p3", 5);
        FixtureSource::new("fixture")
            .page("tin-tuc", 1, &refs(&p1))
            .page("tin-tuc", 2, &refs(&p2))
            .page("tin-tuc", 3, &refs(&p3))
    }

    #[tokio::test]
    async fn test_paged_discovery_deduplicates_across_pages() {
        let source = three_page_fixture();
        let found = PagedDiscovery::new(3).discover(&source, &target(3, None)).await;
        assert_eq!(found.len(), 13);
        assert_eq!(found.iter().collect::<HashSet<_>>().len(), 13);
    }

    #[tokio::test]
    async fn test_paged_discovery_is_repeatable() {
        let source = three_page_fixture();
        let strategy = PagedDiscovery::new(2);
        let first: HashSet<String> = strategy.discover(&source, &target(3, None)).await.into_iter().collect();
        let second: HashSet<String> = strategy.discover(&source, &target(3, None)).await.into_iter().collect();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_paged_discovery_skips_failing_page() {
        let source = FixtureSource::new("fixture")
            .page("tin-tuc", 1, &["https://site/a"])
            .failing_page("tin-tuc", 2)
            .page("tin-tuc", 3, &["https://site/b"]);
        let found = PagedDiscovery::new(1).discover(&source, &target(3, None)).await;
        assert_eq!(found, vec!["https://site/a".to_string(), "https://site/b".to_string()]);
    }

    /// Pages 1-2 contain a recent article, pages 3-6 only old ones.
    fn stale_tail_fixture() -> FixtureSource {
        let recent = days_ago(0);
        let mut source = FixtureSource::new("fixture");
        for page in 1..=6u32 {
            let url = format!("https://site/p{page}");
            source = source.page("tin-tuc", page, &[url.as_str()]);
            let date = if page <= 2 { recent.as_str() } else { "1/1/2000" };
            source = source.article(&url, "Tin", Some(date));
        }
        source
    }

    #[tokio::test]
    async fn test_time_filter_stops_after_consecutive_stale_pages() {
        let source = stale_tail_fixture();
        let strategy = TimeFilteredDiscovery::new(2, 3, false);
        let found = strategy.discover(&source, &target(6, Some(7))).await;

        assert_eq!(found, vec!["https://site/p1".to_string(), "https://site/p2".to_string()]);
        assert_eq!(source.pages_requested(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_time_filter_stale_counter_resets_on_recent_page() {
        let recent = days_ago(1);
        let source = FixtureSource::new("fixture")
            .page("tin-tuc", 1, &["https://site/old1"])
            .page("tin-tuc", 2, &["https://site/old2"])
            .page("tin-tuc", 3, &["https://site/new"])
            .page("tin-tuc", 4, &["https://site/old3"])
            .article("https://site/old1", "a", Some("1/1/2000"))
            .article("https://site/old2", "b", Some("1/1/2000"))
            .article("https://site/new", "c", Some(recent.as_str()))
            .article("https://site/old3", "d", Some("1/1/2000"));

        let found = TimeFilteredDiscovery::new(1, 3, false)
            .discover(&source, &target(4, Some(3)))
            .await;
        assert_eq!(found, vec!["https://site/new".to_string()]);
        assert_eq!(source.pages_requested(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_time_filter_excludes_old_and_keeps_unparseable() {
        let source = FixtureSource::new("fixture")
            .page("tin-tuc", 1, &["https://site/old", "https://site/unknown", "https://site/nodate"])
            .article("https://site/old", "Cũ", Some("3/2/2001"))
            .article("https://site/unknown", "Lạ", Some("hôm qua"))
            .article("https://site/nodate", "Không ngày", None);

        let found = TimeFilteredDiscovery::new(2, 3, false)
            .discover(&source, &target(1, Some(2)))
            .await;
        assert_eq!(
            found,
            vec!["https://site/unknown".to_string(), "https://site/nodate".to_string()]
        );
    }

    #[tokio::test]
    async fn test_time_filter_stops_on_empty_page() {
        let today = days_ago(0);
        let source = FixtureSource::new("fixture")
            .page("tin-tuc", 1, &["https://site/a"])
            .article("https://site/a", "A", Some(today.as_str()));

        let found = TimeFilteredDiscovery::new(1, 3, false)
            .discover(&source, &target(10, Some(1)))
            .await;
        assert_eq!(found.len(), 1);
        assert_eq!(source.pages_requested(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_time_filter_date_errors_contribute_nothing() {
        let today = days_ago(0);
        let source = FixtureSource::new("fixture")
            .page("tin-tuc", 1, &["https://site/broken", "https://site/ok"])
            .failing_article("https://site/broken")
            .article("https://site/ok", "OK", Some(today.as_str()));

        let found = TimeFilteredDiscovery::new(2, 3, false)
            .discover(&source, &target(1, Some(1)))
            .await;
        assert_eq!(found, vec!["https://site/ok".to_string()]);
    }

    #[tokio::test]
    async fn test_time_filter_undetermined_dates_keep_scanning() {
        let today = days_ago(0);
        let mut source = FixtureSource::new("fixture");
        for page in 1..=3u32 {
            let url = format!("https://site/broken{page}");
            source = source.page("tin-tuc", page, &[url.as_str()]).failing_article(&url);
        }
        let source = source
            .page("tin-tuc", 4, &["https://site/fresh"])
            .article("https://site/fresh", "Mới", Some(today.as_str()));

        let found = TimeFilteredDiscovery::new(1, 3, false)
            .discover(&source, &target(4, Some(1)))
            .await;
        assert_eq!(found, vec!["https://site/fresh".to_string()]);
        assert_eq!(source.pages_requested(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_time_filter_failing_pages_count_as_stale() {
        let source = FixtureSource::new("fixture")
            .failing_page("tin-tuc", 1)
            .failing_page("tin-tuc", 2)
            .page("tin-tuc", 3, &["https://site/never"]);

        let found = TimeFilteredDiscovery::new(1, 2, false)
            .discover(&source, &target(3, Some(1)))
            .await;
        assert!(found.is_empty());
        assert_eq!(source.pages_requested(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_date_cache_avoids_second_lookup() {
        let today = days_ago(0);
        let source = FixtureSource::new("fixture")
            .page("tin-tuc", 1, &["https://site/a"])
            .article("https://site/a", "A", Some(today.as_str()));

        let cached = TimeFilteredDiscovery::new(1, 3, true);
        cached.discover(&source, &target(1, Some(1))).await;
        cached.discover(&source, &target(1, Some(1))).await;
        assert_eq!(source.date_calls.lock().unwrap().len(), 1);

        let uncached = TimeFilteredDiscovery::new(1, 3, false);
        uncached.discover(&source, &target(1, Some(1))).await;
        uncached.discover(&source, &target(1, Some(1))).await;
        assert_eq!(source.date_calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_strategy_selected_by_max_days_old() {
        let mut settings = SourceSettings {
            source: "vnexpress".into(),
            task: Task::Type,
            article_type: ArticleType::All,
            article_type_dict: vec![],
            urls_fpath: None,
            output_dpath: PathBuf::from("out"),
            total_pages: 2,
            num_workers: 2,
            max_days_old: None,
            stale_page_threshold: 3,
            cache_publish_dates: true,
            use_head_check: false,
        };
        assert!(format!("{:?}", strategy_for(&settings)).starts_with("PagedDiscovery"));
        settings.max_days_old = Some(3);
        assert!(format!("{:?}", strategy_for(&settings)).starts_with("TimeFilteredDiscovery"));
    }
}
