//! Crawl cycles and the continuous loop around them.
//!
//! A [`CrawlCycle`] is one discovery + fetch pass over every configured
//! source. Each source is a [`SourceCrawler`] that owns its adapter, its
//! discovery strategy and a [`FetchScheduler`] whose [`CrawlRecord`] lives as
//! long as the crawler, so URLs fetched in one cycle are skipped in the next.
//!
//! With one source, its categories run one after another and an error fails
//! the cycle. With several, every source runs in its own task; a failing or
//! panicking source is recorded in the statistics and the others carry on.
//!
//! [`run_continuous`] repeats a [`Cycle`] until the shutdown token fires,
//! sleeping [`RetryPolicy::interval`] after a good cycle and
//! [`RetryPolicy::cooldown`] after a failed one.

use crate::config::{ArticleType, SourceSettings, Task};
use crate::discovery::{DiscoveryStrategy, strategy_for};
use crate::error::{CrawlError, Result};
use crate::models::{CrawlTarget, CycleStats, SourceStats};
use crate::outputs::artifact::{init_output_dirs, read_url_list, safe_name, write_url_list};
use crate::outputs::elastic::IndexSink;
use crate::record::CrawlRecord;
use crate::scheduler::{FetchScheduler, FreshnessCheck};
use crate::scrapers::{SourceAdapter, build_adapter};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Pauses between cycles of the continuous loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Sleep after a successful cycle.
    pub interval: Duration,
    /// Sleep after a failed cycle.
    pub cooldown: Duration,
}

/// One complete pass that [`run_continuous`] can repeat.
#[async_trait]
pub trait Cycle: Send + Sync {
    async fn run_once(&self) -> Result<CycleStats>;
}

/// Crawls one source.
pub struct SourceCrawler {
    settings: SourceSettings,
    adapter: Arc<dyn SourceAdapter>,
    discovery: Box<dyn DiscoveryStrategy>,
    scheduler: FetchScheduler,
    output_lock: Arc<Mutex<()>>,
}

impl SourceCrawler {
    pub fn new(settings: SourceSettings, adapter: Arc<dyn SourceAdapter>, client: Client) -> Self {
        let record = Arc::new(CrawlRecord::new());
        let mut scheduler = FetchScheduler::new(Arc::clone(&adapter), record, settings.num_workers);
        if settings.use_head_check {
            scheduler = scheduler.with_freshness_check(FreshnessCheck::new(client));
        }
        Self {
            discovery: strategy_for(&settings),
            settings,
            adapter,
            scheduler,
            output_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn IndexSink>) -> Self {
        self.scheduler = self.scheduler.with_sink(sink);
        self
    }

    /// Share the lock that serializes statistics blocks across sources.
    pub fn with_output_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.output_lock = lock;
        self
    }

    pub fn name(&self) -> &str {
        self.adapter.name()
    }

    /// Categories to crawl in `task: type` mode.
    fn categories(&self) -> Vec<String> {
        match &self.settings.article_type {
            ArticleType::Named(category) => vec![category.clone()],
            ArticleType::All if !self.settings.article_type_dict.is_empty() => {
                self.settings.article_type_dict.clone()
            }
            ArticleType::All => self.adapter.categories(),
        }
    }

    /// Run one pass and log its statistics block.
    #[instrument(level = "info", skip_all, fields(source = %self.name()))]
    pub async fn crawl(&self) -> Result<SourceStats> {
        let stats = match self.settings.task {
            Task::Type => self.crawl_types().await?,
            Task::Url => self.crawl_url_file().await?,
        };
        self.report(&stats).await;
        Ok(stats)
    }

    async fn crawl_types(&self) -> Result<SourceStats> {
        let dirs = init_output_dirs(&self.settings.output_dpath).await?;
        let mut stats = SourceStats::new(self.name());

        let categories = self.categories();
        if categories.is_empty() {
            warn!("No categories to crawl");
        }
        for category in categories {
            let target = CrawlTarget {
                source: self.name().to_string(),
                category: category.clone(),
                total_pages: self.settings.total_pages,
                max_days_old: self.settings.max_days_old,
            };
            let urls = self.discovery.discover(self.adapter.as_ref(), &target).await;

            let safe = safe_name(&category);
            write_url_list(&dirs.urls.join(format!("{safe}.txt")), &urls).await?;
            let outcomes = self
                .scheduler
                .fetch_all(&urls, &dirs.results.join(&safe), &category)
                .await?;
            stats.record(&category, &outcomes);
        }
        Ok(stats)
    }

    async fn crawl_url_file(&self) -> Result<SourceStats> {
        let path = self
            .settings
            .urls_fpath
            .as_deref()
            .ok_or_else(|| CrawlError::Config("task `url` requires `urls_fpath`".into()))?;
        let urls = read_url_list(path).await?;
        info!(path = %path.display(), count = urls.len(), "Read URL list");

        let label = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "urls".to_string());
        let outcomes = self
            .scheduler
            .fetch_all(&urls, &self.settings.output_dpath, &label)
            .await?;

        let mut stats = SourceStats::new(self.name());
        stats.record(&label, &outcomes);
        Ok(stats)
    }

    async fn report(&self, stats: &SourceStats) {
        let _guard = self.output_lock.lock().await;
        for (category, failed) in &stats.failed_by_category {
            info!(source = %stats.source, %category, failed, "Category finished");
        }
        info!(
            source = %stats.source,
            written = stats.written,
            skipped = stats.skipped,
            failed = stats.failed_total(),
            crawled = self.scheduler.record().crawled_count(),
            "Source finished"
        );
    }
}

/// Every configured source, crawled once per [`Cycle::run_once`].
pub struct CrawlCycle {
    crawlers: Vec<Arc<SourceCrawler>>,
    sink: Option<Arc<dyn IndexSink>>,
}

impl CrawlCycle {
    pub fn new(crawlers: Vec<SourceCrawler>, sink: Option<Arc<dyn IndexSink>>) -> Self {
        let output_lock = Arc::new(Mutex::new(()));
        let crawlers = crawlers
            .into_iter()
            .map(|crawler| Arc::new(crawler.with_output_lock(Arc::clone(&output_lock))))
            .collect();
        Self { crawlers, sink }
    }

    /// Build a crawler for every source in `settings` from the adapter registry.
    pub fn build(settings: Vec<SourceSettings>, client: Client, sink: Option<Arc<dyn IndexSink>>) -> Result<Self> {
        let mut crawlers = Vec::with_capacity(settings.len());
        for source in settings {
            let adapter = build_adapter(&source.source, client.clone())?;
            let mut crawler = SourceCrawler::new(source, adapter, client.clone());
            if let Some(sink) = &sink {
                crawler = crawler.with_sink(Arc::clone(sink));
            }
            crawlers.push(crawler);
        }
        Ok(Self::new(crawlers, sink))
    }

    async fn run_parallel(&self) -> Vec<SourceStats> {
        let handles: Vec<_> = self
            .crawlers
            .iter()
            .map(|crawler| {
                let crawler = Arc::clone(crawler);
                tokio::spawn(async move { crawler.crawl().await })
            })
            .collect();

        let joined = join_all(handles).await;
        self.crawlers
            .iter()
            .zip(joined)
            .map(|(crawler, result)| {
                let failure = match result {
                    Ok(Ok(stats)) => return stats,
                    Ok(Err(e)) => e,
                    Err(join) => CrawlError::TaskPanicked {
                        source_name: crawler.name().to_string(),
                        message: join.to_string(),
                    },
                };
                error!(source = %crawler.name(), error = %failure, "Source crawl failed");
                SourceStats {
                    error: Some(failure.to_string()),
                    ..SourceStats::new(crawler.name())
                }
            })
            .collect()
    }

    async fn report_index(&self) {
        let Some(sink) = &self.sink else {
            return;
        };
        match sink.summary().await {
            Ok(summary) => {
                for (source, count) in &summary.by_source {
                    info!(%source, documents = count, "Indexed documents");
                }
                info!(total = summary.total, "Index document total");
            }
            Err(e) => warn!(error = %e, "Could not read index statistics"),
        }
    }
}

#[async_trait]
impl Cycle for CrawlCycle {
    async fn run_once(&self) -> Result<CycleStats> {
        let sources = match self.crawlers.as_slice() {
            [single] => vec![single.crawl().await?],
            _ => self.run_parallel().await,
        };
        let stats = CycleStats { sources };

        info!(
            sources = stats.sources.len(),
            written = stats.written_total(),
            failed = stats.failed_total(),
            "Cycle finished"
        );
        self.report_index().await;
        Ok(stats)
    }
}

/// Repeat `cycle` until `shutdown` is cancelled.
///
/// A failed or panicked cycle is logged and followed by the cooldown; it never
/// ends the loop. Cancellation is observed both mid-cycle and while sleeping.
pub async fn run_continuous(cycle: Arc<dyn Cycle>, policy: RetryPolicy, shutdown: CancellationToken) {
    let mut number: u64 = 0;
    while !shutdown.is_cancelled() {
        number += 1;
        info!(cycle = number, "Starting crawl cycle");

        let running = {
            let cycle = Arc::clone(&cycle);
            tokio::spawn(async move { cycle.run_once().await })
        };
        let abort = running.abort_handle();
        let outcome = tokio::select! {
            _ = shutdown.cancelled() => {
                abort.abort();
                info!(cycle = number, "Interrupted during cycle");
                break;
            }
            joined = running => joined,
        };

        let pause = match outcome {
            Ok(Ok(stats)) => {
                info!(
                    cycle = number,
                    written = stats.written_total(),
                    failed = stats.failed_total(),
                    "Cycle completed"
                );
                policy.interval
            }
            Ok(Err(e)) => {
                error!(cycle = number, error = %e, "Cycle failed");
                policy.cooldown
            }
            Err(join) => {
                error!(cycle = number, error = %join, "Cycle task panicked");
                policy.cooldown
            }
        };

        info!(seconds = pause.as_secs(), "Waiting before next cycle");
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }
    info!(cycles = number, "Continuous crawl stopped");
}
