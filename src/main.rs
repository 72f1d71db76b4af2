//! # News Harvest
//!
//! A crawler that harvests articles from Vietnamese news sites, stores each
//! one as a flat text artifact and optionally indexes it into Elasticsearch.
//!
//! ## Features
//!
//! - Scrapes VnExpress, Dân Trí, VietNamNet and Quân đội Nhân dân
//! - Paged or time-filtered URL discovery per category, with an early stop
//!   once listing pages stop yielding recent articles
//! - Bounded-concurrency fetching with in-process dedup and an optional
//!   HEAD-based freshness check
//! - Several sources crawled in parallel from one configuration
//! - Continuous mode that repeats the crawl on an interval and survives
//!   failed cycles
//!
//! ## Usage
//!
//! ```sh
//! news_harvest --config config.yml
//! news_harvest --config config.yml --continuous --interval 3600
//! ```
//!
//! ## Architecture
//!
//! 1. **Discovery**: list candidate URLs per category ([`discovery`])
//! 2. **Fetching**: fetch, write and index each URL ([`scheduler`])
//! 3. **Cycles**: run every source once, or forever ([`cycle`])

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod cycle;
mod discovery;
mod error;
mod models;
mod outputs;
mod recency;
mod record;
mod scheduler;
mod scrapers;
#[cfg(test)]
mod testing;
mod utils;

use cli::Cli;
use config::CrawlerConfig;
use cycle::{CrawlCycle, Cycle, run_continuous};
use error::Result;
use outputs::elastic::{ElasticSink, IndexSink};
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_harvest starting up");

    let args = Cli::parse();
    debug!(config = %args.config.display(), interval = ?args.interval, continuous = args.continuous, "Parsed CLI arguments");

    let config = match CrawlerConfig::load(&args.config).and_then(|config| config.with_overrides(&args)) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %args.config.display(), error = %e, "Invalid configuration");
            return ExitCode::from(e.exit_code());
        }
    };

    // Early check: the output root must be writable before any network work
    if let Err(e) = ensure_writable_dir(&config.output_dpath).await {
        error!(
            path = %config.output_dpath.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return ExitCode::from(2);
    }

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                shutdown.cancel();
            }
        });
    }

    let code = match run(config, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Crawl failed");
            ExitCode::from(e.exit_code())
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        elapsed_secs = elapsed.as_secs_f64(),
        "Finished in {}m {}s",
        elapsed.as_secs() / 60,
        elapsed.as_secs() % 60
    );
    code
}

#[instrument(level = "info", skip_all, fields(continuous = config.continuous_mode))]
async fn run(config: CrawlerConfig, shutdown: CancellationToken) -> Result<()> {
    let client = scrapers::http::build_client()?;
    let sink = connect_sink(&config).await;
    let cycle = CrawlCycle::build(config.source_settings(), client, sink)?;

    if config.is_multi_source() {
        info!(sources = config.crawlers.len(), "Multi-source mode");
    }

    if config.continuous_mode {
        info!(interval_secs = config.crawl_interval, "Continuous mode");
        run_continuous(Arc::new(cycle), config.retry_policy(), shutdown).await;
        return Ok(());
    }

    tokio::select! {
        _ = shutdown.cancelled() => {
            info!("Interrupted before the crawl finished");
            Ok(())
        }
        stats = cycle.run_once() => {
            let stats = stats?;
            info!(written = stats.written_total(), failed = stats.failed_total(), "Crawl complete");
            Ok(())
        }
    }
}

/// Connect the Elasticsearch sink when enabled. A cluster that cannot be
/// reached disables indexing for this process instead of failing the crawl.
async fn connect_sink(config: &CrawlerConfig) -> Option<Arc<dyn IndexSink>> {
    let elastic = config.elastic()?;
    let url = elastic.url.clone();
    match ElasticSink::connect(elastic).await {
        Ok(sink) => {
            info!(%url, index = %config.es_index, "Elasticsearch indexing enabled");
            Some(Arc::new(sink))
        }
        Err(e) => {
            warn!(%url, error = %e, "Elasticsearch unavailable; continuing without indexing");
            None
        }
    }
}
