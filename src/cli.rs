//! Command-line interface definitions for News Harvest.
//!
//! Most settings live in the YAML configuration file; the flags here only
//! select that file and override the few values that are commonly changed
//! per invocation.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the News Harvest crawler.
///
/// # Examples
///
/// ```sh
/// # Single run using the default config file
/// news_harvest
///
/// # Continuous crawling every 30 minutes
/// news_harvest --config config_vnexpress.yml --continuous --interval 1800
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yml")]
    pub config: PathBuf,

    /// Seconds between crawl cycles (overrides `crawl_interval`)
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Keep crawling in cycles until interrupted (overrides `continuous_mode`)
    #[arg(long)]
    pub continuous: bool,

    /// Elasticsearch username
    #[arg(long, env = "ES_USERNAME")]
    pub es_username: Option<String>,

    /// Elasticsearch password
    #[arg(long, env = "ES_PASSWORD", hide_env_values = true)]
    pub es_password: Option<String>,
}
