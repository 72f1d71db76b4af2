//! YAML configuration for the crawler.
//!
//! The whole configuration surface lives in one explicit struct. Unknown keys
//! are rejected when the file is parsed and value ranges are checked by
//! [`CrawlerConfig::validate`] before anything touches the network.
//!
//! # Example
//!
//! ```yaml
//! webname: vnexpress
//! task: type
//! article_type: the-gioi
//! total_pages: 5
//! num_workers: 4
//! output_dpath: result
//! continuous_mode: true
//! crawl_interval: 3600
//! max_days_old: 2
//! ```
//!
//! Listing several sources under `crawlers` switches to multi-source mode,
//! where every source runs concurrently with its own worker pool:
//!
//! ```yaml
//! crawlers:
//!   - { name: vnexpress, article_type: the-gioi }
//!   - { name: qdnd, article_type: quoc-te }
//! ```

use crate::cli::Cli;
use crate::cycle::RetryPolicy;
use crate::error::{CrawlError, Result};
use crate::scrapers;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

/// How URLs for a run are obtained.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    /// Read URLs from `urls_fpath` and fetch them.
    Url,
    /// Discover URLs by paging through site categories.
    #[default]
    Type,
}

/// A single category or every category the source knows about.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(from = "String")]
pub enum ArticleType {
    #[default]
    All,
    Named(String),
}

impl From<String> for ArticleType {
    fn from(value: String) -> Self {
        if value.trim() == "all" {
            ArticleType::All
        } else {
            ArticleType::Named(value.trim().to_string())
        }
    }
}

/// One entry of the `crawlers` list.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    pub name: String,
    pub article_type: ArticleType,
}

/// Connection settings for the Elasticsearch sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElasticConfig {
    pub url: String,
    pub index: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Top-level crawler configuration as read from YAML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlerConfig {
    /// Source name for single-source mode.
    #[serde(default, alias = "crawler_name")]
    pub webname: Option<String>,
    #[serde(default)]
    pub task: Task,
    #[serde(default)]
    pub article_type: ArticleType,
    /// Category list used when `article_type` is `all`; falls back to the
    /// source's built-in list when empty.
    #[serde(default)]
    pub article_type_dict: Vec<String>,
    /// Newline-delimited URL file for `task: url`.
    #[serde(default)]
    pub urls_fpath: Option<PathBuf>,
    #[serde(default = "default_output_dpath")]
    pub output_dpath: PathBuf,
    #[serde(default = "default_total_pages")]
    pub total_pages: u32,
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    #[serde(default)]
    pub continuous_mode: bool,
    /// Seconds between the start of one cycle's sleep and the next cycle.
    #[serde(default = "default_crawl_interval")]
    pub crawl_interval: u64,
    /// Seconds to wait after a failed cycle.
    #[serde(default = "default_retry_cooldown")]
    pub retry_cooldown: u64,
    #[serde(default)]
    pub max_days_old: Option<u32>,
    #[serde(default = "default_stale_page_threshold")]
    pub stale_page_threshold: u32,
    /// Remember per-URL publish dates between cycles in time-filtered discovery.
    #[serde(default = "default_true")]
    pub cache_publish_dates: bool,
    #[serde(default)]
    pub use_head_check: bool,
    #[serde(default)]
    pub enable_elastic: bool,
    #[serde(default = "default_es_url")]
    pub es_url: String,
    #[serde(default = "default_es_index")]
    pub es_index: String,
    #[serde(default)]
    pub es_username: Option<String>,
    #[serde(default)]
    pub es_password: Option<String>,
    #[serde(default)]
    pub crawlers: Vec<SourceSpec>,
}

fn default_output_dpath() -> PathBuf {
    PathBuf::from("result")
}

fn default_total_pages() -> u32 {
    1
}

fn default_num_workers() -> usize {
    1
}

fn default_crawl_interval() -> u64 {
    10_800
}

fn default_retry_cooldown() -> u64 {
    60
}

fn default_stale_page_threshold() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_es_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_es_index() -> String {
    "news_quansu".to_string()
}

impl CrawlerConfig {
    /// Read, parse and validate a YAML configuration file.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CrawlerConfig::config_error(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_yaml_str(&text)?;
        debug!(?config.webname, sources = config.crawlers.len(), "Loaded configuration");
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: CrawlerConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn config_error(msg: impl Into<String>) -> CrawlError {
        CrawlError::Config(msg.into())
    }

    /// Check value ranges and cross-field requirements.
    pub fn validate(&self) -> Result<()> {
        if self.total_pages == 0 {
            return Err(Self::config_error("total_pages must be at least 1"));
        }
        if self.num_workers == 0 {
            return Err(Self::config_error("num_workers must be at least 1"));
        }
        if self.crawl_interval == 0 {
            return Err(Self::config_error("crawl_interval must be at least 1 second"));
        }
        if self.stale_page_threshold == 0 {
            return Err(Self::config_error("stale_page_threshold must be at least 1"));
        }

        if self.crawlers.is_empty() {
            let name = self.webname.as_deref().ok_or_else(|| {
                Self::config_error("either `webname` (or `crawler_name`) or `crawlers` is required")
            })?;
            scrapers::ensure_known(name)?;
            if self.task == Task::Url && self.urls_fpath.is_none() {
                return Err(Self::config_error("task `url` requires `urls_fpath`"));
            }
        } else {
            if self.task == Task::Url {
                return Err(Self::config_error("task `url` is not supported with `crawlers`"));
            }
            for spec in &self.crawlers {
                scrapers::ensure_known(&spec.name)?;
            }
        }

        if self.enable_elastic && url::Url::parse(&self.es_url).is_err() {
            return Err(Self::config_error(format!("es_url `{}` is not a valid URL", self.es_url)));
        }
        Ok(())
    }

    /// Apply command-line overrides on top of the file values.
    pub fn with_overrides(mut self, cli: &Cli) -> Result<Self> {
        if let Some(interval) = cli.interval {
            self.crawl_interval = interval;
        }
        if cli.continuous {
            self.continuous_mode = true;
        }
        if cli.es_username.is_some() {
            self.es_username = cli.es_username.clone();
        }
        if cli.es_password.is_some() {
            self.es_password = cli.es_password.clone();
        }
        self.validate()?;
        Ok(self)
    }

    /// Whether several sources run side by side.
    pub fn is_multi_source(&self) -> bool {
        !self.crawlers.is_empty()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            interval: Duration::from_secs(self.crawl_interval),
            cooldown: Duration::from_secs(self.retry_cooldown),
        }
    }

    /// Elasticsearch settings, when the sink is enabled.
    pub fn elastic(&self) -> Option<ElasticConfig> {
        self.enable_elastic.then(|| ElasticConfig {
            url: self.es_url.clone(),
            index: self.es_index.clone(),
            username: self.es_username.clone(),
            password: self.es_password.clone(),
        })
    }

    /// Per-source settings derived from this configuration.
    ///
    /// Single-source mode yields one entry rooted at `output_dpath`. In
    /// multi-source mode each source gets its own `output_dpath/<name>` tree.
    pub fn source_settings(&self) -> Vec<SourceSettings> {
        if self.crawlers.is_empty() {
            let name = self.webname.clone().unwrap_or_default();
            return vec![self.settings_for(name, self.article_type.clone(), self.output_dpath.clone())];
        }
        self.crawlers
            .iter()
            .map(|spec| {
                self.settings_for(
                    spec.name.clone(),
                    spec.article_type.clone(),
                    self.output_dpath.join(&spec.name),
                )
            })
            .collect()
    }

    fn settings_for(&self, source: String, article_type: ArticleType, output_dpath: PathBuf) -> SourceSettings {
        SourceSettings {
            source,
            task: self.task,
            article_type,
            article_type_dict: self.article_type_dict.clone(),
            urls_fpath: self.urls_fpath.clone(),
            output_dpath,
            total_pages: self.total_pages,
            num_workers: self.num_workers,
            max_days_old: self.max_days_old,
            stale_page_threshold: self.stale_page_threshold,
            cache_publish_dates: self.cache_publish_dates,
            use_head_check: self.use_head_check,
        }
    }
}

/// Everything one source crawler needs, resolved from [`CrawlerConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    pub source: String,
    pub task: Task,
    pub article_type: ArticleType,
    pub article_type_dict: Vec<String>,
    pub urls_fpath: Option<PathBuf>,
    pub output_dpath: PathBuf,
    pub total_pages: u32,
    pub num_workers: usize,
    pub max_days_old: Option<u32>,
    pub stale_page_threshold: u32,
    pub cache_publish_dates: bool,
    pub use_head_check: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = CrawlerConfig::from_yaml_str("webname: vnexpress\n").unwrap();
        assert_eq!(config.task, Task::Type);
        assert_eq!(config.article_type, ArticleType::All);
        assert_eq!(config.total_pages, 1);
        assert_eq!(config.num_workers, 1);
        assert_eq!(config.crawl_interval, 10_800);
        assert_eq!(config.retry_cooldown, 60);
        assert_eq!(config.stale_page_threshold, 3);
        assert!(config.cache_publish_dates);
        assert!(!config.use_head_check);
        assert!(config.elastic().is_none());
        assert!(!config.is_multi_source());
    }

    #[test]
    fn test_crawler_name_alias() {
        let config = CrawlerConfig::from_yaml_str("crawler_name: dantri\narticle_type: xa-hoi\n").unwrap();
        assert_eq!(config.webname.as_deref(), Some("dantri"));
        assert_eq!(config.article_type, ArticleType::Named("xa-hoi".into()));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = CrawlerConfig::from_yaml_str("webname: vnexpress\nnum_wrkers: 3\n").unwrap_err();
        assert!(matches!(err, CrawlError::Yaml(_)));
    }

    #[test]
    fn test_unknown_source_is_rejected() {
        let err = CrawlerConfig::from_yaml_str("webname: nytimes\n").unwrap_err();
        assert!(matches!(err, CrawlError::UnknownSource { .. }));
    }

    #[test]
    fn test_missing_source_is_rejected() {
        let err = CrawlerConfig::from_yaml_str("total_pages: 3\n").unwrap_err();
        assert!(matches!(err, CrawlError::Config(_)));
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let err = CrawlerConfig::from_yaml_str("webname: qdnd\nnum_workers: 0\n").unwrap_err();
        assert!(matches!(err, CrawlError::Config(_)));
    }

    #[test]
    fn test_url_task_requires_file() {
        let err = CrawlerConfig::from_yaml_str("webname: qdnd\ntask: url\n").unwrap_err();
        assert!(matches!(err, CrawlError::Config(_)));

        let ok = CrawlerConfig::from_yaml_str("webname: qdnd\ntask: url\nurls_fpath: urls.txt\n").unwrap();
        assert_eq!(ok.task, Task::Url);
    }

    #[test]
    fn test_multi_source_settings() {
        let yaml = r#"
output_dpath: out
num_workers: 4
max_days_old: 2
crawlers:
  - { name: vnexpress, article_type: the-gioi }
  - { name: qdnd, article_type: all }
"#;
        let config = CrawlerConfig::from_yaml_str(yaml).unwrap();
        assert!(config.is_multi_source());

        let settings = config.source_settings();
        assert_eq!(settings.len(), 2);
        assert_eq!(settings[0].source, "vnexpress");
        assert_eq!(settings[0].article_type, ArticleType::Named("the-gioi".into()));
        assert_eq!(settings[0].output_dpath, PathBuf::from("out/vnexpress"));
        assert_eq!(settings[1].article_type, ArticleType::All);
        assert_eq!(settings[1].num_workers, 4);
        assert_eq!(settings[1].max_days_old, Some(2));
    }

    #[test]
    fn test_elastic_settings() {
        let yaml = "webname: vietnamnet\nenable_elastic: true\nes_index: news\nes_username: elastic\n";
        let config = CrawlerConfig::from_yaml_str(yaml).unwrap();
        let elastic = config.elastic().unwrap();
        assert_eq!(elastic.url, "http://localhost:9200");
        assert_eq!(elastic.index, "news");
        assert_eq!(elastic.username.as_deref(), Some("elastic"));
        assert_eq!(elastic.password, None);
    }

    #[test]
    fn test_cli_overrides() {
        let config = CrawlerConfig::from_yaml_str("webname: vnexpress\n").unwrap();
        let cli = Cli::parse_from(["news_harvest", "--interval", "120", "--continuous"]);
        let config = config.with_overrides(&cli).unwrap();
        assert!(config.continuous_mode);
        assert_eq!(config.retry_policy().interval, Duration::from_secs(120));
        assert_eq!(config.retry_policy().cooldown, Duration::from_secs(60));
    }

    #[test]
    fn test_cli_zero_interval_is_rejected() {
        let config = CrawlerConfig::from_yaml_str("webname: vnexpress\n").unwrap();
        let cli = Cli::parse_from(["news_harvest", "--interval", "0"]);
        assert!(config.with_overrides(&cli).is_err());
    }
}
