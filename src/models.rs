//! Data models shared across the crawl pipeline.
//!
//! - [`CrawlTarget`]: what to discover for one category of one source
//! - [`ArticleFields`]: fields a source adapter extracts from an article page
//! - [`ParsedArticle`]: an artifact file read back into structured fields
//! - [`FetchOutcome`]: what happened to one URL in the fetch phase
//! - [`CycleStats`] / [`SourceStats`]: failure counts reported after a cycle
//!
//! # Artifact layout
//!
//! Each fetched article is stored as one UTF-8 text file:
//!
//! ```text
//! <title>
//! Ngày: <date text>
//!
//! <description lines>
//! <body paragraph lines>
//! ```
//!
//! The index sink relies on these line positions, so [`ArticleFields::to_artifact`]
//! and [`parse_artifact`] must stay in step.

use crate::recency;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Label written in front of the date on the second artifact line.
pub const DATE_LABEL: &str = "Ngày";

/// Placeholder for an article whose date could not be extracted.
pub const UNKNOWN_DATE: &str = "N/A";

/// One category of one source to discover, fixed for the length of a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub source: String,
    pub category: String,
    pub total_pages: u32,
    pub max_days_old: Option<u32>,
}

/// Fields extracted from an article page by a source adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFields {
    pub title: String,
    /// Raw date text as shown by the site, if any.
    pub date: Option<String>,
    pub description: Vec<String>,
    pub paragraphs: Vec<String>,
}

impl ArticleFields {
    /// Whether the adapter found an actual article (a non-blank title).
    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }

    /// Render the artifact text block.
    pub fn to_artifact(&self) -> String {
        let date = self
            .date
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(UNKNOWN_DATE);

        let mut out = format!("{}\n{}: {}\n\n", single_line(&self.title), DATE_LABEL, date);
        for line in self.description.iter().chain(self.paragraphs.iter()) {
            let line = single_line(line);
            if line.is_empty() {
                continue;
            }
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

/// Collapse embedded newlines so one unit always occupies one artifact line.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// An artifact parsed back into the fields the index stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArticle {
    pub title: String,
    /// Date text with the label stripped; empty when the line had no label.
    pub publish_date_str: String,
    /// `YYYY-MM-DD` when the date text contains a `D/M/YYYY` pattern.
    pub publish_date: Option<String>,
    pub body: String,
}

/// Parse artifact text using the line-position rules.
///
/// Returns `None` for blank input.
pub fn parse_artifact(content: &str) -> Option<ParsedArticle> {
    let content = content.trim();
    if content.is_empty() {
        return None;
    }
    let lines: Vec<&str> = content.split('\n').collect();
    let title = lines[0].trim().to_string();

    let label = format!("{DATE_LABEL}:");
    let (publish_date_str, publish_date) = match lines.get(1) {
        Some(line) if line.contains(&label) => {
            let text = line.replace(&label, "").trim().to_string();
            let normalized = recency::normalize_dmy(&text);
            (text, normalized)
        }
        _ => (String::new(), None),
    };

    let body = if lines.len() > 2 {
        lines[2..].join("\n").trim().to_string()
    } else {
        String::new()
    };

    Some(ParsedArticle {
        title,
        publish_date_str,
        publish_date,
        body,
    })
}

/// Result of one fetch unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Artifact written to this path.
    Written(PathBuf),
    /// Already crawled in this process, or unchanged since the last fetch.
    Skipped,
    /// The adapter produced no article or the write failed. Holds the URL.
    Failed(String),
}

impl FetchOutcome {
    pub fn failed_url(&self) -> Option<&str> {
        match self {
            FetchOutcome::Failed(url) => Some(url),
            _ => None,
        }
    }
}

/// Per-source counters for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub source: String,
    pub failed_by_category: BTreeMap<String, usize>,
    pub written: usize,
    pub skipped: usize,
    /// Set when the source's whole cycle failed.
    pub error: Option<String>,
}

impl SourceStats {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn failed_total(&self) -> usize {
        self.failed_by_category.values().sum()
    }

    /// Fold one category's outcomes into the counters.
    pub fn record(&mut self, category: &str, outcomes: &[FetchOutcome]) {
        let failed = self.failed_by_category.entry(category.to_string()).or_insert(0);
        for outcome in outcomes {
            match outcome {
                FetchOutcome::Written(_) => self.written += 1,
                FetchOutcome::Skipped => self.skipped += 1,
                FetchOutcome::Failed(_) => *failed += 1,
            }
        }
    }
}

/// Aggregate statistics for one cycle across all sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub sources: Vec<SourceStats>,
}

impl CycleStats {
    pub fn failed_total(&self) -> usize {
        self.sources.iter().map(SourceStats::failed_total).sum()
    }

    pub fn written_total(&self) -> usize {
        self.sources.iter().map(|s| s.written).sum()
    }
}
