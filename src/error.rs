//! Error taxonomy for the crawler.
//!
//! Per-URL and per-page failures never surface as a [`CrawlError`] to the
//! cycle controller: they are logged and folded into the cycle statistics at
//! the component boundary. What does surface here is either a configuration
//! problem (reported at startup) or a cycle-level failure (caught by the
//! continuous loop and followed by a cooldown).

use thiserror::Error;

/// Errors produced by the crawl pipeline.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unknown source `{name}` (available: {available})")]
    UnknownSource { name: String, available: String },

    #[error("index sink error: {0}")]
    Sink(String),

    #[error("crawl task for `{source_name}` panicked: {message}")]
    TaskPanicked { source_name: String, message: String },
}

impl CrawlError {
    /// Process exit code used when this error ends a single run.
    ///
    /// Configuration problems exit with `2`, everything else with `1`.
    pub fn exit_code(&self) -> u8 {
        match self {
            CrawlError::Config(_) | CrawlError::UnknownSource { .. } | CrawlError::Yaml(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_exit_with_two() {
        assert_eq!(CrawlError::Config("bad".into()).exit_code(), 2);
        let unknown = CrawlError::UnknownSource {
            name: "nope".into(),
            available: "vnexpress".into(),
        };
        assert_eq!(unknown.exit_code(), 2);
    }

    #[test]
    fn test_runtime_errors_exit_with_one() {
        let io = CrawlError::Io(std::io::Error::other("disk full"));
        assert_eq!(io.exit_code(), 1);
        assert_eq!(CrawlError::Sink("down".into()).exit_code(), 1);
    }

    #[test]
    fn test_unknown_source_message_lists_available() {
        let err = CrawlError::UnknownSource {
            name: "foo".into(),
            available: "dantri, qdnd".into(),
        };
        assert_eq!(err.to_string(), "unknown source `foo` (available: dantri, qdnd)");
    }
}
