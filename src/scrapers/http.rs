//! Shared HTTP plumbing for the source adapters.

use crate::error::Result;
use rand::{Rng, rng};
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Timeout for category listing pages.
pub const LISTING_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for article pages.
pub const ARTICLE_TIMEOUT: Duration = Duration::from_secs(20);
/// Timeout for HEAD freshness checks.
pub const HEAD_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_USER_AGENT: &str = concat!("news_harvest/", env!("CARGO_PKG_VERSION"));

const BROWSER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

/// Build the client shared by every adapter of a process.
pub fn build_client() -> Result<Client> {
    let client = Client::builder()
        .user_agent(DEFAULT_USER_AGENT)
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    Ok(client)
}

/// Headers that look like a regular browser, with a randomly chosen agent.
pub fn browser_headers() -> HeaderMap {
    let agent = BROWSER_AGENTS[rng().random_range(0..BROWSER_AGENTS.len())];
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(agent));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("vi-VN,vi;q=0.9,en;q=0.8"));
    headers
}

/// Sleep for a random duration in `[min, max]`.
pub async fn polite_delay(min: Duration, max: Duration) {
    let min_ms = min.as_millis() as u64;
    let max_ms = max.as_millis().max(min.as_millis()) as u64;
    let delay = Duration::from_millis(rng().random_range(min_ms..=max_ms));
    debug!(?delay, "Politeness delay");
    sleep(delay).await;
}

/// GET `url` and return the body, failing on non-2xx statuses.
pub async fn get_text(client: &Client, url: &str, timeout: Duration, headers: Option<HeaderMap>) -> Result<String> {
    let mut request = client.get(url).timeout(timeout);
    if let Some(headers) = headers {
        request = request.headers(headers);
    }
    let body = request.send().await?.error_for_status()?.text().await?;
    Ok(body)
}
