//! Small helpers shared by the output and logging paths.

use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut after `max` characters with an ellipsis and a count
/// of the dropped bytes appended. The cut always falls on a character
/// boundary, so Vietnamese response bodies are safe to pass in.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path).await?;
    let probe = path.join("..__probe_write__");
    fs::write(&probe, b"").await?;
    let _ = fs::remove_file(&probe).await;
    info!("Output directory is writable");
    Ok(())
}
