//! On-disk layout for discovered URLs and article artifacts.
//!
//! ```text
//! output_dpath/
//! ├── urls/
//! │   └── the-gioi.txt        # one discovered URL per line
//! └── results/
//!     └── the-gioi/
//!         ├── url_001.txt
//!         └── url_002.txt
//! ```

use crate::error::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

/// The two subdirectories of an output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDirs {
    pub urls: PathBuf,
    pub results: PathBuf,
}

/// Create `urls/` and `results/` under `root`.
#[instrument(level = "debug", skip_all, fields(root = %root.display()))]
pub async fn init_output_dirs(root: &Path) -> Result<OutputDirs> {
    let dirs = OutputDirs {
        urls: root.join("urls"),
        results: root.join("results"),
    };
    fs::create_dir_all(&dirs.urls).await?;
    fs::create_dir_all(&dirs.results).await?;
    Ok(dirs)
}

/// Category name usable as a single path component.
pub fn safe_name(category: &str) -> String {
    category.replace('/', "_")
}

/// Write discovered URLs, one per line.
pub async fn write_url_list(path: &Path, urls: &[String]) -> Result<()> {
    fs::write(path, urls.join("\n")).await?;
    debug!(path = %path.display(), count = urls.len(), "Wrote URL list");
    Ok(())
}

/// Read a newline-delimited URL file, skipping blank lines.
pub async fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).await?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Digits needed to number `count` artifacts.
pub fn index_width(count: usize) -> usize {
    count.max(1).to_string().len()
}

/// Path of the artifact for the zero-based input `index`.
pub fn artifact_path(dir: &Path, index: usize, width: usize) -> PathBuf {
    dir.join(format!("url_{:0width$}.txt", index + 1, width = width))
}

/// Write an artifact as a whole file.
///
/// The text goes to a `.part` sibling first and is renamed into place, so an
/// interrupted write never leaves a truncated artifact behind. A `.part` file
/// may remain after an aborted cycle; [`remove_partial_artifacts`] clears
/// them before the directory is written again.
pub async fn write_artifact(path: &Path, text: &str) -> Result<()> {
    let partial = path.with_extension("txt.part");
    fs::write(&partial, text).await?;
    fs::rename(&partial, path).await?;
    Ok(())
}

/// Delete `.part` leftovers in `dir`. Returns how many were removed.
pub async fn remove_partial_artifacts(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "part") {
            fs::remove_file(&path).await?;
            removed += 1;
        }
    }
    if removed > 0 {
        debug!(dir = %dir.display(), removed, "Removed partial artifacts");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_output_dirs() {
        let tmp = TempDir::new().unwrap();
        let dirs = init_output_dirs(tmp.path()).await.unwrap();
        assert!(dirs.urls.is_dir());
        assert!(dirs.results.is_dir());
        assert_eq!(dirs.urls, tmp.path().join("urls"));
    }

    #[test]
    fn test_safe_name() {
        assert_eq!(safe_name("the-gioi/quan-su"), "the-gioi_quan-su");
        assert_eq!(safe_name("thoi-su"), "thoi-su");
    }

    #[test]
    fn test_artifact_numbering() {
        assert_eq!(index_width(0), 1);
        assert_eq!(index_width(9), 1);
        assert_eq!(index_width(10), 2);
        assert_eq!(index_width(250), 3);

        let dir = Path::new("/out");
        assert_eq!(artifact_path(dir, 0, 3), PathBuf::from("/out/url_001.txt"));
        assert_eq!(artifact_path(dir, 41, 2), PathBuf::from("/out/url_42.txt"));
    }

    #[tokio::test]
    async fn test_url_list_round_trip_skips_blank_lines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("urls.txt");
        write_url_list(&path, &["https://a".to_string(), "https://b".to_string()])
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "https://a\nhttps://b");

        std::fs::write(&path, "https://a\n\n  https://c  \n").unwrap();
        let urls = read_url_list(&path).await.unwrap();
        assert_eq!(urls, vec!["https://a".to_string(), "https://c".to_string()]);
    }

    #[tokio::test]
    async fn test_write_artifact_leaves_no_partial_file() {
        let tmp = TempDir::new().unwrap();
        let path = artifact_path(tmp.path(), 0, 2);
        write_artifact(&path, "Title\nNgày: N/A\n\n").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Title\nNgày: N/A\n\n");
        let names: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["url_01.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_partial_artifacts_keeps_finished_ones() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("url_1.txt"), "done").unwrap();
        std::fs::write(tmp.path().join("url_2.txt.part"), "half").unwrap();

        assert_eq!(remove_partial_artifacts(tmp.path()).await.unwrap(), 1);
        assert!(tmp.path().join("url_1.txt").is_file());
        assert!(!tmp.path().join("url_2.txt.part").exists());
    }
}
