//! Manifest store: the durable work queue of the downloader.
//!
//! The manifest is a JSON array of [`AssetDescriptor`] records written by the
//! media crawl. The downloader loads it once per run and rewrites it in full
//! whenever it records a permanent failure, so a crash right after a rewrite
//! leaves every failure recorded up to that point.
//!
//! # Example
//!
//! ```no_run
//! use fandom_core::manifest;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let path = Path::new("fandom-data/rezero/all_media_urls.json");
//! let mut entries = manifest::load(path).await?;
//! entries[0].mark_not_found();
//! manifest::save(path, &entries).await?;
//! # Ok(())
//! # }
//! ```

mod descriptor;
mod error;

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

pub use descriptor::{AssetDescriptor, NOT_FOUND_MARKER};
pub use error::ManifestError;

/// Loads the manifest at `path`.
///
/// # Errors
///
/// - [`ManifestError::Missing`] if the file does not exist
/// - [`ManifestError::Empty`] if the document is not an array or has no entries
/// - [`ManifestError::Parse`] if the JSON or an entry is malformed
/// - [`ManifestError::Io`] if the file cannot be read
#[instrument(fields(path = %path.display()))]
pub async fn load(path: &Path) -> Result<Vec<AssetDescriptor>, ManifestError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ManifestError::Missing {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(ManifestError::io(path, e)),
    };

    let document: Value =
        serde_json::from_slice(&raw).map_err(|e| ManifestError::parse(path, e))?;
    let entries = match document {
        Value::Array(entries) if !entries.is_empty() => entries,
        _ => {
            return Err(ManifestError::Empty {
                path: path.to_path_buf(),
            });
        }
    };

    let descriptors: Vec<AssetDescriptor> = serde_json::from_value(Value::Array(entries))
        .map_err(|e| ManifestError::parse(path, e))?;
    debug!(entries = descriptors.len(), "manifest loaded");
    Ok(descriptors)
}

/// Rewrites the whole manifest at `path`.
///
/// # Errors
///
/// Returns [`ManifestError::Io`] if the file cannot be written.
#[instrument(skip(entries), fields(path = %path.display(), entries = entries.len()))]
pub async fn save(path: &Path, entries: &[AssetDescriptor]) -> Result<(), ManifestError> {
    write_json(path, entries).await
}

/// Writes `value` as 2-space pretty JSON, replacing `path` via a sibling temp file.
///
/// # Errors
///
/// Returns [`ManifestError::Io`] on write or rename failure and
/// [`ManifestError::Parse`] if `value` cannot be serialized.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ManifestError> {
    let body = serde_json::to_vec_pretty(value).map_err(|e| ManifestError::parse(path, e))?;
    let temp_path = temp_sibling(path);
    tokio::fs::write(&temp_path, &body)
        .await
        .map_err(|e| ManifestError::io(&temp_path, e))?;
    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| ManifestError::io(path, e))?;
    debug!(bytes = body.len(), "json written");
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_missing_file_returns_missing() {
        let temp_dir = TempDir::new().unwrap();
        let result = load(&temp_dir.path().join("all_media_urls.json")).await;
        assert!(matches!(result, Err(ManifestError::Missing { .. })));
    }

    #[tokio::test]
    async fn test_load_empty_array_returns_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("m.json");
        std::fs::write(&path, "[]").unwrap();
        assert!(matches!(load(&path).await, Err(ManifestError::Empty { .. })));
    }

    #[tokio::test]
    async fn test_load_non_array_returns_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("m.json");
        std::fs::write(&path, r#"{"url":"https://x/a"}"#).unwrap();
        assert!(matches!(load(&path).await, Err(ManifestError::Empty { .. })));
    }

    #[tokio::test]
    async fn test_load_invalid_json_returns_parse() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("m.json");
        std::fs::write(&path, "[{").unwrap();
        assert!(matches!(load(&path).await, Err(ManifestError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_save_then_load_preserves_order_and_marker() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("m.json");
        let mut entries = vec![
            AssetDescriptor::new("https://x/a", "a.png"),
            AssetDescriptor::new("https://x/b", "b.png"),
        ];
        entries[1].mark_not_found();

        save(&path, &entries).await.unwrap();
        let loaded = load(&path).await.unwrap();

        assert_eq!(loaded, entries);
        assert!(!temp_sibling(&path).exists(), "temp file should be renamed away");
    }

    #[tokio::test]
    async fn test_rewrite_after_marking_keeps_crawler_key_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("m.json");
        std::fs::write(
            &path,
            r#"[{"name":"a.png","size":3,"url":"https://x/a","sha1":"ff","mime":"image/png","title":"File:A.png"}]"#,
        )
        .unwrap();

        let mut entries = load(&path).await.unwrap();
        entries[0].mark_not_found();
        save(&path, &entries).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let rewritten: Value = serde_json::from_str(&text).unwrap();
        let keys: Vec<&str> = rewritten[0]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(
            keys,
            ["name", "size", "url", "sha1", "mime", "title", "failure"]
        );
    }

    #[tokio::test]
    async fn test_load_accepts_hand_edited_failure_markers() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("m.json");
        std::fs::write(
            &path,
            r#"[
                {"url":"https://x/a","name":"a.png","failure":"gone"},
                {"url":"https://x/b","name":"b.png","failure":70000},
                {"url":"https://x/c","name":"c.png","failure":null},
                {"url":"https://x/d","name":12}
            ]"#,
        )
        .unwrap();

        let entries = load(&path).await.unwrap();

        let failed: Vec<bool> = entries.iter().map(AssetDescriptor::is_failed).collect();
        assert_eq!(failed, [true, true, false, false]);
        assert_eq!(entries[3].file_name().as_deref(), Some("12"));
    }

    #[tokio::test]
    async fn test_load_non_object_entry_returns_parse() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("m.json");
        std::fs::write(&path, r#"[{"url":"https://x/a"}, "b.png"]"#).unwrap();
        assert!(matches!(load(&path).await, Err(ManifestError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_save_writes_two_space_indentation() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("m.json");
        save(&path, &[AssetDescriptor::new("https://x/a", "a.png")])
            .await
            .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n  {\n    \"url\""), "unexpected layout: {text}");
    }
}
