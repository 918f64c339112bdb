//! Numbered chunk files written while the media crawl is in progress.
//!
//! Each listing page is stored as `chunk-NNNNN.json` as soon as it arrives.
//! A finished crawl concatenates the chunks (in file name order) into the
//! manifest and removes the directory; an interrupted one leaves them behind.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::CrawlError;
use crate::manifest::{self, AssetDescriptor};

/// File name of chunk number `index`.
#[must_use]
pub fn chunk_file_name(index: usize) -> String {
    format!("chunk-{index:05}.json")
}

/// Append-only log of listing pages on disk.
#[derive(Debug)]
pub struct ChunkLog {
    dir: PathBuf,
    chunks: usize,
    entries: usize,
}

impl ChunkLog {
    /// Starts a fresh log in `dir`, discarding chunks from any earlier crawl.
    ///
    /// # Errors
    ///
    /// [`CrawlError::Io`] when the directory cannot be cleared or created.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self, CrawlError> {
        let dir = dir.into();
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(dir = %dir.display(), "discarded chunks from an earlier crawl"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(CrawlError::io(&dir, e)),
        }
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CrawlError::io(&dir, e))?;
        Ok(Self {
            dir,
            chunks: 0,
            entries: 0,
        })
    }

    /// The chunk directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Chunks written so far.
    #[must_use]
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Records written so far, across all chunks.
    #[must_use]
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Writes `records` as the next chunk and returns its path.
    ///
    /// # Errors
    ///
    /// [`CrawlError::Output`] when the chunk cannot be written.
    pub async fn append(&mut self, records: &[AssetDescriptor]) -> Result<PathBuf, CrawlError> {
        let path = self.dir.join(chunk_file_name(self.chunks));
        manifest::write_json(&path, records).await?;
        self.chunks += 1;
        self.entries += records.len();
        Ok(path)
    }

    /// Reads every chunk back, in order.
    ///
    /// # Errors
    ///
    /// [`CrawlError::Io`] for read failures, [`CrawlError::Chunk`] for bad JSON.
    pub async fn assemble(&self) -> Result<Vec<AssetDescriptor>, CrawlError> {
        let mut paths = Vec::new();
        let mut listing = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| CrawlError::io(&self.dir, e))?;
        while let Some(entry) = listing
            .next_entry()
            .await
            .map_err(|e| CrawlError::io(&self.dir, e))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("chunk-") && name.ends_with(".json") {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(self.entries);
        for path in paths {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| CrawlError::io(&path, e))?;
            let chunk: Vec<AssetDescriptor> = serde_json::from_str(&raw)
                .map_err(|source| CrawlError::Chunk { path, source })?;
            records.extend(chunk);
        }
        Ok(records)
    }

    /// Deletes the chunk directory.
    ///
    /// # Errors
    ///
    /// [`CrawlError::Io`] when removal fails.
    pub async fn remove(self) -> Result<(), CrawlError> {
        tokio::fs::remove_dir_all(&self.dir)
            .await
            .map_err(|e| CrawlError::io(&self.dir, e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use tempfile::TempDir;

    #[test]
    fn test_chunk_file_name_is_zero_padded() {
        assert_eq!(chunk_file_name(0), "chunk-00000.json");
        assert_eq!(chunk_file_name(123), "chunk-00123.json");
    }

    #[tokio::test]
    async fn test_append_and_assemble_preserve_order() {
        let temp_dir = TempDir::new().unwrap();
        let mut log = ChunkLog::create(temp_dir.path().join(".media-chunks"))
            .await
            .unwrap();

        log.append(&[
            AssetDescriptor::new("https://x/a", "a.png"),
            AssetDescriptor::new("https://x/b", "b.png"),
        ])
        .await
        .unwrap();
        let second = log
            .append(&[AssetDescriptor::new("https://x/c", "c.png")])
            .await
            .unwrap();

        assert!(second.ends_with("chunk-00001.json"));
        assert_eq!(log.chunks(), 2);
        assert_eq!(log.entries(), 3);

        let records = log.assemble().await.unwrap();
        let names: Vec<String> = records
            .iter()
            .filter_map(|record| record.file_name().map(Cow::into_owned))
            .collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
    }

    #[tokio::test]
    async fn test_create_discards_stale_chunks() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(".media-chunks");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("chunk-00000.json"), "[]").unwrap();

        let log = ChunkLog::create(&dir).await.unwrap();
        assert!(log.assemble().await.unwrap().is_empty());
        assert!(!dir.join("chunk-00000.json").exists());
    }

    #[tokio::test]
    async fn test_remove_deletes_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(".media-chunks");
        let mut log = ChunkLog::create(&dir).await.unwrap();
        log.append(&[AssetDescriptor::new("https://x/a", "a.png")])
            .await
            .unwrap();
        log.remove().await.unwrap();
        assert!(!dir.exists());
    }
}
