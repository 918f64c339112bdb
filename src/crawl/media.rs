//! `all-media`: lists every uploaded file and builds the download manifest.

use std::path::{Path, PathBuf};

use reqwest::Client;
use tracing::{info, instrument, warn};

use super::chunks::ChunkLog;
use super::paginator::{ApiQuery, Paginator};
use super::{CrawlError, wiki_page_url};
use crate::config::CrawlConfig;
use crate::manifest::{self, AssetDescriptor};

/// File properties requested for every image.
const IMAGE_PROPERTIES: &str = "url|mime|size|sha1|timestamp|user|comment";

/// How a media crawl ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaCrawlOutcome {
    /// The listing was exhausted (or the cap reached) and the manifest written.
    Completed {
        /// The manifest path.
        manifest: PathBuf,
        /// Entries written.
        entries: usize,
    },
    /// The API returned an empty page with a cursor; chunks were kept.
    Interrupted {
        /// Entries collected before stopping.
        entries: usize,
        /// Where the chunks were left.
        chunk_dir: PathBuf,
    },
}

/// The `allimages` query at `endpoint`.
#[must_use]
pub fn media_query(endpoint: impl Into<String>) -> ApiQuery {
    ApiQuery::new(endpoint, "allimages")
        .param("aiprop", IMAGE_PROPERTIES)
        .param("ailimit", "max")
}

/// Lists the files of `wiki` into `manifest_path`, staging pages in `chunk_dir`.
///
/// Any chunks left in `chunk_dir` by an earlier crawl are discarded first.
/// With a [`CrawlConfig::limit`] the crawl stops once that many records are
/// collected.
///
/// # Errors
///
/// Any [`CrawlError`] from the listing or from writing chunks and the
/// manifest. Chunks written before the error stay on disk.
#[instrument(skip(client, config, manifest_path, chunk_dir), fields(manifest = %manifest_path.display()))]
pub async fn crawl_media(
    client: &Client,
    config: &CrawlConfig,
    wiki: &str,
    manifest_path: &Path,
    chunk_dir: &Path,
) -> Result<MediaCrawlOutcome, CrawlError> {
    config.validate()?;
    let mut log = ChunkLog::create(chunk_dir).await?;
    let mut paginator: Paginator<AssetDescriptor> = Paginator::new(
        client.clone(),
        media_query(config.api_endpoint(wiki)),
        config.media_delay_range_ms(),
    );

    let completed = loop {
        let Some(page) = paginator.next_page().await? else {
            break true;
        };
        let mut records = page.records;
        if let Some(limit) = config.limit {
            records.truncate(limit.saturating_sub(log.entries()));
        }
        if records.is_empty() {
            break !page.has_more;
        }

        for record in &mut records {
            fill_description_url(record, wiki);
        }
        log.append(&records).await?;
        if log.chunks() % config.chunk_log_interval == 0 {
            info!(
                chunks = log.chunks(),
                entries = log.entries(),
                "media chunks written"
            );
        }

        if config.limit.is_some_and(|limit| log.entries() >= limit) || !page.has_more {
            break true;
        }
    };

    if !completed {
        warn!(
            entries = log.entries(),
            chunk_dir = %log.dir().display(),
            "media listing stopped early; partial chunks left for inspection"
        );
        return Ok(MediaCrawlOutcome::Interrupted {
            entries: log.entries(),
            chunk_dir: log.dir().to_path_buf(),
        });
    }

    let media = log.assemble().await?;
    if let Some(parent) = manifest_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CrawlError::io(parent, e))?;
    }
    manifest::write_json(manifest_path, &media).await?;
    log.remove().await?;

    info!(entries = media.len(), "media manifest written");
    Ok(MediaCrawlOutcome::Completed {
        manifest: manifest_path.to_path_buf(),
        entries: media.len(),
    })
}

fn fill_description_url(record: &mut AssetDescriptor, wiki: &str) {
    if record.get("descriptionurl").is_some() {
        return;
    }
    let Some(url) = record.title().map(|title| wiki_page_url(wiki, &title)) else {
        return;
    };
    record.set("descriptionurl", url);
}
