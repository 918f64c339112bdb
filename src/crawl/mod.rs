//! MediaWiki listing crawls that produce the page index and the media manifest.
//!
//! Both crawls page through `action=query` list endpoints with
//! [`Paginator`], following the API's continuation cursor until it is absent.
//!
//! - [`crawl_pages`] lists every namespace-0 article (`list=allpages`)
//! - [`crawl_media`] lists every file (`list=allimages`), writing each page of
//!   results to a numbered chunk before assembling the manifest

mod chunks;
mod media;
mod pages;
mod paginator;

use std::path::PathBuf;

use reqwest::Client;
use thiserror::Error;

use crate::config::{ConfigError, CrawlConfig};
use crate::manifest::ManifestError;
use crate::user_agent;

pub use chunks::{ChunkLog, chunk_file_name};
pub use media::{MediaCrawlOutcome, crawl_media, media_query};
pub use pages::{PageRecord, crawl_pages, page_query};
pub use paginator::{ApiQuery, Continuation, Page, Paginator};

/// Errors raised while listing a wiki.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The request could not be sent or the response body not read.
    #[error("API request to {url} failed: {source}")]
    Http {
        /// The request URL.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success status.
    #[error("API request to {url} returned HTTP {status}")]
    Status {
        /// The request URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response was JSON but not the expected listing.
    #[error("unexpected API response from {url}: {reason}")]
    Payload {
        /// The request URL.
        url: String,
        /// What was wrong with the payload.
        reason: String,
    },

    /// The endpoint is not a valid URL.
    #[error("invalid API endpoint: {endpoint}")]
    InvalidEndpoint {
        /// The endpoint string.
        endpoint: String,
    },

    /// Reading or writing crawl output failed.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A chunk file could not be decoded.
    #[error("cannot parse chunk {path}: {source}")]
    Chunk {
        /// The chunk file.
        path: PathBuf,
        /// The JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Writing a JSON output file failed.
    #[error(transparent)]
    Output(#[from] ManifestError),

    /// The crawl configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error("cannot build API client: {0}")]
    Client(#[source] reqwest::Error),
}

impl CrawlError {
    /// Creates an HTTP error.
    pub fn http(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Http {
            url: url.into(),
            source,
        }
    }

    /// Creates a payload error.
    pub fn payload(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Payload {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Builds the HTTP client used for API listing requests.
///
/// # Errors
///
/// [`CrawlError::Client`] if TLS or proxy setup fails.
pub fn build_api_client(config: &CrawlConfig) -> Result<Client, CrawlError> {
    Client::builder()
        .timeout(config.api_timeout)
        .gzip(true)
        .user_agent(user_agent::default_user_agent())
        .build()
        .map_err(CrawlError::Client)
}

/// Public article URL for `title` on `wiki`.
///
/// Spaces become underscores; `:`, `/` and existing `%` escapes are kept as-is.
#[must_use]
pub fn wiki_page_url(wiki: &str, title: &str) -> String {
    let slug = title.replace(' ', "_");
    // every '%' in the encoded form starts an escape, so these replacements cannot overlap
    let encoded = urlencoding::encode(&slug)
        .replace("%3A", ":")
        .replace("%2F", "/")
        .replace("%25", "%");
    format!("https://{wiki}.fandom.com/wiki/{encoded}")
}
