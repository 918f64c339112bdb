//! Transfer engine: streams one asset to disk and promotes it atomically.
//!
//! The body is written to a `.part` sibling of the destination and renamed
//! onto the final name only after the stream completes, so the destination
//! path never holds a partial file.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::destination::partial_path;
use super::error::DownloadError;
use crate::config::FetchConfig;
use crate::user_agent;

/// A single-asset transfer.
///
/// The orchestrator and backoff controller depend on this trait rather than
/// on [`HttpTransfer`] so alternative transports can be plugged in.
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Downloads `url` to `destination`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// [`DownloadError::NotFound`] when the remote reports the asset missing;
    /// any other variant for failures that may succeed on retry.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, DownloadError>;
}

/// HTTP(S) transfer backed by a pooled reqwest client.
///
/// Create once and reuse across the whole run.
#[derive(Debug, Clone)]
pub struct HttpTransfer {
    client: Client,
}

impl HttpTransfer {
    /// Builds a client with the timeouts from `config`.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if TLS or proxy setup fails.
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        Self::with_timeouts(config.connect_timeout, config.request_timeout)
    }

    /// Builds a client with explicit timeouts.
    ///
    /// `read_timeout` bounds each read, not the whole transfer.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if TLS or proxy setup fails.
    pub fn with_timeouts(
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transfer for HttpTransfer {
    #[instrument(skip(self), fields(url = %url, destination = %destination.display()))]
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DownloadError::not_found(url));
        }
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let partial = partial_path(destination);
        // create() truncates whatever an earlier attempt left behind
        let mut file = File::create(&partial)
            .await
            .map_err(|e| DownloadError::io(&partial, e))?;

        let streamed = stream_to_file(&mut file, response, url, &partial).await;
        drop(file);
        let bytes_written = match streamed {
            Ok(bytes) => bytes,
            Err(error) => {
                debug!(path = %partial.display(), "removing partial file after error");
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(error);
            }
        };

        tokio::fs::rename(&partial, destination)
            .await
            .map_err(|e| DownloadError::io(destination, e))?;

        debug!(bytes = bytes_written, "transfer complete");
        Ok(bytes_written)
    }
}

/// Streams the response body into `file`, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;
    writer
        .get_ref()
        .sync_all()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}
