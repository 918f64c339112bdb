//! Run configuration for the downloader and the metadata crawlers.
//!
//! Every tunable the tool uses lives here with its default, so a run is fully
//! described by a [`FetchConfig`] (downloads) and a [`CrawlConfig`] (API listing).

use std::ops::RangeInclusive;
use std::time::Duration;

use thiserror::Error;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default per-read timeout for asset downloads (2 minutes).
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Default lower bound of the random delay between downloads.
pub const DOWNLOAD_DELAY_MIN: Duration = Duration::from_secs(1);

/// Default upper bound of the random delay between downloads.
pub const DOWNLOAD_DELAY_MAX: Duration = Duration::from_secs(20);

/// Number of successful downloads between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 50;

/// First delay applied after a transient failure.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(5);

/// Backoff ceiling (2 hours). Reaching it aborts the run.
pub const MAX_BACKOFF: Duration = Duration::from_secs(2 * 60 * 60);

/// Free-space floor on the media filesystem (10 GiB).
pub const MIN_FREE_BYTES: u64 = 10 * 1024 * 1024 * 1024;

/// Per-entry estimate used for the naive ETA.
pub const ETA_PER_ENTRY: Duration = Duration::from_secs(11);

/// Default timeout for metadata API requests.
pub const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between paged `allpages` requests.
pub const PAGE_REQUEST_DELAY: Duration = Duration::from_millis(200);

/// Default lower bound of the random delay between `allimages` pages.
pub const MEDIA_DELAY_MIN: Duration = Duration::from_secs(1);

/// Default upper bound of the random delay between `allimages` pages.
pub const MEDIA_DELAY_MAX: Duration = Duration::from_secs(10);

/// Number of chunks written between media crawl progress logs.
pub const CHUNK_LOG_INTERVAL: usize = 10;

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A delay range whose lower bound exceeds its upper bound.
    #[error("invalid {field} range: minimum {min:?} exceeds maximum {max:?}")]
    InvertedRange {
        /// Name of the offending setting.
        field: &'static str,
        /// Configured lower bound.
        min: Duration,
        /// Configured upper bound.
        max: Duration,
    },

    /// A value that must be strictly positive was zero.
    #[error("invalid {field}: must be greater than zero")]
    Zero {
        /// Name of the offending setting.
        field: &'static str,
    },
}

/// Settings for a `download-media` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// TCP connect timeout for asset requests.
    pub connect_timeout: Duration,
    /// Longest wait for any single read, headers or body; a slow but
    /// steady transfer may take longer overall.
    pub request_timeout: Duration,
    /// Lower bound of the polite delay between downloads.
    pub download_delay_min: Duration,
    /// Upper bound of the polite delay between downloads.
    pub download_delay_max: Duration,
    /// Successful downloads between progress reports.
    pub progress_interval: usize,
    /// First backoff delay after a transient failure.
    pub initial_backoff: Duration,
    /// Backoff ceiling; a delay at or above it aborts the run.
    pub max_backoff: Duration,
    /// Minimum free bytes on the media filesystem.
    pub min_free_bytes: u64,
    /// Per-entry estimate for the ETA in progress reports.
    pub eta_per_entry: Duration,
    /// Optional cap on how many manifest entries a run considers.
    pub limit: Option<usize>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            request_timeout: REQUEST_TIMEOUT,
            download_delay_min: DOWNLOAD_DELAY_MIN,
            download_delay_max: DOWNLOAD_DELAY_MAX,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            initial_backoff: INITIAL_BACKOFF,
            max_backoff: MAX_BACKOFF,
            min_free_bytes: MIN_FREE_BYTES,
            eta_per_entry: ETA_PER_ENTRY,
            limit: None,
        }
    }
}

impl FetchConfig {
    /// Checks that ranges are ordered and counters are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "download delay",
            self.download_delay_min,
            self.download_delay_max,
        )?;
        check_range("backoff", self.initial_backoff, self.max_backoff)?;
        if self.progress_interval == 0 {
            return Err(ConfigError::Zero {
                field: "progress interval",
            });
        }
        if self.initial_backoff.is_zero() {
            return Err(ConfigError::Zero {
                field: "initial backoff",
            });
        }
        if self.limit == Some(0) {
            return Err(ConfigError::Zero { field: "limit" });
        }
        Ok(())
    }

    /// The polite delay range in milliseconds.
    #[must_use]
    pub fn download_delay_range_ms(&self) -> RangeInclusive<u64> {
        duration_ms(self.download_delay_min)..=duration_ms(self.download_delay_max)
    }
}

/// Settings for the `all-pages` and `all-media` crawls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlConfig {
    /// Base URL override for the MediaWiki API (tests, mirrors).
    ///
    /// When `None` the wiki's `https://{wiki}.fandom.com/api.php` is used.
    pub api_base: Option<String>,
    /// Timeout for each API request.
    pub api_timeout: Duration,
    /// Fixed delay between `allpages` requests.
    pub page_delay: Duration,
    /// Lower bound of the random delay between `allimages` requests.
    pub media_delay_min: Duration,
    /// Upper bound of the random delay between `allimages` requests.
    pub media_delay_max: Duration,
    /// Chunks between media crawl progress logs.
    pub chunk_log_interval: usize,
    /// Optional cap on how many media records the crawl collects.
    pub limit: Option<usize>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            api_timeout: API_TIMEOUT,
            page_delay: PAGE_REQUEST_DELAY,
            media_delay_min: MEDIA_DELAY_MIN,
            media_delay_max: MEDIA_DELAY_MAX,
            chunk_log_interval: CHUNK_LOG_INTERVAL,
            limit: None,
        }
    }
}

impl CrawlConfig {
    /// Checks that the media delay range is ordered and counters are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("media delay", self.media_delay_min, self.media_delay_max)?;
        if self.chunk_log_interval == 0 {
            return Err(ConfigError::Zero {
                field: "chunk log interval",
            });
        }
        if self.limit == Some(0) {
            return Err(ConfigError::Zero { field: "limit" });
        }
        Ok(())
    }

    /// API endpoint for `wiki`, honoring [`CrawlConfig::api_base`].
    #[must_use]
    pub fn api_endpoint(&self, wiki: &str) -> String {
        self.api_base
            .clone()
            .unwrap_or_else(|| format!("https://{wiki}.fandom.com/api.php"))
    }

    /// The media page delay range in milliseconds.
    #[must_use]
    pub fn media_delay_range_ms(&self) -> RangeInclusive<u64> {
        duration_ms(self.media_delay_min)..=duration_ms(self.media_delay_max)
    }
}

fn check_range(field: &'static str, min: Duration, max: Duration) -> Result<(), ConfigError> {
    if min > max {
        return Err(ConfigError::InvertedRange { field, min, max });
    }
    Ok(())
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
