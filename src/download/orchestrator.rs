//! Download orchestrator: walks the manifest and downloads pending entries.
//!
//! Each entry goes through
//! `Pending -> {Skipped, Downloading -> {Completed, PermanentlyFailed, RunAborted}}`:
//!
//! - entries without a URL, with a failure marker, or whose destination file
//!   already exists are skipped without any network request
//! - a not-found response marks the entry and rewrites the manifest at once
//! - backoff exhaustion or a breached disk-space floor stops the whole run;
//!   everything not yet reached stays pending for the next run
//!
//! Downloads happen one at a time with a random polite delay between them.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use fandom_core::config::FetchConfig;
//! use fandom_core::download::{DownloadOrchestrator, HttpTransfer, RunOutcome};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FetchConfig::default();
//! let transfer = Arc::new(HttpTransfer::new(&config)?);
//! let orchestrator = DownloadOrchestrator::new(config, transfer);
//! let outcome = orchestrator
//!     .run(
//!         Path::new("fandom-data/rezero/all_media_urls.json"),
//!         Path::new("fandom-data/rezero/media"),
//!     )
//!     .await?;
//! if let RunOutcome::Completed(summary) = outcome {
//!     println!("{} new files", summary.downloaded);
//! }
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::HumanBytes;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use super::client::Transfer;
use super::destination::destination_for;
use super::progress::{
    CapacityError, FilesystemSpace, FreeSpace, ProgressMonitor, directory_size,
};
use super::retry::{BackoffPolicy, RetryError, fetch_with_retry};
use crate::config::{ConfigError, FetchConfig};
use crate::manifest::{self, AssetDescriptor, ManifestError};

/// Errors that prevent a run from starting or continuing safely.
///
/// Per-entry failures never surface here; they are recorded or retried.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Loading or rewriting the manifest failed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The run configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The media directory cannot be created or scanned.
    #[error("cannot prepare media directory {path}: {source}")]
    MediaDir {
        /// The media directory.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Free space could not be queried.
    #[error(transparent)]
    Capacity(CapacityError),
}

/// What happened to one manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The entry has no URL.
    SkippedNoUrl,
    /// A failure marker is already recorded.
    SkippedFailed,
    /// The destination file already exists.
    SkippedExists,
    /// Downloaded `bytes` bytes.
    Completed {
        /// Size of the stored file.
        bytes: u64,
    },
    /// The remote reported not-found; the marker was recorded.
    PermanentlyFailed,
}

/// Pre-download classification of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Triage<'a> {
    /// Nothing to do for this entry.
    Skip(EntryOutcome),
    /// The entry needs downloading.
    Pending {
        /// The download URL.
        url: &'a str,
        /// Where the file will be stored.
        destination: PathBuf,
    },
}

/// Decides whether `entry` needs a download, without any network I/O.
#[must_use]
pub fn triage<'a>(entry: &'a AssetDescriptor, media_dir: &Path) -> Triage<'a> {
    let Some(url) = entry.url() else {
        return Triage::Skip(EntryOutcome::SkippedNoUrl);
    };
    if entry.is_failed() {
        return Triage::Skip(EntryOutcome::SkippedFailed);
    }
    let destination = destination_for(entry, media_dir);
    if destination.exists() {
        return Triage::Skip(EntryOutcome::SkippedExists);
    }
    Triage::Pending { url, destination }
}

/// The first entry a run would download, with its destination.
#[must_use]
pub fn next_pending<'a>(
    entries: &'a [AssetDescriptor],
    media_dir: &Path,
) -> Option<(&'a AssetDescriptor, PathBuf)> {
    entries
        .iter()
        .find_map(|entry| match triage(entry, media_dir) {
            Triage::Pending { destination, .. } => Some((entry, destination)),
            Triage::Skip(_) => None,
        })
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Entries considered (after the cap).
    pub total: usize,
    /// Entries reached so far, including skipped ones.
    pub processed: usize,
    /// Files downloaded in this run.
    pub downloaded: usize,
    /// Entries skipped because their file exists.
    pub skipped_existing: usize,
    /// Entries skipped because of a recorded failure.
    pub skipped_failed: usize,
    /// Entries skipped for lack of a URL.
    pub skipped_no_url: usize,
    /// Not-found markers recorded in this run.
    pub newly_failed: usize,
    /// Bytes stored in the media directory.
    pub bytes_on_disk: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: EntryOutcome) {
        match outcome {
            EntryOutcome::SkippedNoUrl => self.skipped_no_url += 1,
            EntryOutcome::SkippedFailed => self.skipped_failed += 1,
            EntryOutcome::SkippedExists => self.skipped_existing += 1,
            EntryOutcome::Completed { bytes } => {
                self.downloaded += 1;
                self.bytes_on_disk += bytes;
            }
            EntryOutcome::PermanentlyFailed => self.newly_failed += 1,
        }
    }
}

/// Why a run stopped early.
#[derive(Debug)]
pub enum AbortReason {
    /// Transient failures pushed the backoff to its ceiling.
    BackoffExceeded(RetryError),
    /// Free space fell below the floor.
    LowDiskSpace(CapacityError),
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BackoffExceeded(e) => write!(f, "{e}"),
            Self::LowDiskSpace(e) => write!(f, "{e}"),
        }
    }
}

/// The entry being worked on when a run stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct InFlight {
    /// The manifest record.
    pub descriptor: AssetDescriptor,
    /// Its computed destination.
    pub destination: PathBuf,
}

/// Result of a run that did not hit an [`OrchestratorError`].
#[derive(Debug)]
pub enum RunOutcome {
    /// Every entry up to the cap was processed.
    Completed(RunSummary),
    /// The run stopped early; it can be resumed by running again.
    Aborted {
        /// What stopped the run.
        reason: AbortReason,
        /// Counters up to the abort.
        summary: RunSummary,
        /// The entry in flight, when there was one.
        in_flight: Option<InFlight>,
    },
}

impl RunOutcome {
    /// Counters regardless of how the run ended.
    #[must_use]
    pub fn summary(&self) -> &RunSummary {
        match self {
            Self::Completed(summary) | Self::Aborted { summary, .. } => summary,
        }
    }
}

/// Sequential, resumable manifest downloader.
pub struct DownloadOrchestrator {
    config: FetchConfig,
    transfer: Arc<dyn Transfer>,
    free_space: Arc<dyn FreeSpace>,
}

impl std::fmt::Debug for DownloadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DownloadOrchestrator {
    /// Creates an orchestrator that downloads through `transfer`.
    #[must_use]
    pub fn new(config: FetchConfig, transfer: Arc<dyn Transfer>) -> Self {
        Self {
            config,
            transfer,
            free_space: Arc::new(FilesystemSpace),
        }
    }

    /// Replaces where the disk-space floor reads free space from.
    #[must_use]
    pub fn with_free_space(mut self, free_space: Arc<dyn FreeSpace>) -> Self {
        self.free_space = free_space;
        self
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Downloads every pending entry of the manifest at `manifest_path` into `media_dir`.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::Manifest`] when the manifest is missing, empty,
    /// malformed or cannot be rewritten; [`OrchestratorError::MediaDir`] and
    /// [`OrchestratorError::Capacity`] for local filesystem failures;
    /// [`OrchestratorError::Config`] for an invalid configuration.
    /// Backoff exhaustion and low disk space are reported as
    /// [`RunOutcome::Aborted`], not as errors.
    #[instrument(skip(self), fields(manifest = %manifest_path.display(), media_dir = %media_dir.display()))]
    pub async fn run(
        &self,
        manifest_path: &Path,
        media_dir: &Path,
    ) -> Result<RunOutcome, OrchestratorError> {
        self.config.validate()?;
        let mut entries = manifest::load(manifest_path).await?;
        let total = self
            .config
            .limit
            .map_or(entries.len(), |limit| limit.min(entries.len()));

        tokio::fs::create_dir_all(media_dir)
            .await
            .map_err(|source| OrchestratorError::MediaDir {
                path: media_dir.to_path_buf(),
                source,
            })?;
        let bytes_on_disk =
            directory_size(media_dir).map_err(|source| OrchestratorError::MediaDir {
                path: media_dir.to_path_buf(),
                source,
            })?;

        info!(
            total,
            delay_min_secs = self.config.download_delay_min.as_secs_f64(),
            delay_max_secs = self.config.download_delay_max.as_secs_f64(),
            progress_interval = self.config.progress_interval,
            stored = %HumanBytes(bytes_on_disk),
            "starting downloads"
        );

        let monitor = ProgressMonitor::from_config(media_dir, &self.config)
            .with_free_space(Arc::clone(&self.free_space));
        let policy = BackoffPolicy::from_config(&self.config);
        let mut summary = RunSummary {
            total,
            bytes_on_disk,
            ..RunSummary::default()
        };
        let mut downloads_since_report = 0usize;
        let mut capacity_checked = false;

        for index in 0..total {
            summary.processed += 1;

            let (url, destination) = match triage(&entries[index], media_dir) {
                Triage::Skip(outcome) => {
                    debug!(index, ?outcome, "skipping entry");
                    summary.record(outcome);
                    continue;
                }
                Triage::Pending { url, destination } => (url.to_string(), destination),
            };

            if summary.downloaded > 0 {
                self.polite_delay().await;
            }

            if !capacity_checked {
                match monitor.ensure_capacity() {
                    Ok(_) => capacity_checked = true,
                    Err(CapacityError::Io { path, source }) => {
                        return Err(OrchestratorError::Capacity(CapacityError::Io {
                            path,
                            source,
                        }));
                    }
                    Err(low) => {
                        let in_flight = InFlight {
                            descriptor: entries[index].clone(),
                            destination,
                        };
                        return Ok(abort(
                            AbortReason::LowDiskSpace(low),
                            summary,
                            Some(in_flight),
                        ));
                    }
                }
            }

            match fetch_with_retry(self.transfer.as_ref(), &url, &destination, &policy).await {
                Ok(bytes) => {
                    debug!(index, bytes, destination = %destination.display(), "entry downloaded");
                    summary.record(EntryOutcome::Completed { bytes });
                    downloads_since_report += 1;
                    if downloads_since_report >= self.config.progress_interval {
                        downloads_since_report = 0;
                        if let Err(e) =
                            monitor.report(summary.processed, total, summary.bytes_on_disk)
                        {
                            // this entry is already complete; nothing is in flight
                            return capacity_abort(e, summary, None);
                        }
                    }
                }
                Err(RetryError::NotFound { .. }) => {
                    entries[index].mark_not_found();
                    manifest::save(manifest_path, &entries).await?;
                    warn!(
                        index,
                        url = %url,
                        descriptor = %entries[index].to_report_json(),
                        destination = %destination.display(),
                        "recorded not-found for this entry; it will be skipped"
                    );
                    summary.record(EntryOutcome::PermanentlyFailed);
                }
                Err(backoff @ RetryError::BackoffExceeded { .. }) => {
                    let in_flight = InFlight {
                        descriptor: entries[index].clone(),
                        destination,
                    };
                    if downloads_since_report > 0
                        && let Err(e) =
                            monitor.report(summary.processed, total, summary.bytes_on_disk)
                    {
                        warn!(error = %e, "final progress report failed during backoff abort");
                    }
                    return Ok(abort(
                        AbortReason::BackoffExceeded(backoff),
                        summary,
                        Some(in_flight),
                    ));
                }
            }
        }

        if downloads_since_report > 0
            && let Err(e) = monitor.report(summary.processed, total, summary.bytes_on_disk)
        {
            return capacity_abort(e, summary, None);
        }

        info!(
            downloaded = summary.downloaded,
            processed = summary.processed,
            total,
            newly_failed = summary.newly_failed,
            stored = %HumanBytes(summary.bytes_on_disk),
            "downloads complete"
        );
        Ok(RunOutcome::Completed(summary))
    }

    async fn polite_delay(&self) {
        let millis = rand::thread_rng().gen_range(self.config.download_delay_range_ms());
        debug!(delay_ms = millis, "waiting before next download");
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

fn capacity_abort(
    error: CapacityError,
    summary: RunSummary,
    in_flight: Option<InFlight>,
) -> Result<RunOutcome, OrchestratorError> {
    match error {
        CapacityError::Io { .. } => Err(OrchestratorError::Capacity(error)),
        low @ CapacityError::LowDiskSpace { .. } => {
            Ok(abort(AbortReason::LowDiskSpace(low), summary, in_flight))
        }
    }
}

fn abort(reason: AbortReason, summary: RunSummary, in_flight: Option<InFlight>) -> RunOutcome {
    match &in_flight {
        Some(entry) => error!(
            reason = %reason,
            descriptor = %entry.descriptor.to_report_json(),
            destination = %entry.destination.display(),
            "download aborted while fetching this entry"
        ),
        None => error!(reason = %reason, "download aborted"),
    }
    RunOutcome::Aborted {
        reason,
        summary,
        in_flight,
    }
}
