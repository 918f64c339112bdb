//! Progress reporting and the free-space floor.
//!
//! Reports are made every few downloads rather than on each one, since each
//! report queries the filesystem for free space.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::HumanBytes;
use thiserror::Error;
use tracing::info;

use crate::config::FetchConfig;

/// Fatal capacity conditions.
#[derive(Debug, Error)]
pub enum CapacityError {
    /// Free space on the media filesystem dropped below the floor.
    #[error(
        "less than {} free on the target filesystem ({} left); stopping downloads",
        human(.floor_bytes),
        human(.free_bytes)
    )]
    LowDiskSpace {
        /// Bytes currently free.
        free_bytes: u64,
        /// Configured floor.
        floor_bytes: u64,
    },

    /// Free space could not be determined.
    #[error("cannot query free space for {path}: {source}")]
    Io {
        /// The directory that was queried.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// One progress snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    /// Entries processed so far.
    pub completed: usize,
    /// Entries in this run.
    pub total: usize,
    /// `completed / total` as a percentage.
    pub percent: f64,
    /// Naive time remaining.
    pub eta: Duration,
    /// Bytes stored in the media directory.
    pub bytes_on_disk: u64,
    /// Bytes free on the media filesystem.
    pub free_bytes: u64,
}

/// Where free-space figures come from.
pub trait FreeSpace: Debug + Send + Sync {
    /// Bytes available to this process on the filesystem holding `path`.
    ///
    /// # Errors
    ///
    /// Returns the IO error from the underlying query.
    fn available(&self, path: &Path) -> std::io::Result<u64>;
}

/// Asks the operating system through `fs2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilesystemSpace;

impl FreeSpace for FilesystemSpace {
    fn available(&self, path: &Path) -> std::io::Result<u64> {
        fs2::available_space(path)
    }
}

/// Computes progress and enforces the free-space floor.
#[derive(Debug, Clone)]
pub struct ProgressMonitor {
    media_dir: PathBuf,
    min_free_bytes: u64,
    eta_per_entry: Duration,
    space: Arc<dyn FreeSpace>,
}

impl ProgressMonitor {
    /// Creates a monitor for `media_dir`.
    #[must_use]
    pub fn new(media_dir: impl Into<PathBuf>, min_free_bytes: u64, eta_per_entry: Duration) -> Self {
        Self {
            media_dir: media_dir.into(),
            min_free_bytes,
            eta_per_entry,
            space: Arc::new(FilesystemSpace),
        }
    }

    /// Replaces the free-space source.
    #[must_use]
    pub fn with_free_space(mut self, space: Arc<dyn FreeSpace>) -> Self {
        self.space = space;
        self
    }

    /// Creates a monitor using the floor and ETA estimate from `config`.
    #[must_use]
    pub fn from_config(media_dir: impl Into<PathBuf>, config: &FetchConfig) -> Self {
        Self::new(media_dir, config.min_free_bytes, config.eta_per_entry)
    }

    /// Logs a progress line and checks the floor.
    ///
    /// # Errors
    ///
    /// [`CapacityError::LowDiskSpace`] when free space is under the floor,
    /// [`CapacityError::Io`] when it cannot be queried.
    pub fn report(
        &self,
        completed: usize,
        total: usize,
        bytes_on_disk: u64,
    ) -> Result<ProgressReport, CapacityError> {
        let free_bytes = self.free_bytes()?;
        let report = ProgressReport {
            completed,
            total,
            percent: percent(completed, total),
            eta: self.eta(completed, total),
            bytes_on_disk,
            free_bytes,
        };
        info!(
            completed,
            total,
            percent = format_args!("{:.2}", report.percent),
            stored = %HumanBytes(bytes_on_disk),
            dir = %self.media_dir.display(),
            eta = %format_eta(report.eta),
            free = %HumanBytes(free_bytes),
            "download progress"
        );
        self.check_floor(free_bytes)?;
        Ok(report)
    }

    /// The floor check alone, without a progress line.
    ///
    /// # Errors
    ///
    /// Same as [`report`](Self::report).
    pub fn ensure_capacity(&self) -> Result<u64, CapacityError> {
        let free_bytes = self.free_bytes()?;
        self.check_floor(free_bytes)?;
        Ok(free_bytes)
    }

    fn free_bytes(&self) -> Result<u64, CapacityError> {
        self.space.available(&self.media_dir).map_err(|source| CapacityError::Io {
            path: self.media_dir.clone(),
            source,
        })
    }

    fn check_floor(&self, free_bytes: u64) -> Result<(), CapacityError> {
        if free_bytes < self.min_free_bytes {
            return Err(CapacityError::LowDiskSpace {
                free_bytes,
                floor_bytes: self.min_free_bytes,
            });
        }
        Ok(())
    }

    fn eta(&self, completed: usize, total: usize) -> Duration {
        let remaining = u32::try_from(total.saturating_sub(completed)).unwrap_or(u32::MAX);
        self.eta_per_entry.saturating_mul(remaining)
    }
}

fn human(bytes: &u64) -> HumanBytes {
    HumanBytes(*bytes)
}

#[allow(clippy::cast_precision_loss)]
fn percent(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    completed as f64 / total as f64 * 100.0
}

/// Formats a duration as `HH:MM:SS`.
#[must_use]
pub fn format_eta(eta: Duration) -> String {
    let seconds = eta.as_secs();
    let (hours, rem) = (seconds / 3600, seconds % 3600);
    let (minutes, secs) = (rem / 60, rem % 60);
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Total size of the regular files under `path`, recursively.
///
/// A missing directory counts as empty.
///
/// # Errors
///
/// Returns the IO error from reading a directory or file metadata.
pub fn directory_size(path: &Path) -> std::io::Result<u64> {
    if !path.exists() {
        return Ok(0);
    }
    let mut total = 0;
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            total += directory_size(&entry.path())?;
        } else if file_type.is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}
