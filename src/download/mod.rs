//! Resumable, manifest-driven media downloads.
//!
//! The pieces, bottom-up:
//!
//! - [`destination_for`] maps a manifest entry to its on-disk path
//! - [`HttpTransfer`] streams one asset to a `.part` file and renames it into place
//! - [`fetch_with_retry`] wraps a transfer in capped exponential backoff
//! - [`ProgressMonitor`] reports progress and enforces the free-space floor
//! - [`DownloadOrchestrator`] walks the manifest and drives all of the above
//!
//! # Example
//!
//! ```no_run
//! use fandom_core::download::HttpTransfer;
//! use fandom_core::download::Transfer;
//! use fandom_core::config::FetchConfig;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transfer = HttpTransfer::new(&FetchConfig::default())?;
//! let bytes = transfer
//!     .fetch(
//!         "https://static.wikia.nocookie.net/rezero/images/a/a1/Emilia.png",
//!         Path::new("./media/Emilia.png"),
//!     )
//!     .await?;
//! println!("stored {bytes} bytes");
//! # Ok(())
//! # }
//! ```

mod client;
mod destination;
mod error;
mod orchestrator;
mod progress;
mod retry;

pub use client::{HttpTransfer, Transfer};
pub use destination::{
    FALLBACK_FILE_NAME, PARTIAL_SUFFIX, destination_for, file_name_for, partial_path,
};
pub use error::DownloadError;
pub use orchestrator::{
    AbortReason, DownloadOrchestrator, EntryOutcome, InFlight, OrchestratorError, RunOutcome,
    RunSummary, Triage, next_pending, triage,
};
pub use progress::{
    CapacityError, FilesystemSpace, FreeSpace, ProgressMonitor, ProgressReport, directory_size,
    format_eta,
};
pub use retry::{
    BackoffPolicy, BackoffSchedule, FailureType, RetryDecision, RetryError, classify_error,
    fetch_with_retry,
};
