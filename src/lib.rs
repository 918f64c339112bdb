//! Fandom Core Library
//!
//! Crawls the MediaWiki API of a Fandom wiki and mirrors its media files
//! with a resumable, manifest-driven downloader.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Run configuration and defaults
//! - [`crawl`] - Paginated page and media listings
//! - [`download`] - Sequential downloads with backoff and a disk-space floor
//! - [`layout`] - Per-wiki output paths
//! - [`manifest`] - Loading and rewriting the media manifest

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod crawl;
pub mod download;
pub mod layout;
pub mod manifest;
#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use config::{ConfigError, CrawlConfig, FetchConfig};
pub use crawl::{
    CrawlError, MediaCrawlOutcome, PageRecord, build_api_client, crawl_media, crawl_pages,
};
pub use download::{
    AbortReason, DownloadError, DownloadOrchestrator, EntryOutcome, HttpTransfer, InFlight,
    OrchestratorError, RunOutcome, RunSummary, Transfer, destination_for, next_pending,
};
pub use layout::{DEFAULT_DATA_DIR, WikiLayout};
pub use manifest::{AssetDescriptor, ManifestError};
