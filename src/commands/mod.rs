//! CLI command handlers.

mod crawl;
mod download;
mod view_next;

use std::path::PathBuf;

use fandom_core::{CrawlConfig, DEFAULT_DATA_DIR, FetchConfig, WikiLayout};

use crate::app_config::FileConfig;
use crate::cli::Args;

pub use crawl::{run_all_media_command, run_all_pages_command};
pub use download::run_download_media_command;
pub use view_next::run_view_next_download_command;

/// Settings shared by every command after merging defaults, file and flags.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Root directory for crawl output.
    pub data_dir: PathBuf,
    /// Download settings.
    pub fetch: FetchConfig,
    /// Crawl settings.
    pub crawl: CrawlConfig,
}

impl RunSettings {
    /// Built-in defaults, then the config file, then CLI flags.
    #[must_use]
    pub fn resolve(args: &Args, file: &FileConfig) -> Self {
        let mut fetch = FetchConfig::default();
        file.apply_to_fetch(&mut fetch);
        let mut crawl = CrawlConfig::default();
        file.apply_to_crawl(&mut crawl);
        if let Some(api_base) = &args.api_base {
            crawl.api_base = Some(api_base.clone());
        }

        let data_dir = args
            .data_dir
            .clone()
            .or_else(|| file.data_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        Self {
            data_dir,
            fetch,
            crawl,
        }
    }

    /// Output paths for `wiki`.
    #[must_use]
    pub fn layout(&self, wiki: &str) -> WikiLayout {
        WikiLayout::new(&self.data_dir, wiki)
    }
}
