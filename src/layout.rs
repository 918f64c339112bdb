//! On-disk layout of a wiki's crawl output.
//!
//! ```text
//! <data_dir>/<wiki>/
//!     all_page_urls.json
//!     all_media_urls.json
//!     .media-chunks/chunk-00000.json ...
//!     media/
//! ```

use std::path::{Path, PathBuf};

/// Default root for all wikis.
pub const DEFAULT_DATA_DIR: &str = "fandom-data";

/// Page index file name.
pub const PAGES_FILE: &str = "all_page_urls.json";

/// Media manifest file name.
pub const MEDIA_MANIFEST_FILE: &str = "all_media_urls.json";

/// Downloaded media directory name.
pub const MEDIA_DIR: &str = "media";

/// Media crawl chunk directory name.
pub const CHUNK_DIR: &str = ".media-chunks";

/// Paths for one wiki under a data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLayout {
    wiki: String,
    root: PathBuf,
}

impl WikiLayout {
    /// Layout for `wiki` under `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl AsRef<Path>, wiki: impl Into<String>) -> Self {
        let wiki = wiki.into();
        let root = data_dir.as_ref().join(&wiki);
        Self { wiki, root }
    }

    /// The wiki subdomain.
    #[must_use]
    pub fn wiki(&self) -> &str {
        &self.wiki
    }

    /// `<data_dir>/<wiki>`.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The page index written by `all-pages`.
    #[must_use]
    pub fn pages_path(&self) -> PathBuf {
        self.root.join(PAGES_FILE)
    }

    /// The manifest written by `all-media` and read by the downloader.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MEDIA_MANIFEST_FILE)
    }

    /// Where downloaded files go.
    #[must_use]
    pub fn media_dir(&self) -> PathBuf {
        self.root.join(MEDIA_DIR)
    }

    /// Where the media crawl stages its chunks.
    #[must_use]
    pub fn chunk_dir(&self) -> PathBuf {
        self.root.join(CHUNK_DIR)
    }
}
