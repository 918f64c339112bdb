//! Error types for manifest load/save.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the manifest store.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file does not exist; the media crawl has not been run.
    #[error("manifest not found at {path}; run `all-media` first")]
    Missing {
        /// Expected manifest location.
        path: PathBuf,
    },

    /// The manifest is not a JSON array, or the array is empty.
    #[error("manifest at {path} is empty; nothing to do")]
    Empty {
        /// Manifest location.
        path: PathBuf,
    },

    /// The manifest is not valid JSON or an entry has the wrong shape.
    #[error("manifest at {path} is malformed: {source}")]
    Parse {
        /// Manifest location.
        path: PathBuf,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// Reading or writing the manifest file failed.
    #[error("IO error on manifest {path}: {source}")]
    Io {
        /// Manifest location.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ManifestError {
    /// Creates an IO error with the manifest path attached.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse error with the manifest path attached.
    pub fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    /// Returns true for the preconditions that stop a run before it starts.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Missing { .. } | Self::Empty { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_display_mentions_crawl_command() {
        let error = ManifestError::Missing {
            path: PathBuf::from("fandom-data/rezero/all_media_urls.json"),
        };
        let msg = error.to_string();
        assert!(msg.contains("all_media_urls.json"), "Expected path in: {msg}");
        assert!(msg.contains("all-media"), "Expected hint in: {msg}");
        assert!(error.is_precondition());
    }

    #[test]
    fn test_io_is_not_precondition() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = ManifestError::io("/tmp/manifest.json", io_error);
        assert!(!error.is_precondition());
        assert!(error.to_string().contains("/tmp/manifest.json"));
    }
}
