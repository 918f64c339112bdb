//! Deterministic on-disk paths for manifest entries.
//!
//! The resolved path is the only success signal the downloader trusts on
//! resume, so it depends on nothing but the descriptor's name and hash.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::manifest::AssetDescriptor;

/// Name used when an entry has neither `name` nor `title`.
pub const FALLBACK_FILE_NAME: &str = "file";

/// Suffix of the in-progress sibling written during a transfer.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Resolves the destination of `descriptor` inside `media_dir`.
///
/// `{sha1}_{name}` when a hash is present, `{name}` otherwise.
#[must_use]
pub fn destination_for(descriptor: &AssetDescriptor, media_dir: &Path) -> PathBuf {
    media_dir.join(file_name_for(descriptor))
}

/// The bare file name [`destination_for`] joins onto the media directory.
#[must_use]
pub fn file_name_for(descriptor: &AssetDescriptor) -> String {
    let name = descriptor
        .file_name()
        .unwrap_or(Cow::Borrowed(FALLBACK_FILE_NAME));
    let sanitized = sanitize_name(&name);
    match descriptor.sha1() {
        Some(sha1) => format!("{sha1}_{sanitized}"),
        None => sanitized,
    }
}

/// The `.part` sibling used while `destination` is being written.
#[must_use]
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.file_name().unwrap_or_default().to_os_string();
    name.push(PARTIAL_SUFFIX);
    destination.with_file_name(name)
}

/// Spaces become underscores; path separators too, keeping the directory flat.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect()
}
