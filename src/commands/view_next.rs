//! `view-next-download`: dry run showing the next entry to fetch.

use anyhow::{Context, Result};
use fandom_core::{ManifestError, manifest, next_pending};

use super::RunSettings;
use crate::ProcessExit;
use crate::cli::LimitedWikiArgs;

/// Prints the first pending entry without any network request.
pub async fn run_view_next_download_command(
    settings: &RunSettings,
    args: &LimitedWikiArgs,
) -> Result<ProcessExit> {
    let layout = settings.layout(&args.wiki);
    let mut entries = match manifest::load(&layout.manifest_path()).await {
        Ok(entries) => entries,
        Err(ManifestError::Missing { path }) => {
            eprintln!(
                "Manifest not found at {}. Run 'all-media' first.",
                path.display()
            );
            return Ok(ProcessExit::Failure);
        }
        Err(ManifestError::Empty { path }) => {
            println!(
                "Manifest at {} is empty; nothing to inspect.",
                path.display()
            );
            return Ok(ProcessExit::Success);
        }
        Err(e) => return Err(e).context("Failed to load manifest"),
    };
    if let Some(limit) = args.limit() {
        entries.truncate(limit);
    }

    let media_dir = layout.media_dir();
    match next_pending(&entries, &media_dir) {
        Some((entry, destination)) => {
            println!("Next pending download (dry run; no network requests performed):");
            println!("{}", entry.to_report_json());
            println!("Intended destination: {}", destination.display());
        }
        None => {
            println!(
                "All entries up to current limit already exist in {}.",
                media_dir.display()
            );
        }
    }
    Ok(ProcessExit::Success)
}
