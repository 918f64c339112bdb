//! `download-media`.

use std::sync::Arc;

use anyhow::{Context, Result};
use fandom_core::{
    DownloadOrchestrator, HttpTransfer, InFlight, ManifestError, OrchestratorError, RunOutcome,
    RunSummary,
};
use indicatif::HumanBytes;
use tracing::info;

use super::RunSettings;
use crate::ProcessExit;
use crate::cli::LimitedWikiArgs;

/// Downloads every pending manifest entry of a wiki.
///
/// An aborted run still exits successfully: it is resumable by running again.
pub async fn run_download_media_command(
    settings: &RunSettings,
    args: &LimitedWikiArgs,
) -> Result<ProcessExit> {
    let layout = settings.layout(&args.wiki);
    let mut config = settings.fetch.clone();
    config.limit = args.limit();
    let transfer = HttpTransfer::new(&config).context("Failed to build HTTP client")?;
    let orchestrator = DownloadOrchestrator::new(config, Arc::new(transfer));
    let media_dir = layout.media_dir();

    info!(wiki = %args.wiki, media_dir = %media_dir.display(), "starting download run");
    let outcome = match orchestrator.run(&layout.manifest_path(), &media_dir).await {
        Ok(outcome) => outcome,
        Err(OrchestratorError::Manifest(ManifestError::Missing { path })) => {
            eprintln!(
                "Manifest not found at {}. Run 'all-media' first.",
                path.display()
            );
            return Ok(ProcessExit::Failure);
        }
        Err(OrchestratorError::Manifest(ManifestError::Empty { path })) => {
            println!(
                "Manifest at {} is empty; nothing to download.",
                path.display()
            );
            return Ok(ProcessExit::Success);
        }
        Err(e) => return Err(e).context("Download run failed"),
    };

    match outcome {
        RunOutcome::Completed(summary) => {
            println!(
                "Completed. {} new files ensured in {} ({}/{} entries processed). {}",
                summary.downloaded,
                media_dir.display(),
                summary.processed,
                summary.total,
                storage_line(&summary)
            );
        }
        RunOutcome::Aborted {
            reason,
            summary,
            in_flight,
        } => {
            if let Some(entry) = in_flight {
                print_in_flight(&entry);
            }
            println!("{reason}");
            println!(
                "Stopped after {}/{} entries; run again to resume. {}",
                summary.processed,
                summary.total,
                storage_line(&summary)
            );
        }
    }
    Ok(ProcessExit::Success)
}

fn print_in_flight(entry: &InFlight) {
    println!("Download aborted while fetching this entry:");
    println!("{}", entry.descriptor.to_report_json());
    println!("Intended destination: {}", entry.destination.display());
}

fn storage_line(summary: &RunSummary) -> String {
    format!(
        "Current storage usage: {}.",
        HumanBytes(summary.bytes_on_disk)
    )
}
