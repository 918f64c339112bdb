//! `all-pages` and `all-media`.

use anyhow::{Context, Result};
use fandom_core::{MediaCrawlOutcome, build_api_client, crawl_media, crawl_pages};
use tracing::info;

use super::RunSettings;
use crate::ProcessExit;
use crate::cli::{LimitedWikiArgs, WikiArgs};

/// Writes the page index for a wiki.
pub async fn run_all_pages_command(settings: &RunSettings, args: &WikiArgs) -> Result<ProcessExit> {
    let layout = settings.layout(&args.wiki);
    let client = build_api_client(&settings.crawl)?;
    info!(wiki = %args.wiki, "fetching namespace 0 pages");

    let output = layout.pages_path();
    let pages = crawl_pages(&client, &settings.crawl, &args.wiki, &output)
        .await
        .with_context(|| format!("Failed to list pages of '{}'", args.wiki))?;

    println!("Wrote {pages} pages to {}", output.display());
    Ok(ProcessExit::Success)
}

/// Writes the media manifest for a wiki.
pub async fn run_all_media_command(
    settings: &RunSettings,
    args: &LimitedWikiArgs,
) -> Result<ProcessExit> {
    let layout = settings.layout(&args.wiki);
    let mut config = settings.crawl.clone();
    config.limit = args.limit();
    let client = build_api_client(&config)?;
    info!(
        wiki = %args.wiki,
        limit = ?config.limit,
        chunk_log_interval = config.chunk_log_interval,
        "fetching all files"
    );

    let outcome = crawl_media(
        &client,
        &config,
        &args.wiki,
        &layout.manifest_path(),
        &layout.chunk_dir(),
    )
    .await
    .with_context(|| format!("Failed to list media of '{}'", args.wiki))?;

    match outcome {
        MediaCrawlOutcome::Completed { manifest, entries } => {
            println!("Wrote {entries} media entries to {}", manifest.display());
        }
        MediaCrawlOutcome::Interrupted { entries, chunk_dir } => {
            println!(
                "Stopped after {entries} media entries; partial chunks left in {} for inspection.",
                chunk_dir.display()
            );
        }
    }
    Ok(ProcessExit::Success)
}
