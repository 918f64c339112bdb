//! CLI entry point for fandom-dl.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod app_config;
mod cli;
mod commands;

use cli::{Args, Command};
use commands::RunSettings;

/// Process exit status of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// Finished, including clean aborts that a later run resumes.
    Success,
    /// A precondition failed (e.g. no manifest yet).
    Failure,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Failure => ExitCode::FAILURE,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    init_tracing(default_log_level(&args));
    debug!(?args, "CLI arguments parsed");

    match run(&args).await {
        Ok(exit) => exit.into(),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<ProcessExit> {
    let file_config = app_config::load_default_file_config()?;
    let settings = RunSettings::resolve(args, &file_config);

    match &args.command {
        Command::AllPages(wiki) => commands::run_all_pages_command(&settings, wiki).await,
        Command::AllMedia(wiki) => commands::run_all_media_command(&settings, wiki).await,
        Command::DownloadMedia(wiki) => {
            commands::run_download_media_command(&settings, wiki).await
        }
        Command::ViewNextDownload(wiki) => {
            commands::run_view_next_download_command(&settings, wiki).await
        }
    }
}

/// Priority: `RUST_LOG` env var > quiet flag > verbose flag > default (info).
fn default_log_level(args: &Args) -> &'static str {
    if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}
