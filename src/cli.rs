//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Crawl a Fandom wiki and mirror its media files.
///
/// Run `all-media` once to build the manifest, then `download-media` as often
/// as needed; every run resumes where the last one stopped.
#[derive(Parser, Debug)]
#[command(name = "fandom-dl")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Root directory for crawl output (default: fandom-data)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override the MediaWiki API endpoint (default: https://<wiki>.fandom.com/api.php)
    #[arg(long, global = true)]
    pub api_base: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List every main-namespace page into all_page_urls.json
    AllPages(WikiArgs),

    /// List every file into all_media_urls.json (the download manifest)
    AllMedia(LimitedWikiArgs),

    /// Download every pending manifest entry into media/
    DownloadMedia(LimitedWikiArgs),

    /// Show the entry the next download run would fetch first
    ViewNextDownload(LimitedWikiArgs),
}

/// A wiki name.
#[derive(ClapArgs, Debug, Clone, PartialEq, Eq)]
pub struct WikiArgs {
    /// Wiki subdomain, e.g. `rezero` for rezero.fandom.com
    #[arg(value_parser = parse_wiki)]
    pub wiki: String,
}

/// A wiki name plus an optional entry cap.
#[derive(ClapArgs, Debug, Clone, PartialEq, Eq)]
pub struct LimitedWikiArgs {
    /// Wiki subdomain, e.g. `rezero` for rezero.fandom.com
    #[arg(value_parser = parse_wiki)]
    pub wiki: String,

    /// Only consider the first N entries
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub limit: Option<u64>,
}

impl LimitedWikiArgs {
    /// The cap as a `usize`.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
            .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX))
    }
}

/// Accepts subdomain-safe names only; the name becomes a host label and a directory.
fn parse_wiki(value: &str) -> Result<String, String> {
    if value.is_empty() {
        return Err("wiki name cannot be empty".to_string());
    }
    if value.starts_with('-') || value.starts_with('.') {
        return Err(format!("invalid wiki name '{value}'"));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(format!(
            "invalid wiki name '{value}': use letters, digits, '-', '_' or '.'"
        ));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_download_media_parses_wiki_and_limit() {
        let args =
            Args::try_parse_from(["fandom-dl", "download-media", "rezero", "--limit", "2"])
                .unwrap();
        assert_eq!(
            args.command,
            Command::DownloadMedia(LimitedWikiArgs {
                wiki: "rezero".to_string(),
                limit: Some(2),
            })
        );
    }

    #[test]
    fn test_cli_all_pages_takes_no_limit() {
        let result = Args::try_parse_from(["fandom-dl", "all-pages", "rezero", "--limit", "2"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_limit_zero_rejected() {
        let result = Args::try_parse_from(["fandom-dl", "all-media", "rezero", "--limit", "0"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["fandom-dl", "-v", "all-pages", "rezero"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["fandom-dl", "all-pages", "rezero", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["fandom-dl", "--quiet", "all-pages", "rezero"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_global_paths() {
        let args = Args::try_parse_from([
            "fandom-dl",
            "view-next-download",
            "rezero",
            "--data-dir",
            "/tmp/data",
            "--api-base",
            "http://127.0.0.1:1/api.php",
        ])
        .unwrap();
        assert_eq!(args.data_dir, Some(PathBuf::from("/tmp/data")));
        assert_eq!(args.api_base.as_deref(), Some("http://127.0.0.1:1/api.php"));
    }

    #[test]
    fn test_cli_missing_subcommand_is_error() {
        let result = Args::try_parse_from(["fandom-dl"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["fandom-dl", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["fandom-dl", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_parse_wiki_rejects_path_like_names() {
        assert!(parse_wiki("rezero").is_ok());
        assert!(parse_wiki("en.rezero").is_ok());
        assert!(parse_wiki("").is_err());
        assert!(parse_wiki("../etc").is_err());
        assert!(parse_wiki("a/b").is_err());
        assert!(parse_wiki("-x").is_err());
    }
}
