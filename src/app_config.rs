//! Application configuration loading for CLI defaults.
//!
//! The file is a flat list of `key = value` lines at
//! `$XDG_CONFIG_HOME/fandom-dl/config.toml`. Values set there replace the
//! built-in defaults; CLI flags replace both.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use fandom_core::{CrawlConfig, FetchConfig};

/// Bytes per GiB, for `min_free_gib`.
const GIB: u64 = 1024 * 1024 * 1024;

/// File configuration; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Root directory for crawl output.
    pub data_dir: Option<PathBuf>,
    /// MediaWiki API endpoint override.
    pub api_base: Option<String>,
    /// Asset connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Asset read timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Lower bound of the delay between downloads, in seconds.
    pub download_delay_min_secs: Option<u64>,
    /// Upper bound of the delay between downloads, in seconds.
    pub download_delay_max_secs: Option<u64>,
    /// Downloads between progress reports.
    pub progress_interval: Option<u64>,
    /// First backoff delay in seconds.
    pub initial_backoff_secs: Option<u64>,
    /// Backoff ceiling in seconds.
    pub max_backoff_secs: Option<u64>,
    /// Free-space floor in GiB.
    pub min_free_gib: Option<u64>,
    /// API request timeout in seconds.
    pub api_timeout_secs: Option<u64>,
    /// Lower bound of the delay between media listing pages, in seconds.
    pub media_delay_min_secs: Option<u64>,
    /// Upper bound of the delay between media listing pages, in seconds.
    pub media_delay_max_secs: Option<u64>,
}

impl FileConfig {
    /// Validates values that the library config cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("request_timeout_secs", self.request_timeout_secs)?;
        validate_timeout_secs("api_timeout_secs", self.api_timeout_secs)?;
        if self.progress_interval == Some(0) {
            bail!("Invalid config value for `progress_interval`: 0. Expected at least 1");
        }
        if self.initial_backoff_secs == Some(0) {
            bail!("Invalid config value for `initial_backoff_secs`: 0. Expected at least 1");
        }
        Ok(())
    }

    /// Overlays the download settings onto `config`.
    pub fn apply_to_fetch(&self, config: &mut FetchConfig) {
        if let Some(secs) = self.connect_timeout_secs {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.download_delay_min_secs {
            config.download_delay_min = Duration::from_secs(secs);
        }
        if let Some(secs) = self.download_delay_max_secs {
            config.download_delay_max = Duration::from_secs(secs);
        }
        if let Some(interval) = self.progress_interval {
            config.progress_interval = usize::try_from(interval).unwrap_or(usize::MAX);
        }
        if let Some(secs) = self.initial_backoff_secs {
            config.initial_backoff = Duration::from_secs(secs);
        }
        if let Some(secs) = self.max_backoff_secs {
            config.max_backoff = Duration::from_secs(secs);
        }
        if let Some(gib) = self.min_free_gib {
            config.min_free_bytes = gib.saturating_mul(GIB);
        }
    }

    /// Overlays the crawl settings onto `config`.
    pub fn apply_to_crawl(&self, config: &mut CrawlConfig) {
        if let Some(api_base) = &self.api_base {
            config.api_base = Some(api_base.clone());
        }
        if let Some(secs) = self.api_timeout_secs {
            config.api_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.media_delay_min_secs {
            config.media_delay_min = Duration::from_secs(secs);
        }
        if let Some(secs) = self.media_delay_max_secs {
            config.media_delay_max = Duration::from_secs(secs);
        }
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/fandom-dl/config.toml`
/// 2. `$HOME/.config/fandom-dl/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("fandom-dl")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("fandom-dl")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file from the default path, or defaults when there is none.
pub fn load_default_file_config() -> Result<FileConfig> {
    let Some(path) = resolve_default_config_path() else {
        return Ok(FileConfig::default());
    };
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    load_file_config(&path)
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let line_number = line_index + 1;

        match key {
            "data_dir" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `data_dir` value on line {line_number}"))?;
                cfg.data_dir = Some(PathBuf::from(parsed));
            }
            "api_base" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `api_base` value on line {line_number}"))?;
                cfg.api_base = Some(parsed);
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_field(key, value, line_number)?);
            }
            "request_timeout_secs" => {
                cfg.request_timeout_secs = Some(parse_field(key, value, line_number)?);
            }
            "download_delay_min_secs" => {
                cfg.download_delay_min_secs = Some(parse_field(key, value, line_number)?);
            }
            "download_delay_max_secs" => {
                cfg.download_delay_max_secs = Some(parse_field(key, value, line_number)?);
            }
            "progress_interval" => {
                cfg.progress_interval = Some(parse_field(key, value, line_number)?);
            }
            "initial_backoff_secs" => {
                cfg.initial_backoff_secs = Some(parse_field(key, value, line_number)?);
            }
            "max_backoff_secs" => {
                cfg.max_backoff_secs = Some(parse_field(key, value, line_number)?);
            }
            "min_free_gib" => {
                cfg.min_free_gib = Some(parse_field(key, value, line_number)?);
            }
            "api_timeout_secs" => {
                cfg.api_timeout_secs = Some(parse_field(key, value, line_number)?);
            }
            "media_delay_min_secs" => {
                cfg.media_delay_min_secs = Some(parse_field(key, value, line_number)?);
            }
            "media_delay_max_secs" => {
                cfg.media_delay_max_secs = Some(parse_field(key, value, line_number)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_number}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn parse_field(key: &str, value: &str, line_number: usize) -> Result<u64> {
    parse_integer_u64(value).with_context(|| format!("Invalid `{key}` value on line {line_number}"))
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
            # politer than the defaults
            data_dir = "/srv/fandom"   # shared disk
            download_delay_min_secs = 5
            download_delay_max_secs = 30
            min_free_gib = 50
            "#,
        )
        .unwrap();
        assert_eq!(cfg.data_dir, Some(PathBuf::from("/srv/fandom")));
        assert_eq!(cfg.download_delay_min_secs, Some(5));
        assert_eq!(cfg.min_free_gib, Some(50));
        assert_eq!(cfg.api_base, None);
    }

    #[test]
    fn test_parse_config_unknown_key_fails() {
        let err = parse_config_str("concurrency = 4").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"), "{err}");
    }

    #[test]
    fn test_parse_config_missing_equals_fails() {
        let err = parse_config_str("data_dir").unwrap_err();
        assert!(err.to_string().contains("line 1"), "{err}");
    }

    #[test]
    fn test_parse_config_unquoted_string_fails() {
        assert!(parse_config_str("api_base = http://x/api.php").is_err());
    }

    #[test]
    fn test_parse_config_negative_integer_fails() {
        assert!(parse_config_str("max_backoff_secs = -1").is_err());
    }

    #[test]
    fn test_parse_config_hash_inside_string_is_kept() {
        let cfg = parse_config_str(r#"api_base = "http://x/api.php#frag""#).unwrap();
        assert_eq!(cfg.api_base.as_deref(), Some("http://x/api.php#frag"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        assert!(parse_config_str("request_timeout_secs = 0").is_err());
    }

    #[test]
    fn test_validate_rejects_zero_progress_interval() {
        assert!(parse_config_str("progress_interval = 0").is_err());
    }

    #[test]
    fn test_apply_to_fetch_overrides_only_set_fields() {
        let cfg = FileConfig {
            download_delay_max_secs: Some(40),
            min_free_gib: Some(1),
            ..FileConfig::default()
        };
        let mut fetch = FetchConfig::default();
        cfg.apply_to_fetch(&mut fetch);
        assert_eq!(fetch.download_delay_max, Duration::from_secs(40));
        assert_eq!(fetch.download_delay_min, Duration::from_secs(1));
        assert_eq!(fetch.min_free_bytes, GIB);
    }

    #[test]
    fn test_apply_to_crawl_sets_api_base() {
        let cfg = FileConfig {
            api_base: Some("http://mirror/api.php".to_string()),
            media_delay_max_secs: Some(2),
            ..FileConfig::default()
        };
        let mut crawl = CrawlConfig::default();
        cfg.apply_to_crawl(&mut crawl);
        assert_eq!(crawl.api_endpoint("rezero"), "http://mirror/api.php");
        assert_eq!(crawl.media_delay_max, Duration::from_secs(2));
    }
}
