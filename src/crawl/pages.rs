//! `all-pages`: lists every article in the main namespace.

use std::path::Path;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use super::paginator::{ApiQuery, Paginator};
use super::{CrawlError, wiki_page_url};
use crate::config::CrawlConfig;
use crate::manifest;

/// One article from `list=allpages`, with its public URL filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Page ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pageid: Option<u64>,
    /// Namespace number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ns: Option<i64>,
    /// Page title.
    pub title: String,
    /// Public article URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Any other fields the API returned.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `allpages` query for namespace 0 at `endpoint`.
#[must_use]
pub fn page_query(endpoint: impl Into<String>) -> ApiQuery {
    ApiQuery::new(endpoint, "allpages")
        .param("aplimit", "max")
        .param("apnamespace", "0")
}

/// Lists every main-namespace page of `wiki` and writes them to `output`.
///
/// Returns the number of pages written.
///
/// # Errors
///
/// Any [`CrawlError`] from the listing, or [`CrawlError::Output`] if the
/// file cannot be written.
#[instrument(skip(client, config, output), fields(output = %output.display()))]
pub async fn crawl_pages(
    client: &Client,
    config: &CrawlConfig,
    wiki: &str,
    output: &Path,
) -> Result<usize, CrawlError> {
    config.validate()?;
    let delay_ms = u64::try_from(config.page_delay.as_millis()).unwrap_or(u64::MAX);
    let mut paginator: Paginator<PageRecord> = Paginator::new(
        client.clone(),
        page_query(config.api_endpoint(wiki)),
        delay_ms..=delay_ms,
    );

    let mut pages = Vec::new();
    while let Some(mut page) = paginator.next_record().await? {
        page.url = Some(wiki_page_url(wiki, &page.title));
        pages.push(page);
    }

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CrawlError::io(parent, e))?;
    }
    manifest::write_json(output, &pages).await?;

    info!(
        pages = pages.len(),
        requests = paginator.pages_fetched(),
        "page index written"
    );
    Ok(pages.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use serde_json::json;
    use tempfile::TempDir;

    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_page_query_parameters() {
        let url = page_query("https://rezero.fandom.com/api.php").url(None).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        for expected in [
            ("action", "query"),
            ("format", "json"),
            ("list", "allpages"),
            ("aplimit", "max"),
            ("apnamespace", "0"),
        ] {
            assert!(
                pairs.contains(&(expected.0.to_string(), expected.1.to_string())),
                "missing {expected:?} in {pairs:?}"
            );
        }
    }

    #[test]
    fn test_page_record_keeps_extra_fields() {
        let record: PageRecord =
            serde_json::from_value(json!({"pageid": 7, "ns": 0, "title": "Rem", "x": true}))
                .unwrap();
        assert_eq!(record.pageid, Some(7));
        assert_eq!(record.extra.get("x"), Some(&Value::Bool(true)));
    }

    #[tokio::test]
    async fn test_crawl_pages_writes_index_with_urls() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(query_param("list", "allpages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": {"allpages": [
                    {"pageid": 1, "ns": 0, "title": "Emilia"},
                    {"pageid": 2, "ns": 0, "title": "Natsuki Subaru"}
                ]}
            })))
            .mount(&mock_server)
            .await;

        let config = CrawlConfig {
            api_base: Some(format!("{}/api.php", mock_server.uri())),
            ..CrawlConfig::default()
        };
        let output = temp_dir.path().join("rezero").join("all_page_urls.json");
        let client = Client::new();

        let written = crawl_pages(&client, &config, "rezero", &output).await.unwrap();
        assert_eq!(written, 2);

        let saved: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(saved[1]["url"], "https://rezero.fandom.com/wiki/Natsuki_Subaru");
        assert_eq!(saved[0]["pageid"], 1);
    }
}
