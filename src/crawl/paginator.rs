//! Continuation-cursor pagination over MediaWiki `list=` queries.
//!
//! Every response carries the records under `query.<list>` and, when more
//! remain, a `continue` object whose key/value pairs are merged into the next
//! request. The cursor is opaque: its contents are echoed back, never read.

use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, instrument};
use url::Url;

use super::CrawlError;

/// Opaque resume token returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Continuation {
    pairs: Vec<(String, String)>,
}

impl Continuation {
    /// Reads the `continue` object of a response, if any.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let object = payload.get("continue")?.as_object()?;
        Some(Self::from_object(object))
    }

    fn from_object(object: &Map<String, Value>) -> Self {
        let pairs = object
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect();
        Self { pairs }
    }

    fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }
}

/// A `list=` query against one API endpoint.
#[derive(Debug, Clone)]
pub struct ApiQuery {
    endpoint: String,
    list: &'static str,
    params: Vec<(&'static str, String)>,
}

impl ApiQuery {
    /// Starts a `action=query&format=json&list=<list>` query.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, list: &'static str) -> Self {
        Self {
            endpoint: endpoint.into(),
            list,
            params: vec![
                ("action", "query".to_string()),
                ("format", "json".to_string()),
                ("list", list.to_string()),
            ],
        }
    }

    /// Adds a fixed request parameter.
    #[must_use]
    pub fn param(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.params.push((key, value.into()));
        self
    }

    /// The list name, also the key holding records under `query`.
    #[must_use]
    pub fn list(&self) -> &'static str {
        self.list
    }

    /// Request URL for the page after `continuation`.
    ///
    /// Continuation keys override fixed parameters of the same name.
    ///
    /// # Errors
    ///
    /// [`CrawlError::InvalidEndpoint`] when the endpoint does not parse.
    pub fn url(&self, continuation: Option<&Continuation>) -> Result<Url, CrawlError> {
        let mut url = Url::parse(&self.endpoint).map_err(|_| CrawlError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
        })?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in &self.params {
                if continuation.is_some_and(|c| c.contains(key)) {
                    continue;
                }
                query.append_pair(key, value);
            }
            if let Some(continuation) = continuation {
                for (key, value) in &continuation.pairs {
                    query.append_pair(key, value);
                }
            }
        }
        Ok(url)
    }
}

/// One page of listing results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Records in API order.
    pub records: Vec<T>,
    /// Whether the API returned a continuation cursor.
    pub has_more: bool,
}

/// Walks a listing page by page, or record by record.
///
/// A delay drawn from `delay_ms` is applied before every request except the first.
pub struct Paginator<T> {
    client: Client,
    query: ApiQuery,
    delay_ms: RangeInclusive<u64>,
    continuation: Option<Continuation>,
    started: bool,
    buffer: VecDeque<T>,
    pages_fetched: usize,
}

impl<T> std::fmt::Debug for Paginator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginator")
            .field("query", &self.query)
            .field("continuation", &self.continuation)
            .field("pages_fetched", &self.pages_fetched)
            .finish_non_exhaustive()
    }
}

impl<T: DeserializeOwned> Paginator<T> {
    /// Creates a paginator that has not sent any request yet.
    #[must_use]
    pub fn new(client: Client, query: ApiQuery, delay_ms: RangeInclusive<u64>) -> Self {
        Self {
            client,
            query,
            delay_ms,
            continuation: None,
            started: false,
            buffer: VecDeque::new(),
            pages_fetched: 0,
        }
    }

    /// Pages fetched so far.
    #[must_use]
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Whether another page can be requested.
    #[must_use]
    pub fn has_more(&self) -> bool {
        !self.started || self.continuation.is_some()
    }

    /// Fetches the next page, or `None` once the cursor is exhausted.
    ///
    /// # Errors
    ///
    /// [`CrawlError::Http`] and [`CrawlError::Status`] for transport failures,
    /// [`CrawlError::Payload`] when `query.<list>` is missing or malformed.
    #[instrument(skip_all)]
    pub async fn next_page(&mut self) -> Result<Option<Page<T>>, CrawlError> {
        if !self.has_more() {
            return Ok(None);
        }
        if self.started {
            self.pause().await;
        }

        let url = self.query.url(self.continuation.as_ref())?;
        let payload = self.fetch_payload(&url).await?;
        let records = extract_records(&payload, self.query.list(), url.as_str())?;

        self.started = true;
        self.pages_fetched += 1;
        self.continuation = Continuation::from_payload(&payload);
        debug!(
            list = self.query.list(),
            page = self.pages_fetched,
            records = records.len(),
            has_more = self.continuation.is_some(),
            "listing page received"
        );

        Ok(Some(Page {
            records,
            has_more: self.continuation.is_some(),
        }))
    }

    /// Returns the next record, fetching pages as needed.
    ///
    /// # Errors
    ///
    /// Same as [`next_page`](Self::next_page).
    pub async fn next_record(&mut self) -> Result<Option<T>, CrawlError> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Ok(Some(record));
            }
            match self.next_page().await? {
                Some(page) => self.buffer.extend(page.records),
                None => return Ok(None),
            }
        }
    }

    async fn fetch_payload(&self, url: &Url) -> Result<Value, CrawlError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| CrawlError::http(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| CrawlError::http(url.as_str(), e))
    }

    async fn pause(&self) {
        let millis = if self.delay_ms.is_empty() {
            0
        } else {
            rand::thread_rng().gen_range(self.delay_ms.clone())
        };
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }
}

fn extract_records<T: DeserializeOwned>(
    payload: &Value,
    list: &str,
    url: &str,
) -> Result<Vec<T>, CrawlError> {
    let Some(records) = payload.get("query").and_then(|query| query.get(list)) else {
        return Err(CrawlError::payload(url, format!("missing query.{list}")));
    };
    serde_json::from_value(records.clone())
        .map_err(|e| CrawlError::payload(url, format!("malformed query.{list}: {e}")))
}
