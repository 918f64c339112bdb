//! The manifest entry type.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// HTTP status recorded as the failure marker when an asset is gone.
pub const NOT_FOUND_MARKER: u16 = 404;

/// One downloadable asset as listed by the media crawl.
///
/// The record is kept as the crawler wrote it: an ordered JSON object. The
/// downloader reads `url`, `name`, `title`, `sha1` and `failure` through the
/// accessors below and only ever writes `failure`, so a rewrite keeps every
/// field, in its original position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetDescriptor {
    fields: Map<String, Value>,
}

impl AssetDescriptor {
    /// Creates a descriptor with just a URL and a name.
    #[must_use]
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        let mut descriptor = Self::default();
        descriptor.set("url", Value::String(url.into()));
        descriptor.set("name", Value::String(name.into()));
        descriptor
    }

    /// Wraps an already-ordered JSON object.
    #[must_use]
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// All fields, in manifest order.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The raw value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Sets `key`; an existing key keeps its position, a new one is appended.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// The download URL. Only a non-empty string counts.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self.fields.get("url") {
            Some(Value::String(url)) if !url.is_empty() => Some(url),
            _ => None,
        }
    }

    /// File name as reported by the API.
    #[must_use]
    pub fn name(&self) -> Option<Cow<'_, str>> {
        self.text("name")
    }

    /// Page title (`File:...`).
    #[must_use]
    pub fn title(&self) -> Option<Cow<'_, str>> {
        self.text("title")
    }

    /// The name used for the on-disk file: `name`, else `title`.
    #[must_use]
    pub fn file_name(&self) -> Option<Cow<'_, str>> {
        self.name().or_else(|| self.title())
    }

    /// The content hash.
    #[must_use]
    pub fn sha1(&self) -> Option<Cow<'_, str>> {
        self.text("sha1")
    }

    /// The recorded failure marker, whatever its shape.
    #[must_use]
    pub fn failure(&self) -> Option<&Value> {
        self.fields.get("failure").filter(|value| !value.is_null())
    }

    /// Whether a permanent failure has been recorded. Present means "never retry".
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failure().is_some()
    }

    /// Records the not-found marker.
    pub fn mark_not_found(&mut self) {
        self.set("failure", NOT_FOUND_MARKER);
    }

    /// Pretty JSON with keys sorted, for operator-facing abort reports.
    #[must_use]
    pub fn to_report_json(&self) -> String {
        let sorted: BTreeMap<&str, &Value> = self
            .fields
            .iter()
            .map(|(key, value)| (key.as_str(), value))
            .collect();
        serde_json::to_string_pretty(&sorted).unwrap_or_else(|_| format!("{self:?}"))
    }

    /// Scalars as text; empty strings, null and containers count as absent.
    fn text(&self, key: &str) -> Option<Cow<'_, str>> {
        match self.fields.get(key)? {
            Value::String(text) if !text.is_empty() => Some(Cow::Borrowed(text)),
            Value::Number(number) => Some(Cow::Owned(number.to_string())),
            Value::Bool(flag) => Some(Cow::Owned(flag.to_string())),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn from_json(value: Value) -> AssetDescriptor {
        serde_json::from_value(value).unwrap()
    }

    fn keys(descriptor: &AssetDescriptor) -> Vec<String> {
        match serde_json::to_value(descriptor).unwrap() {
            Value::Object(map) => map.keys().cloned().collect(),
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_descriptor_round_trips_unknown_fields() {
        let raw = r#"{"name":"a.png","size":123,"url":"https://x/a","mime":"image/png"}"#;
        let descriptor: AssetDescriptor = serde_json::from_str(raw).unwrap();
        assert_eq!(descriptor.url(), Some("https://x/a"));
        assert_eq!(descriptor.get("size"), Some(&Value::from(123)));

        let written = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(written["mime"], "image/png");
        assert_eq!(written["size"], 123);
        assert!(written.get("failure").is_none());
    }

    #[test]
    fn test_mark_not_found_keeps_field_order_and_appends_marker() {
        let mut descriptor = from_json(json!({
            "name": "a.png", "size": 1, "url": "https://x/a",
            "sha1": "ff", "mime": "image/png", "title": "File:A.png"
        }));
        descriptor.mark_not_found();

        assert_eq!(
            keys(&descriptor),
            ["name", "size", "url", "sha1", "mime", "title", "failure"]
        );
        assert_eq!(serde_json::to_value(&descriptor).unwrap()["failure"], 404);
        assert!(descriptor.is_failed());
    }

    #[test]
    fn test_set_existing_key_keeps_position() {
        let mut descriptor = from_json(json!({"failure": null, "url": "https://x/a"}));
        descriptor.mark_not_found();
        assert_eq!(keys(&descriptor), ["failure", "url"]);
    }

    #[test]
    fn test_any_non_null_failure_marker_counts() {
        for marker in [json!("gone"), json!(true), json!(70_000), json!({"why": "x"})] {
            let descriptor = from_json(json!({"url": "https://x/a", "failure": marker}));
            assert!(descriptor.is_failed(), "marker {marker} should count");
        }
        let cleared = from_json(json!({"url": "https://x/a", "failure": null}));
        assert!(!cleared.is_failed());
        assert!(!AssetDescriptor::new("https://x/a", "a.png").is_failed());
    }

    #[test]
    fn test_scalar_names_are_stringified() {
        let descriptor = from_json(json!({"name": 42, "sha1": "", "title": false}));
        assert_eq!(descriptor.file_name().as_deref(), Some("42"));
        assert_eq!(descriptor.sha1(), None);
        assert_eq!(descriptor.title().as_deref(), Some("false"));
    }

    #[test]
    fn test_file_name_falls_back_to_title_then_none() {
        let descriptor = from_json(json!({"name": "", "title": "File:Emilia.png"}));
        assert_eq!(descriptor.file_name().as_deref(), Some("File:Emilia.png"));
        assert_eq!(AssetDescriptor::default().file_name(), None);
    }

    #[test]
    fn test_empty_or_non_string_url_is_absent() {
        assert_eq!(from_json(json!({"url": ""})).url(), None);
        assert_eq!(from_json(json!({"url": 7})).url(), None);
    }

    #[test]
    fn test_non_object_entry_is_rejected() {
        assert!(serde_json::from_value::<AssetDescriptor>(json!("a.png")).is_err());
    }

    #[test]
    fn test_report_json_sorts_keys() {
        let raw = r#"{"url":"https://x/a","name":"a.png","comment":"c"}"#;
        let descriptor: AssetDescriptor = serde_json::from_str(raw).unwrap();
        let report = descriptor.to_report_json();
        let comment = report.find("\"comment\"").unwrap();
        let name = report.find("\"name\"").unwrap();
        let url = report.find("\"url\"").unwrap();
        assert!(comment < name && name < url, "keys not sorted: {report}");
    }
}
