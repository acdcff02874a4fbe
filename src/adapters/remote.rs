//! Remote knowledge-base adapter.
//!
//! Talks JSON over HTTP to a knowledge-base service:
//!
//! | Call | Request |
//! |------|---------|
//! | search | `POST {url}/search` with `{query, limit, search_type: "hybrid", namespace?}` |
//! | recent | `GET {url}/items/recent?hours=&limit=`, falling back to a broad search on 404 |
//! | item | `GET {url}/items/{id}`, 404 meaning absent |
//! | namespaces | `GET {url}/namespaces` |
//! | health | `GET {url}/health` |
//!
//! Responses may wrap records in `results` or `items`, or be a bare array.
//! Record fields are read through aliases since services disagree on names.

use super::{AdapterError, window_start};
use crate::config::RemoteSourceConfig;
use crate::models::{ContextItem, HealthStatus, ItemType, Source, TRUNCATED_KEY};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value, json};
use std::time::{Duration, Instant};

const ID_FIELDS: &[&str] = &["id", "_id"];
const CONTENT_FIELDS: &[&str] = &["content", "text"];
const TITLE_FIELDS: &[&str] = &["title", "name"];
const TIMESTAMP_FIELDS: &[&str] = &["created_at", "timestamp", "date", "modified_at"];
const SCORE_FIELDS: &[&str] = &["score", "relevance_score"];
const NAMESPACE_FIELDS: &[&str] = &["namespace", "category"];

/// Adapter over an HTTP knowledge-base service.
#[derive(Debug, Clone)]
pub struct RemoteKbAdapter {
    config: RemoteSourceConfig,
    client: reqwest::Client,
    timeout: Duration,
}

impl RemoteKbAdapter {
    /// Creates an adapter with a 2 second call budget.
    #[must_use]
    pub fn new(config: RemoteSourceConfig) -> Self {
        let client = build_http_client(Duration::from_millis(config.connect_timeout_ms));
        Self {
            config,
            client,
            timeout: Duration::from_secs(2),
        }
    }

    /// Sets the call budget.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the call budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.url.trim_end_matches('/'))
    }

    /// Runs a hybrid search against the service.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Timeout`] when the request times out,
    /// [`AdapterError::Malformed`] for unparseable bodies, and
    /// [`AdapterError::Unavailable`] otherwise.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<ContextItem>, AdapterError> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let mut body = json!({
            "query": query,
            "limit": limit,
            "search_type": "hybrid",
        });
        if let Some(namespace) = &self.config.namespace {
            body["namespace"] = Value::String(namespace.clone());
        }

        let start = Instant::now();
        let response = self
            .client
            .post(self.endpoint("search"))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(&e, start))?;
        let records = read_records(response, start).await?;

        let mut items: Vec<ContextItem> = records
            .iter()
            .filter_map(|r| self.to_item(r))
            .collect();
        items.truncate(limit);
        Ok(items)
    }

    /// Returns items created within `window`, newest first.
    ///
    /// # Errors
    ///
    /// Same as [`RemoteKbAdapter::search`].
    pub async fn get_recent(
        &self,
        window: Duration,
        limit: usize,
    ) -> Result<Vec<ContextItem>, AdapterError> {
        let hours = window.as_secs().div_ceil(3_600).max(1);
        let start = Instant::now();
        let response = self
            .client
            .get(self.endpoint("items/recent"))
            .timeout(self.timeout)
            .query(&[("hours", hours.to_string()), ("limit", limit.to_string())])
            .send()
            .await
            .map_err(|e| request_error(&e, start))?;

        let records = if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!("Recent endpoint missing, falling back to broad search");
            self.recent_fallback(limit, start).await?
        } else {
            read_records(response, start).await?
        };

        let cutoff = window_start(window);
        let mut items: Vec<ContextItem> = records
            .iter()
            .filter_map(|r| self.to_item(r))
            .filter(|item| item.timestamp >= cutoff)
            .collect();
        items.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.id().cmp(b.id()))
        });
        items.truncate(limit);
        Ok(items)
    }

    async fn recent_fallback(&self, limit: usize, start: Instant) -> Result<Vec<Value>, AdapterError> {
        let body = json!({
            "query": "*",
            "limit": limit,
            "sort_by": "created_at",
            "sort_order": "desc",
        });
        let response = self
            .client
            .post(self.endpoint("search"))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(&e, start))?;
        read_records(response, start).await
    }

    /// Fetches one item by id. `None` when the service answers 404.
    ///
    /// A record that omits its id is given the requested one.
    ///
    /// # Errors
    ///
    /// Same as [`RemoteKbAdapter::search`].
    pub async fn get_item(&self, id: &str) -> Result<Option<ContextItem>, AdapterError> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(None);
        }
        let mut url =
            reqwest::Url::parse(&self.endpoint("items")).map_err(|e| AdapterError::Unavailable {
                adapter: Source::RemoteKnowledgeBase,
                reason: format!("invalid service url: {e}"),
            })?;
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id);
        }

        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| request_error(&e, start))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = read_body(response, start).await?;
        let record = item_record(body, id)?;
        Ok(self.to_item(&record))
    }

    /// Lists the namespaces the service knows about, in service order.
    ///
    /// # Errors
    ///
    /// Same as [`RemoteKbAdapter::search`].
    pub async fn get_namespaces(&self) -> Result<Vec<String>, AdapterError> {
        let start = Instant::now();
        let response = self
            .client
            .get(self.endpoint("namespaces"))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| request_error(&e, start))?;
        extract_namespaces(read_body(response, start).await?)
    }

    /// Probes `GET {url}/health`.
    pub async fn health_check(&self) -> HealthStatus {
        let start = Instant::now();
        match self
            .client
            .get(self.endpoint("health"))
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => HealthStatus::Ok,
            Ok(response) => HealthStatus::Degraded(format!("health endpoint returned {}", response.status())),
            Err(e) => request_error(&e, start).to_health(),
        }
    }

    /// Maps one service record onto a context item; records without an id
    /// are skipped.
    fn to_item(&self, record: &Value) -> Option<ContextItem> {
        let Some(obj) = record.as_object() else {
            tracing::debug!("Skipping non-object remote record");
            return None;
        };
        let id = match first_field(obj, ID_FIELDS)? {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };

        let raw_content = first_str(obj, CONTENT_FIELDS).unwrap_or_default();
        let (content, truncated) = truncate_chars(raw_content, self.config.max_content_chars);
        let parsed_timestamp = first_str(obj, TIMESTAMP_FIELDS).and_then(parse_timestamp);
        let native_score = first_field(obj, SCORE_FIELDS).and_then(Value::as_f64);
        #[allow(clippy::cast_possible_truncation)]
        let score = native_score.map_or(0.0, |s| self.config.score_scale.normalize(s as f32));

        let mut item = ContextItem::new(
            Source::RemoteKnowledgeBase,
            id,
            ItemType::KbArticle,
            content,
            parsed_timestamp.unwrap_or_else(Utc::now),
        )
        .with_semantic_score(score);
        if parsed_timestamp.is_none() {
            item = item.with_observed_timestamp();
        }
        if let Some(title) = first_str(obj, TITLE_FIELDS).filter(|t| !t.is_empty()) {
            item = item.with_title(title);
        }
        if let Some(namespace) = first_field(obj, NAMESPACE_FIELDS).filter(|v| !v.is_null()) {
            item = item.with_metadata("namespace", namespace.clone());
        }
        if let Some(native) = native_score {
            item = item.with_metadata("native_score", native);
        }
        if let Some(url) = obj.get("url").filter(|v| !v.is_null()) {
            item = item.with_metadata("url", url.clone());
        }
        if truncated {
            item = item.with_metadata(TRUNCATED_KEY, true);
        }
        if let Some(Value::Array(tags)) = obj.get("tags") {
            item = item.with_tags(tags.iter().filter_map(|t| t.as_str().map(str::to_string)).collect());
        }
        Some(item)
    }
}

/// Builds the shared HTTP client; request budgets are set per call.
fn build_http_client(connect_timeout: Duration) -> reqwest::Client {
    let mut builder = reqwest::Client::builder();
    if !connect_timeout.is_zero() {
        builder = builder.connect_timeout(connect_timeout);
    }
    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build remote knowledge-base HTTP client: {err}");
        reqwest::Client::new()
    })
}

fn request_error(e: &reqwest::Error, start: Instant) -> AdapterError {
    let adapter = Source::RemoteKnowledgeBase;
    if e.is_timeout() {
        return AdapterError::Timeout {
            adapter,
            elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
    }
    if e.is_decode() {
        return AdapterError::Malformed {
            adapter,
            reason: e.to_string(),
        };
    }
    let error_kind = if e.is_connect() {
        "connect"
    } else if e.is_request() {
        "request"
    } else if e.is_status() {
        "status"
    } else {
        "unknown"
    };
    AdapterError::Unavailable {
        adapter,
        reason: format!("{error_kind} error: {e}"),
    }
}

/// Checks the status and decodes the JSON body.
async fn read_body(response: reqwest::Response, start: Instant) -> Result<Value, AdapterError> {
    let status = response.status();
    if !status.is_success() {
        return Err(AdapterError::Unavailable {
            adapter: Source::RemoteKnowledgeBase,
            reason: format!("HTTP {status}"),
        });
    }
    response.json().await.map_err(|e| request_error(&e, start))
}

/// Checks the status and pulls the record list out of the body.
async fn read_records(response: reqwest::Response, start: Instant) -> Result<Vec<Value>, AdapterError> {
    extract_records(read_body(response, start).await?)
}

/// Unwraps an optional `item` envelope and fills in a missing id.
fn item_record(body: Value, id: &str) -> Result<Value, AdapterError> {
    let mut record = match body {
        Value::Object(mut obj) if obj.get("item").is_some_and(Value::is_object) => {
            obj.remove("item").unwrap_or(Value::Null)
        },
        other => other,
    };
    if !record.is_object() {
        return Err(AdapterError::Malformed {
            adapter: Source::RemoteKnowledgeBase,
            reason: format!("expected an item object, got {record}"),
        });
    }
    if let Some(obj) = record.as_object_mut() {
        if first_field(obj, ID_FIELDS).is_none() {
            obj.insert("id".to_string(), Value::String(id.to_string()));
        }
    }
    Ok(record)
}

/// Accepts `{"namespaces": [...]}` or a bare array, of names or `{name}` objects.
fn extract_namespaces(body: Value) -> Result<Vec<String>, AdapterError> {
    let list = match body {
        Value::Array(list) => list,
        Value::Object(mut obj) => match obj.remove("namespaces") {
            Some(Value::Array(list)) => list,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(AdapterError::Malformed {
                    adapter: Source::RemoteKnowledgeBase,
                    reason: format!("expected a namespace list, got {other}"),
                });
            },
        },
        other => {
            return Err(AdapterError::Malformed {
                adapter: Source::RemoteKnowledgeBase,
                reason: format!("unexpected response body: {other}"),
            });
        },
    };
    Ok(list
        .iter()
        .filter_map(|entry| match entry {
            Value::String(name) => Some(name.as_str()),
            Value::Object(obj) => first_str(obj, TITLE_FIELDS),
            _ => None,
        })
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect())
}

fn extract_records(body: Value) -> Result<Vec<Value>, AdapterError> {
    match body {
        Value::Array(records) => Ok(records),
        Value::Object(mut obj) => match obj.remove("results").or_else(|| obj.remove("items")) {
            Some(Value::Array(records)) => Ok(records),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(AdapterError::Malformed {
                adapter: Source::RemoteKnowledgeBase,
                reason: format!("expected a record list, got {other}"),
            }),
        },
        other => Err(AdapterError::Malformed {
            adapter: Source::RemoteKnowledgeBase,
            reason: format!("unexpected response body: {other}"),
        }),
    }
}

fn first_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k).filter(|v| !v.is_null()))
}

fn first_str<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_str))
}

/// Accepts RFC 3339, naive date-times (taken as UTC), and plain dates.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn truncate_chars(content: &str, max_chars: usize) -> (String, bool) {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => (content[..idx].to_string(), true),
        None => (content.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ScoreScale;

    fn adapter(scale: ScoreScale) -> RemoteKbAdapter {
        let mut config = RemoteSourceConfig::new("http://127.0.0.1:1/").with_score_scale(scale);
        config.max_content_chars = 10;
        RemoteKbAdapter::new(config)
    }

    #[test]
    fn test_record_aliases() {
        let record = json!({
            "_id": 42,
            "text": "OAuth token refresh flow",
            "name": "Auth guide",
            "timestamp": "2026-01-20T10:00:00Z",
            "relevance_score": 0.5,
            "category": "security"
        });
        let item = adapter(ScoreScale::Cosine).to_item(&record).unwrap();
        assert_eq!(item.id(), "42");
        assert_eq!(item.title.as_deref(), Some("Auth guide"));
        assert_eq!(item.content, "OAuth toke");
        assert_eq!(item.metadata[TRUNCATED_KEY], true);
        assert_eq!(item.metadata["namespace"], "security");
        assert!((item.relevance.semantic_score() - 0.75).abs() < 1e-6);
        assert!(!item.timestamp_observed());
    }

    #[test]
    fn test_record_without_id_is_skipped() {
        assert!(adapter(ScoreScale::Unit).to_item(&json!({"content": "x"})).is_none());
        assert!(adapter(ScoreScale::Unit).to_item(&json!("x")).is_none());
    }

    #[test]
    fn test_missing_timestamp_is_observed() {
        let item = adapter(ScoreScale::Unit).to_item(&json!({"id": "a"})).unwrap();
        assert!(item.timestamp_observed());
        assert!(item.relevance.semantic_score().abs() < f32::EPSILON);
        assert!(!item.metadata.contains_key(TRUNCATED_KEY));
    }

    #[test]
    fn test_bm25_scale() {
        let item = adapter(ScoreScale::Bm25 { saturation: 10.0 })
            .to_item(&json!({"id": "a", "score": 30.0}))
            .unwrap();
        assert!((item.relevance.semantic_score() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_extract_records_envelopes() {
        assert_eq!(extract_records(json!({"results": [1, 2]})).unwrap().len(), 2);
        assert_eq!(extract_records(json!({"items": [1]})).unwrap().len(), 1);
        assert_eq!(extract_records(json!([1, 2, 3])).unwrap().len(), 3);
        assert!(extract_records(json!({})).unwrap().is_empty());
        assert!(matches!(
            extract_records(json!({"results": "nope"})),
            Err(AdapterError::Malformed { .. })
        ));
        assert!(extract_records(json!(7)).is_err());
    }

    #[test]
    fn test_item_record_envelope_and_missing_id() {
        let wrapped = item_record(json!({"item": {"id": "kb-1", "content": "x"}}), "other").unwrap();
        assert_eq!(wrapped["id"], "kb-1");

        let bare = item_record(json!({"content": "x"}), "kb-9").unwrap();
        assert_eq!(bare["id"], "kb-9");
        let item = adapter(ScoreScale::Unit).to_item(&bare).unwrap();
        assert_eq!(item.id(), "kb-9");

        assert!(matches!(
            item_record(json!(["x"]), "kb-1"),
            Err(AdapterError::Malformed { .. })
        ));
    }

    #[test]
    fn test_extract_namespaces() {
        assert_eq!(
            extract_namespaces(json!({"namespaces": ["security", " ", {"name": "infra"}, 3]})).unwrap(),
            vec!["security".to_string(), "infra".to_string()]
        );
        assert_eq!(extract_namespaces(json!(["a"])).unwrap(), vec!["a".to_string()]);
        assert!(extract_namespaces(json!({})).unwrap().is_empty());
        assert!(extract_namespaces(json!({"namespaces": "security"})).is_err());
        assert!(extract_namespaces(json!("security")).is_err());
    }

    #[tokio::test]
    async fn test_lookups_without_a_service() {
        assert!(adapter(ScoreScale::Unit).get_item("  ").await.unwrap().is_none());
        assert!(adapter(ScoreScale::Unit).get_namespaces().await.is_err());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2026-01-20T10:00:00+02:00").is_some());
        assert!(parse_timestamp("2026-01-20T10:00:00.123").is_some());
        assert!(parse_timestamp("2026-01-20 10:00:00").is_some());
        assert_eq!(
            parse_timestamp("2026-01-20").unwrap().to_rfc3339(),
            "2026-01-20T00:00:00+00:00"
        );
        assert!(parse_timestamp("last tuesday").is_none());
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("héllo wörld", 4), ("héll".to_string(), true));
        assert_eq!(truncate_chars("abc", 3), ("abc".to_string(), false));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        let err = adapter(ScoreScale::Unit).search("oauth", 5).await.unwrap_err();
        assert!(matches!(err, AdapterError::Unavailable { .. } | AdapterError::Timeout { .. }));
        assert!(!adapter(ScoreScale::Unit).health_check().await.is_ok());
    }
}
