//! The unit of retrieval and its relevance breakdown.

use super::{ItemType, Source};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Metadata key flagging that `timestamp` is observation time, not source time.
pub const TIMESTAMP_OBSERVED_KEY: &str = "timestamp_observed";

/// Metadata key listing the items folded into a deduplicated survivor.
pub const MERGED_FROM_KEY: &str = "merged_from";

/// Metadata key flagging that `content` was cut short by the adapter.
pub const TRUNCATED_KEY: &str = "truncated";

/// Identity of an item across the whole query: `(source, id)`.
///
/// Orders by source tie-break order, then by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    /// Source that produced the item.
    pub source: Source,
    /// Identifier, unique within `source`.
    pub id: String,
}

impl ItemKey {
    /// Creates a new key.
    #[must_use]
    pub fn new(source: Source, id: impl Into<String>) -> Self {
        Self {
            source,
            id: id.into(),
        }
    }
}

/// Reference to an item that was merged into a survivor during deduplication.
pub type MergedFrom = ItemKey;

/// Per-item relevance components, each clamped to `[0.0, 1.0]`.
///
/// Constructed through [`Relevance::new`] or the `with_*` setters so the
/// range invariant holds for every instance. `NaN` inputs clamp to `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Relevance {
    recency: f32,
    frequency: f32,
    source_quality: f32,
    semantic_score: f32,
}

impl Relevance {
    /// Creates a relevance record, clamping every component.
    #[must_use]
    pub fn new(semantic_score: f32, recency: f32, source_quality: f32, frequency: f32) -> Self {
        Self {
            recency: unit(recency),
            frequency: unit(frequency),
            source_quality: unit(source_quality),
            semantic_score: unit(semantic_score),
        }
    }

    /// Returns the recency component.
    #[must_use]
    pub const fn recency(&self) -> f32 {
        self.recency
    }

    /// Returns the query-term frequency component.
    #[must_use]
    pub const fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Returns the source quality component.
    #[must_use]
    pub const fn source_quality(&self) -> f32 {
        self.source_quality
    }

    /// Returns the adapter-reported semantic score.
    #[must_use]
    pub const fn semantic_score(&self) -> f32 {
        self.semantic_score
    }

    /// Sets the semantic score.
    #[must_use]
    pub fn with_semantic_score(mut self, value: f32) -> Self {
        self.semantic_score = unit(value);
        self
    }

    /// Sets the recency component.
    #[must_use]
    pub fn with_recency(mut self, value: f32) -> Self {
        self.recency = unit(value);
        self
    }

    /// Sets the source quality component.
    #[must_use]
    pub fn with_source_quality(mut self, value: f32) -> Self {
        self.source_quality = unit(value);
        self
    }

    /// Sets the frequency component.
    #[must_use]
    pub fn with_frequency(mut self, value: f32) -> Self {
        self.frequency = unit(value);
        self
    }
}

fn unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// One retrieved item from one source.
///
/// `source` and `id` are fixed at construction; everything else may be
/// filled in by the adapter and the scoring stages before the aggregator
/// hands the item back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    id: String,
    source: Source,
    /// Content kind.
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// Retrievable text, possibly truncated.
    pub content: String,
    /// Optional display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Creation or last-modification time at the source.
    pub timestamp: DateTime<Utc>,
    /// Source-specific extras.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Canonical entity names found in `content`.
    #[serde(default)]
    pub entities: BTreeSet<String>,
    /// Labels carried from the source.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Relevance breakdown.
    #[serde(default)]
    pub relevance: Relevance,
}

impl ContextItem {
    /// Creates an item with empty metadata, entities, tags, and relevance.
    #[must_use]
    pub fn new(
        source: Source,
        id: impl Into<String>,
        item_type: ItemType,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            source,
            item_type,
            content: content.into(),
            title: None,
            timestamp,
            metadata: Map::new(),
            entities: BTreeSet::new(),
            tags: Vec::new(),
            relevance: Relevance::default(),
        }
    }

    /// Returns the identifier (unique within the source).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the producing source.
    #[must_use]
    pub const fn source(&self) -> Source {
        self.source
    }

    /// Returns the cross-source identity of this item.
    #[must_use]
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.source, self.id.clone())
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Inserts one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets the adapter-reported semantic score.
    #[must_use]
    pub fn with_semantic_score(mut self, score: f32) -> Self {
        self.relevance = self.relevance.with_semantic_score(score);
        self
    }

    /// Marks the timestamp as substituted observation time.
    #[must_use]
    pub fn with_observed_timestamp(self) -> Self {
        self.with_metadata(TIMESTAMP_OBSERVED_KEY, true)
    }

    /// Returns true when the timestamp is observation time.
    #[must_use]
    pub fn timestamp_observed(&self) -> bool {
        self.metadata
            .get(TIMESTAMP_OBSERVED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Returns the items merged into this one, sorted by `(source, id)`.
    ///
    /// Empty for items that absorbed nothing.
    #[must_use]
    pub fn merged_from(&self) -> Vec<MergedFrom> {
        self.metadata
            .get(MERGED_FROM_KEY)
            .and_then(|value| serde_json::from_value::<Vec<MergedFrom>>(value.clone()).ok())
            .unwrap_or_default()
    }

    /// Replaces the `merged_from` list, keeping it sorted and unique.
    pub fn set_merged_from(&mut self, mut merged: Vec<MergedFrom>) {
        merged.sort();
        merged.dedup();
        if merged.is_empty() {
            self.metadata.remove(MERGED_FROM_KEY);
            return;
        }
        let value = Value::Array(
            merged
                .iter()
                .map(|key| {
                    let mut entry = Map::new();
                    entry.insert("source".to_string(), Value::from(key.source.as_str()));
                    entry.insert("id".to_string(), Value::from(key.id.as_str()));
                    Value::Object(entry)
                })
                .collect(),
        );
        self.metadata.insert(MERGED_FROM_KEY.to_string(), value);
    }

    /// Returns every source this item speaks for: its own plus merged ones.
    #[must_use]
    pub fn covered_sources(&self) -> BTreeSet<Source> {
        let mut sources: BTreeSet<Source> =
            self.merged_from().into_iter().map(|key| key.source).collect();
        sources.insert(self.source);
        sources
    }

    /// Returns the title and content joined for term matching.
    #[must_use]
    pub fn searchable_text(&self) -> String {
        match &self.title {
            Some(title) => format!("{title}\n{}", self.content),
            None => self.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(source: Source, id: &str) -> ContextItem {
        ContextItem::new(source, id, ItemType::Note, "body", Utc::now())
    }

    #[test]
    fn test_relevance_clamps_components() {
        let r = Relevance::new(1.5, -0.2, f32::NAN, 0.4);
        assert!((r.semantic_score() - 1.0).abs() < f32::EPSILON);
        assert!(r.recency().abs() < f32::EPSILON);
        assert!(r.source_quality().abs() < f32::EPSILON);
        assert!((r.frequency() - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn test_merged_from_round_trip_sorted() {
        let mut survivor = item(Source::Notes, "a.md");
        survivor.set_merged_from(vec![
            ItemKey::new(Source::RemoteKnowledgeBase, "kb-2"),
            ItemKey::new(Source::VersionControl, "abc123"),
            ItemKey::new(Source::VersionControl, "abc123"),
        ]);

        let merged = survivor.merged_from();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].source, Source::VersionControl);
        assert_eq!(merged[1].id, "kb-2");

        let json = serde_json::to_value(&survivor).unwrap();
        assert_eq!(json["metadata"]["merged_from"][0]["source"], "version_control");
        assert_eq!(json["metadata"]["merged_from"][1]["source"], "remote");
    }

    #[test]
    fn test_empty_merged_from_removes_key() {
        let mut survivor = item(Source::Notes, "a.md");
        survivor.set_merged_from(vec![ItemKey::new(Source::VersionControl, "x")]);
        survivor.set_merged_from(Vec::new());
        assert!(!survivor.metadata.contains_key(MERGED_FROM_KEY));
    }

    #[test]
    fn test_covered_sources_includes_merged() {
        let mut survivor = item(Source::VersionControl, "abc");
        assert_eq!(survivor.covered_sources().len(), 1);
        survivor.set_merged_from(vec![ItemKey::new(Source::Notes, "n.md")]);
        let covered = survivor.covered_sources();
        assert!(covered.contains(&Source::Notes));
        assert!(covered.contains(&Source::VersionControl));
    }

    #[test]
    fn test_observed_timestamp_flag() {
        let plain = item(Source::Notes, "a.md");
        assert!(!plain.timestamp_observed());
        assert!(plain.with_observed_timestamp().timestamp_observed());
    }

    #[test]
    fn test_serializes_type_field() {
        let json = serde_json::to_value(item(Source::Notes, "a.md")).unwrap();
        assert_eq!(json["type"], "note");
        assert_eq!(json["source"], "notes");
        assert!(json.get("title").is_none());
    }
}
