//! Local relevance scoring.
//!
//! Fills in the [`Relevance`] components of each item and computes the
//! composite score used as the first tie-break after fusion.
//!
//! | Component | Computed as |
//! |-----------|-------------|
//! | `semantic_score` | adapter-reported match score (already in `[0, 1]`) |
//! | `recency` | `exp(-age_days / half_life_days)` |
//! | `source_quality` | fixed per-source weight |
//! | `frequency` | query-term coverage of title and content |
//!
//! The composite is the weighted sum of the four components with the
//! weights from [`ScoringWeights`].

use crate::models::{ContextItem, Relevance, Source};
use crate::{Error, Result};
use chrono::{DateTime, Utc};

/// Seconds per day for age calculation.
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Weights of the composite relevance score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    /// Weight of the adapter-reported match score.
    pub semantic: f32,
    /// Weight of recency decay.
    pub recency: f32,
    /// Weight of the per-source trust multiplier.
    pub source_quality: f32,
    /// Weight of query-term coverage.
    pub frequency: f32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            semantic: 0.5,
            recency: 0.3,
            source_quality: 0.2,
            frequency: 0.0,
        }
    }
}

/// Fixed trust weight per source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceWeights {
    /// Personal notes.
    pub notes: f32,
    /// Commit history.
    pub version_control: f32,
    /// Remote knowledge base.
    pub remote: f32,
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            notes: 0.9,
            version_control: 0.7,
            remote: 0.8,
        }
    }
}

impl SourceWeights {
    /// Returns the weight for a source.
    #[must_use]
    pub const fn get(&self, source: Source) -> f32 {
        match source {
            Source::Notes => self.notes,
            Source::VersionControl => self.version_control,
            Source::RemoteKnowledgeBase => self.remote,
        }
    }
}

/// Configuration for [`RelevanceScorer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceConfig {
    /// Recency decay constant in days (default: 14).
    pub half_life_days: f64,
    /// Composite weights.
    pub weights: ScoringWeights,
    /// Per-source quality weights.
    pub source_weights: SourceWeights,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            half_life_days: 14.0,
            weights: ScoringWeights::default(),
            source_weights: SourceWeights::default(),
        }
    }
}

impl RelevanceConfig {
    /// Sets the recency decay constant.
    #[must_use]
    pub const fn with_half_life_days(mut self, days: f64) -> Self {
        self.half_life_days = days;
        self
    }

    /// Sets the composite weights.
    #[must_use]
    pub const fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Checks that every weight is in `[0, 1]` and the half-life is positive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the offending option.
    pub fn validate(&self) -> Result<()> {
        if !(self.half_life_days.is_finite() && self.half_life_days > 0.0) {
            return Err(Error::Configuration(format!(
                "scoring.half_life_days must be positive, got {}",
                self.half_life_days
            )));
        }
        let named = [
            ("scoring.weights.semantic", self.weights.semantic),
            ("scoring.weights.recency", self.weights.recency),
            ("scoring.weights.source_quality", self.weights.source_quality),
            ("scoring.weights.frequency", self.weights.frequency),
            ("scoring.source_weights.notes", self.source_weights.notes),
            (
                "scoring.source_weights.version_control",
                self.source_weights.version_control,
            ),
            ("scoring.source_weights.remote", self.source_weights.remote),
        ];
        for (name, value) in named {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Configuration(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Computes per-item relevance components and the composite score.
///
/// Holds no mutable state; one scorer can serve concurrent queries.
#[derive(Debug, Clone, Default)]
pub struct RelevanceScorer {
    config: RelevanceConfig,
}

impl RelevanceScorer {
    /// Creates a scorer with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scorer with the given configuration.
    #[must_use]
    pub const fn with_config(config: RelevanceConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &RelevanceConfig {
        &self.config
    }

    /// Recency decay for an item observed at `timestamp`.
    ///
    /// Future timestamps count as age zero.
    #[must_use]
    pub fn recency(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
        let age_secs = (now - timestamp).num_milliseconds().max(0);
        #[allow(clippy::cast_precision_loss)]
        let age_days = age_secs as f64 / 1_000.0 / SECONDS_PER_DAY;
        #[allow(clippy::cast_possible_truncation)]
        let decay = (-age_days / self.config.half_life_days).exp() as f32;
        decay.clamp(0.0, 1.0)
    }

    /// Query-term coverage of the item's title and content.
    ///
    /// Title phrase match 0.5 (else any term in title 0.2), content phrase
    /// match 0.3, plus 0.05 per query term found in content. Capped at 1.
    #[must_use]
    pub fn frequency(item: &ContextItem, query: &str) -> f32 {
        let query_lower = query.trim().to_lowercase();
        if query_lower.is_empty() {
            return 0.0;
        }
        let terms: Vec<&str> = query_lower.split_whitespace().collect();
        let mut boost = 0.0_f32;

        if let Some(title) = &item.title {
            let title_lower = title.to_lowercase();
            if title_lower.contains(&query_lower) {
                boost += 0.5;
            } else if terms.iter().any(|t| title_lower.contains(t)) {
                boost += 0.2;
            }
        }

        let content_lower = item.content.to_lowercase();
        if content_lower.contains(&query_lower) {
            boost += 0.3;
        }
        let matched = terms.iter().filter(|t| content_lower.contains(*t)).count();
        #[allow(clippy::cast_precision_loss)]
        let term_boost = matched as f32 * 0.05;
        boost += term_boost;

        boost.min(1.0)
    }

    /// Fills recency, source quality, and frequency; keeps the adapter's
    /// semantic score. Without a query the frequency component is zero.
    pub fn score(&self, item: &mut ContextItem, query: Option<&str>, now: DateTime<Utc>) {
        let recency = self.recency(item.timestamp, now);
        let quality = self.config.source_weights.get(item.source());
        let frequency = query.map_or(0.0, |q| Self::frequency(item, q));

        item.relevance = Relevance::new(
            item.relevance.semantic_score(),
            recency,
            quality,
            frequency,
        );
    }

    /// Scores every item of a list in place.
    pub fn score_all(&self, items: &mut [ContextItem], query: Option<&str>, now: DateTime<Utc>) {
        for item in items {
            self.score(item, query, now);
        }
    }

    /// Weighted sum of the item's relevance components.
    #[must_use]
    pub fn composite(&self, item: &ContextItem) -> f32 {
        let w = &self.config.weights;
        let r = &item.relevance;
        r.semantic_score() * w.semantic
            + r.recency() * w.recency
            + r.source_quality() * w.source_quality
            + r.frequency() * w.frequency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemType;
    use chrono::Duration;
    use test_case::test_case;

    fn item_at(source: Source, timestamp: DateTime<Utc>) -> ContextItem {
        ContextItem::new(source, "x", ItemType::Note, "OAuth token refresh flow", timestamp)
    }

    #[test_case(0, 1.0; "now")]
    #[test_case(14, (-1.0_f32).exp(); "one decay constant")]
    #[test_case(28, (-2.0_f32).exp(); "two decay constants")]
    fn test_recency_decay(age_days: i64, expected: f32) {
        let scorer = RelevanceScorer::new();
        let now = Utc::now();
        let recency = scorer.recency(now - Duration::days(age_days), now);
        assert!((recency - expected).abs() < 1e-4, "got {recency}");
    }

    #[test]
    fn test_recency_future_timestamp_is_one() {
        let scorer = RelevanceScorer::new();
        let now = Utc::now();
        assert!((scorer.recency(now + Duration::hours(3), now) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_recency_very_old_approaches_zero() {
        let scorer = RelevanceScorer::new();
        let now = Utc::now();
        let recency = scorer.recency(now - Duration::days(3_650), now);
        assert!((0.0..0.001).contains(&recency));
    }

    #[test]
    fn test_score_sets_source_quality() {
        let scorer = RelevanceScorer::new();
        let now = Utc::now();
        for (source, expected) in [
            (Source::Notes, 0.9),
            (Source::VersionControl, 0.7),
            (Source::RemoteKnowledgeBase, 0.8),
        ] {
            let mut item = item_at(source, now);
            scorer.score(&mut item, None, now);
            assert!((item.relevance.source_quality() - expected).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn test_score_keeps_semantic_score() {
        let scorer = RelevanceScorer::new();
        let now = Utc::now();
        let mut item = item_at(Source::Notes, now).with_semantic_score(0.42);
        scorer.score(&mut item, Some("oauth"), now);
        assert!((item.relevance.semantic_score() - 0.42).abs() < f32::EPSILON);
    }

    #[test]
    fn test_composite_default_weights() {
        let scorer = RelevanceScorer::new();
        let now = Utc::now();
        let mut item = item_at(Source::Notes, now).with_semantic_score(1.0);
        scorer.score(&mut item, None, now);
        // 1.0 * 0.5 + 1.0 * 0.3 + 0.9 * 0.2
        assert!((scorer.composite(&item) - 0.98).abs() < 1e-5);
    }

    #[test]
    fn test_frequency_title_and_content() {
        let now = Utc::now();
        let item = item_at(Source::Notes, now).with_title("OAuth token notes");

        // Title phrase 0.5 + content phrase 0.3 + 2 terms * 0.05
        let f = RelevanceScorer::frequency(&item, "oauth token");
        assert!((f - 0.9).abs() < 1e-5);

        // Title term 0.2 + 1 term * 0.05
        let f = RelevanceScorer::frequency(&item, "notes refresh");
        assert!((f - 0.25).abs() < 1e-5);

        assert!(RelevanceScorer::frequency(&item, "   ").abs() < f32::EPSILON);
    }

    #[test]
    fn test_validate() {
        assert!(RelevanceConfig::default().validate().is_ok());
        assert!(
            RelevanceConfig::default()
                .with_half_life_days(0.0)
                .validate()
                .is_err()
        );
        let weights = ScoringWeights {
            recency: -0.1,
            ..ScoringWeights::default()
        };
        assert!(
            RelevanceConfig::default()
                .with_weights(weights)
                .validate()
                .is_err()
        );
    }
}
