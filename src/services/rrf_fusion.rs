//! Reciprocal Rank Fusion (RRF) across per-source result lists.
//!
//! RRF is a rank aggregation technique that combines ranked lists from
//! multiple retrieval systems without requiring score normalization. Each
//! source reports scores on its own scale (filename match, commit term
//! frequency, remote cosine similarity); only rank position is used here.
//!
//! # Algorithm
//!
//! For each item `d` appearing in ranking `r`:
//!
//! ```text
//! RRF_score(d) = sum(1 / (k + rank_r(d)))
//! ```
//!
//! Where:
//! - `k` = 60 (standard constant, prevents division by zero and dampens high ranks)
//! - `rank_r(d)` = position of item `d` in ranking `r` (1-indexed)
//!
//! Items are identified by `(source, id)`. After deduplication a merged
//! survivor appears in every list one of its members appeared in, so its
//! contributions add up.
//!
//! # Ordering
//!
//! | Key | Direction |
//! |-----|-----------|
//! | fused score | descending |
//! | composite relevance | descending |
//! | source | `Notes` < `VersionControl` < `RemoteKnowledgeBase` |
//! | id | ascending |
//!
//! The last two keys make the order total, so the output does not depend on
//! the order the input lists were collected in.
//!
//! # References
//!
//! - Cormack, G. V., Clarke, C. L., & Buettcher, S. (2009). "Reciprocal Rank Fusion
//!   outperforms Condorcet and individual Rank Learning Methods"

use crate::models::{ContextItem, ItemKey};
use crate::{Error, Result};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Configuration for RRF fusion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RrfConfig {
    /// The k constant for RRF scoring (default: 60).
    ///
    /// Higher values dampen the contribution of top-ranked items.
    pub k: f32,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self { k: 60.0 }
    }
}

impl RrfConfig {
    /// Sets the k constant.
    #[must_use]
    pub const fn with_k(mut self, k: f32) -> Self {
        self.k = k;
        self
    }

    /// Rejects non-positive or non-finite `k`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when `k <= 0`.
    pub fn validate(&self) -> Result<()> {
        if self.k.is_finite() && self.k > 0.0 {
            Ok(())
        } else {
            Err(Error::Configuration(format!(
                "fusion.rrf_k must be a positive number, got {}",
                self.k
            )))
        }
    }
}

/// An item with its fused score and the composite relevance used for ties.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedItem {
    /// The fused item.
    pub item: ContextItem,
    /// Sum of reciprocal-rank contributions.
    pub score: f32,
    /// Composite relevance, first tie-break.
    pub composite: f32,
}

/// Reciprocal Rank Fusion combiner for per-source result lists.
///
/// # Example
///
/// ```ignore
/// use ctxfuse::services::RrfFusion;
///
/// let fusion = RrfFusion::new();
/// let fused = fusion.fuse(&[notes_hits, git_hits], |item| scorer.composite(item));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RrfFusion {
    config: RrfConfig,
}

impl RrfFusion {
    /// Creates a new RRF fusion combiner with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new RRF fusion combiner with the specified configuration.
    #[must_use]
    pub const fn with_config(config: RrfConfig) -> Self {
        Self { config }
    }

    /// Returns the contribution of a 1-indexed rank.
    #[must_use]
    pub fn contribution(&self, rank: usize) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let rank = rank as f32;
        1.0 / (self.config.k + rank)
    }

    /// Fuses any number of ranked lists.
    ///
    /// `composite` supplies the relevance used to break score ties. If the
    /// same `(source, id)` occurs twice within one list only its first
    /// (best) position counts.
    ///
    /// # Algorithm
    ///
    /// ```text
    /// Notes:  [A@1, B@2]
    /// Git:    [B@1, C@2]
    ///
    /// RRF scores (k=60):
    /// - A: 1/61          = 0.01639
    /// - B: 1/62 + 1/61   = 0.03252  (in both!)
    /// - C: 1/62          = 0.01613
    ///
    /// Final ranking: [B, A, C]
    /// ```
    #[must_use]
    pub fn fuse<F>(&self, result_lists: &[Vec<ContextItem>], composite: F) -> Vec<FusedItem>
    where
        F: Fn(&ContextItem) -> f32,
    {
        let capacity: usize = result_lists.iter().map(Vec::len).sum();
        let mut scores: HashMap<ItemKey, (f32, &ContextItem)> = HashMap::with_capacity(capacity);

        for results in result_lists {
            let mut seen: HashSet<ItemKey> = HashSet::with_capacity(results.len());
            for (index, item) in results.iter().enumerate() {
                let key = item.key();
                if !seen.insert(key.clone()) {
                    continue;
                }
                let rrf_score = self.contribution(index + 1);
                scores
                    .entry(key)
                    .and_modify(|(s, _)| *s += rrf_score)
                    .or_insert((rrf_score, item));
            }
        }

        let mut fused: Vec<FusedItem> = scores
            .into_values()
            .map(|(score, item)| FusedItem {
                composite: composite(item),
                item: item.clone(),
                score,
            })
            .collect();

        fused.sort_by(compare_fused);
        fused
    }
}

/// Total order used for fused output.
#[must_use]
pub fn compare_fused(a: &FusedItem, b: &FusedItem) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.composite.total_cmp(&a.composite))
        .then_with(|| a.item.source().cmp(&b.item.source()))
        .then_with(|| a.item.id().cmp(b.item.id()))
}
