//! Source diversity cap on the head of the fused list.

use crate::models::{ContextItem, Source};
use crate::{Error, Result};
use std::collections::HashMap;

/// Configuration for [`DiversityInterleaver`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiversityConfig {
    /// Size of the head the cap applies to (default: 10).
    pub top_k: usize,
    /// Largest share of the head one source may hold (default: 0.7).
    pub max_source_share: f32,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            max_source_share: 0.7,
        }
    }
}

impl DiversityConfig {
    /// Maximum number of head slots one source may hold (at least 1).
    #[must_use]
    pub fn per_source_cap(&self) -> usize {
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let cap = (f64::from(self.max_source_share) * self.top_k as f64 + 1e-6).floor() as usize;
        cap.max(1)
    }

    /// Checks `top_k >= 1` and `max_source_share` in `(0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the offending option.
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::Configuration(
                "diversity.top_k must be at least 1".to_string(),
            ));
        }
        if !(self.max_source_share > 0.0 && self.max_source_share <= 1.0) {
            return Err(Error::Configuration(format!(
                "diversity.max_source_share must be within (0, 1], got {}",
                self.max_source_share
            )));
        }
        Ok(())
    }
}

/// Demotes items so no source holds more than its share of the top-K.
///
/// Walks the ranked list filling the head. An item whose source already
/// holds `per_source_cap` head slots is deferred; deferred items follow
/// the head in their original relative order, then the untouched tail.
/// When the input runs out before the head is full, deferred items simply
/// follow, so the cap only binds while other sources still have items.
#[derive(Debug, Clone, Default)]
pub struct DiversityInterleaver {
    config: DiversityConfig,
}

impl DiversityInterleaver {
    /// Creates an interleaver with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an interleaver with the given configuration.
    #[must_use]
    pub const fn with_config(config: DiversityConfig) -> Self {
        Self { config }
    }

    /// Reorders `items`, returning how many items were pushed behind a
    /// lower-ranked one.
    #[must_use]
    pub fn interleave(&self, items: Vec<ContextItem>) -> (Vec<ContextItem>, usize) {
        let top_k = self.config.top_k;
        let cap = self.config.per_source_cap();

        let mut head: Vec<ContextItem> = Vec::with_capacity(top_k.min(items.len()));
        let mut deferred: Vec<ContextItem> = Vec::new();
        let mut counts: HashMap<Source, usize> = HashMap::new();
        let mut rest = items.into_iter();
        let mut demoted = 0;

        while head.len() < top_k {
            let Some(item) = rest.next() else {
                break;
            };
            let count = counts.entry(item.source()).or_insert(0);
            if *count < cap {
                *count += 1;
                demoted = deferred.len();
                head.push(item);
            } else {
                deferred.push(item);
            }
        }

        head.extend(deferred);
        head.extend(rest);
        (head, demoted)
    }
}
