//! Deduplication configuration.

use crate::{Error, Result};

/// Configuration for the cross-source deduplicator.
///
/// | Option | Default | Description |
/// |--------|---------|-------------|
/// | `threshold` | `0.6` | Minimum Jaccard similarity for a merge |
/// | `shingle_size` | `3` | Words per shingle |
///
/// # Example
///
/// ```rust
/// use ctxfuse::services::DeduplicationConfig;
///
/// let config = DeduplicationConfig::default().with_threshold(0.8);
/// assert_eq!(config.shingle_size, 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeduplicationConfig {
    /// Minimum Jaccard similarity for two items to be merged.
    pub threshold: f32,
    /// Number of consecutive words per shingle.
    pub shingle_size: usize,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            shingle_size: 3,
        }
    }
}

impl DeduplicationConfig {
    /// Builder method to set the similarity threshold.
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Builder method to set the shingle size.
    #[must_use]
    pub const fn with_shingle_size(mut self, size: usize) -> Self {
        self.shingle_size = size;
        self
    }

    /// Checks `threshold` is in `(0, 1]` and `shingle_size` is at least 1.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the offending option.
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(Error::Configuration(format!(
                "dedup.threshold must be within (0, 1], got {}",
                self.threshold
            )));
        }
        if self.shingle_size == 0 {
            return Err(Error::Configuration(
                "dedup.shingle_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(DeduplicationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_threshold_and_shingle() {
        assert!(
            DeduplicationConfig::default()
                .with_threshold(0.0)
                .validate()
                .is_err()
        );
        assert!(
            DeduplicationConfig::default()
                .with_threshold(1.2)
                .validate()
                .is_err()
        );
        assert!(
            DeduplicationConfig::default()
                .with_shingle_size(0)
                .validate()
                .is_err()
        );
    }
}
