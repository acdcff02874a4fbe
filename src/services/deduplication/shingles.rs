//! Word shingling and Jaccard similarity.

use std::collections::HashSet;

/// Builds word n-gram sets from content.
///
/// # Normalization
///
/// Before shingling, content is normalized:
/// - Converted to lowercase
/// - Split on every non-alphanumeric character
///
/// So `"Fix: OAuth token-refresh"` and `"fix oauth token refresh"` produce
/// identical shingles. Content shorter than the shingle size falls back to
/// single-word shingles.
#[derive(Debug, Clone, Copy)]
pub struct Shingler {
    size: usize,
}

impl Shingler {
    /// Creates a shingler producing `size`-word shingles (at least 1).
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    /// Splits content into lowercase alphanumeric words.
    #[must_use]
    pub fn words(content: &str) -> Vec<String> {
        content
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect()
    }

    /// Returns the shingle set of `content`. Empty content yields an empty set.
    #[must_use]
    pub fn shingles(&self, content: &str) -> HashSet<String> {
        let words = Self::words(content);
        if words.len() < self.size {
            return words.into_iter().collect();
        }
        words.windows(self.size).map(|w| w.join(" ")).collect()
    }
}

/// Jaccard similarity of two sets; `0.0` when either is empty.
#[must_use]
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    #[allow(clippy::cast_precision_loss)]
    let similarity = intersection as f32 / union as f32;
    similarity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        let shingler = Shingler::new(3);
        assert_eq!(
            shingler.shingles("Fix: OAuth token-refresh"),
            shingler.shingles("fix oauth token refresh")
        );
    }

    #[test]
    fn test_shingle_count() {
        let shingles = Shingler::new(3).shingles("a b c d e");
        assert_eq!(shingles.len(), 3);
        assert!(shingles.contains("b c d"));
    }

    #[test]
    fn test_short_content_falls_back_to_words() {
        let shingles = Shingler::new(3).shingles("hotfix deploy");
        assert_eq!(shingles.len(), 2);
        assert!(shingles.contains("deploy"));
    }

    #[test]
    fn test_jaccard() {
        let shingler = Shingler::new(1);
        let a = shingler.shingles("alpha beta gamma");
        let b = shingler.shingles("beta gamma delta");
        assert!((jaccard(&a, &b) - 0.5).abs() < f32::EPSILON);
        assert!((jaccard(&a, &a) - 1.0).abs() < f32::EPSILON);
        assert!(jaccard(&a, &HashSet::new()).abs() < f32::EPSILON);
    }
}
