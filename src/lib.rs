//! # ctxfuse
//!
//! Cross-source fusion and ranking for personal knowledge.
//!
//! ctxfuse fans one query out to several independent knowledge sources (a
//! markdown note vault, git history, and a remote knowledge-base service),
//! then merges their separately ranked answers into one deduplicated,
//! relevance-ordered list.
//!
//! ## Pipeline
//!
//! ```text
//! query ──► ContextAggregator ──┬─► NotesAdapter   ─┐
//!                               ├─► GitAdapter     ─┤ (concurrent, per-adapter timeout)
//!                               └─► RemoteKbAdapter ─┘
//!                                          │
//!            entity tagging + local relevance scoring (per list)
//!                                          │
//!            Deduplicator ─► RrfFusion ─► DiversityInterleaver ─► results
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use ctxfuse::{ContextAggregator, FusionConfig};
//!
//! let config = FusionConfig::load_default();
//! let aggregator = ContextAggregator::from_config(&config)?;
//! let items = aggregator.search_all("oauth token refresh", None, 20).await;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod adapters;
pub mod config;
pub mod models;
pub mod observability;
pub mod services;

pub use adapters::{Adapter, AdapterError, GitAdapter, NotesAdapter, RemoteKbAdapter};
pub use config::FusionConfig;
pub use models::{ContextItem, EntityMention, HealthStatus, ItemType, Relevance, Source};
pub use services::{
    ContextAggregator, Deduplicator, DiversityInterleaver, EntityExtractor, RelevanceScorer,
    RrfFusion,
};

/// Error type for ctxfuse operations.
///
/// Adapter failures never surface here: they are absorbed at the adapter
/// boundary and turned into empty result lists. What remains are problems the
/// caller has to fix before any query can be answered.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Unknown source names, malformed front matter, missing notes or items on lookup |
/// | `Configuration` | No sources registered, weights outside `[0, 1]`, zero timeouts |
/// | `OperationFailed` | Config file I/O, logging initialisation |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The configuration cannot produce a working aggregator.
    ///
    /// Raised when:
    /// - No adapters are registered at all
    /// - A tunable is outside its documented range
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for ctxfuse operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("unknown source 'svn'".to_string());
        assert_eq!(err.to_string(), "invalid input: unknown source 'svn'");

        let err = Error::Configuration("no adapters registered".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: no adapters registered"
        );

        let err = Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: "not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "operation 'read_config_file' failed: not found"
        );
    }
}
