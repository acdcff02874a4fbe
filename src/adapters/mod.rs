//! Source adapters.
//!
//! Each adapter answers two questions against one knowledge source: "what
//! matches this query?" and "what changed recently?". Results come back as
//! [`ContextItem`]s carrying the source's own normalized match score in
//! `relevance.semantic_score`.
//!
//! Failures stop here. [`Adapter::search`] and [`Adapter::get_recent`] turn
//! every [`AdapterError`] into an empty list plus a warning and a metric, so
//! the aggregator never sees an adapter fault.
//!
//! | Adapter | Source | Backing store |
//! |---------|--------|---------------|
//! | [`NotesAdapter`] | `notes` | markdown vault on disk |
//! | [`GitAdapter`] | `version_control` | `git` subprocess over discovered repos |
//! | [`RemoteKbAdapter`] | `remote` | HTTP knowledge-base service |

mod frontmatter;
mod git;
mod notes;
mod remote;

pub use frontmatter::{FrontMatter, FrontMatterParser};
pub use git::{DiffSummary, GitAdapter};
pub use notes::{NoteDocument, NotesAdapter};
pub use remote::RemoteKbAdapter;

use crate::config::FusionConfig;
use crate::models::{ContextItem, HealthStatus, Source};
use crate::observability::current_request_id;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error as ThisError;

/// Failure inside one adapter call.
///
/// | Variant | Raised When | Health |
/// |---------|-------------|--------|
/// | `Unavailable` | Vault missing, `git` exits non-zero, connection refused | unavailable |
/// | `Timeout` | The call exceeds the per-adapter budget | unavailable |
/// | `Malformed` | The backend answers with something unparseable | degraded |
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum AdapterError {
    /// The backing store cannot be reached.
    #[error("{adapter} unavailable: {reason}")]
    Unavailable {
        /// Adapter that failed.
        adapter: Source,
        /// What went wrong.
        reason: String,
    },

    /// The call exceeded its time budget.
    #[error("{adapter} timed out after {elapsed_ms}ms")]
    Timeout {
        /// Adapter that failed.
        adapter: Source,
        /// Time spent before giving up.
        elapsed_ms: u64,
    },

    /// The backend answered with data that could not be parsed.
    #[error("{adapter} returned malformed data: {reason}")]
    Malformed {
        /// Adapter that failed.
        adapter: Source,
        /// Parse failure detail.
        reason: String,
    },
}

impl AdapterError {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "unavailable",
            Self::Timeout { .. } => "timeout",
            Self::Malformed { .. } => "malformed",
        }
    }

    /// Returns the adapter that failed.
    #[must_use]
    pub const fn adapter(&self) -> Source {
        match self {
            Self::Unavailable { adapter, .. }
            | Self::Timeout { adapter, .. }
            | Self::Malformed { adapter, .. } => *adapter,
        }
    }

    fn timeout(adapter: Source, start: Instant) -> Self {
        Self::Timeout {
            adapter,
            elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Maps the failure onto a health status.
    #[must_use]
    pub fn to_health(&self) -> HealthStatus {
        match self {
            Self::Malformed { .. } => HealthStatus::Degraded(self.to_string()),
            Self::Unavailable { .. } | Self::Timeout { .. } => {
                HealthStatus::Unavailable(self.to_string())
            },
        }
    }
}

/// Runs `call` within `budget`, turning an overrun into [`AdapterError::Timeout`].
pub(crate) async fn within<T, F>(
    adapter: Source,
    budget: Duration,
    call: F,
) -> std::result::Result<T, AdapterError>
where
    F: Future<Output = std::result::Result<T, AdapterError>>,
{
    let start = Instant::now();
    tokio::time::timeout(budget, call)
        .await
        .unwrap_or_else(|_| Err(AdapterError::timeout(adapter, start)))
}

/// Start of a look-back window ending now, saturating at the earliest time.
pub(crate) fn window_start(window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|delta| Utc::now().checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Native score scale of a remote service.
///
/// | Scale | Input range | Normalization |
/// |-------|-------------|---------------|
/// | `Unit` | `[0, 1]` | clamp |
/// | `Cosine` | `[-1, 1]` | `(s + 1) / 2` |
/// | `Bm25` | `[0, inf)` | `s / (s + saturation)` |
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ScoreScale {
    /// Scores already in `[0, 1]`.
    #[default]
    Unit,
    /// Cosine similarity in `[-1, 1]`.
    Cosine,
    /// Unbounded BM25 scores.
    Bm25 {
        /// Score that maps to 0.5.
        saturation: f32,
    },
}

impl ScoreScale {
    /// Default BM25 saturation point.
    pub const DEFAULT_BM25_SATURATION: f32 = 10.0;

    /// Parses `unit`, `cosine` or `bm25`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for unknown scale names.
    pub fn parse(name: &str, saturation: Option<f32>) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "unit" | "normalized" => Ok(Self::Unit),
            "cosine" => Ok(Self::Cosine),
            "bm25" => Ok(Self::Bm25 {
                saturation: saturation.unwrap_or(Self::DEFAULT_BM25_SATURATION),
            }),
            other => Err(Error::Configuration(format!(
                "unknown score scale '{other}' (expected unit, cosine, or bm25)"
            ))),
        }
    }

    /// Checks that a BM25 saturation point is positive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a non-positive saturation.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Bm25 { saturation } if !(*saturation > 0.0 && saturation.is_finite()) => {
                Err(Error::Configuration(format!(
                    "sources.remote.bm25_saturation must be positive, got {saturation}"
                )))
            },
            _ => Ok(()),
        }
    }

    /// Maps a native score into `[0, 1]`. Non-finite input maps to 0.
    #[must_use]
    pub fn normalize(&self, score: f32) -> f32 {
        if !score.is_finite() {
            return 0.0;
        }
        let normalized = match self {
            Self::Unit => score,
            Self::Cosine => (score + 1.0) / 2.0,
            Self::Bm25 { saturation } => {
                let score = score.max(0.0);
                score / (score + saturation)
            },
        };
        normalized.clamp(0.0, 1.0)
    }
}

/// One registered knowledge source.
///
/// The set of sources is closed, so adapters are an enum rather than trait
/// objects. Every call is bounded by the adapter's own timeout.
#[derive(Debug, Clone)]
pub enum Adapter {
    /// Markdown note vault.
    Notes(NotesAdapter),
    /// Git repositories under a discovery root.
    Git(GitAdapter),
    /// Remote knowledge-base service.
    RemoteKb(RemoteKbAdapter),
}

impl From<NotesAdapter> for Adapter {
    fn from(adapter: NotesAdapter) -> Self {
        Self::Notes(adapter)
    }
}

impl From<GitAdapter> for Adapter {
    fn from(adapter: GitAdapter) -> Self {
        Self::Git(adapter)
    }
}

impl From<RemoteKbAdapter> for Adapter {
    fn from(adapter: RemoteKbAdapter) -> Self {
        Self::RemoteKb(adapter)
    }
}

impl Adapter {
    /// Builds every adapter the configuration registers, in source order.
    #[must_use]
    pub fn from_config(config: &FusionConfig) -> Vec<Self> {
        let timeout = config.timeouts.adapter();
        let mut adapters = Vec::with_capacity(config.sources.count());
        if let Some(notes) = &config.sources.notes {
            adapters.push(NotesAdapter::new(&notes.path).with_timeout(timeout).into());
        }
        if let Some(git) = &config.sources.git {
            adapters.push(GitAdapter::new(&git.root).with_timeout(timeout).into());
        }
        if let Some(remote) = &config.sources.remote {
            adapters.push(RemoteKbAdapter::new(remote.clone()).with_timeout(timeout).into());
        }
        adapters
    }

    /// Returns the source this adapter answers for.
    #[must_use]
    pub const fn source(&self) -> Source {
        match self {
            Self::Notes(_) => Source::Notes,
            Self::Git(_) => Source::VersionControl,
            Self::RemoteKb(_) => Source::RemoteKnowledgeBase,
        }
    }

    /// Returns the adapter's name, which is its source label.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.source().as_str()
    }

    /// Returns the per-call time budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        match self {
            Self::Notes(a) => a.timeout(),
            Self::Git(a) => a.timeout(),
            Self::RemoteKb(a) => a.timeout(),
        }
    }

    /// Searches the source, surfacing failures.
    ///
    /// # Errors
    ///
    /// Returns an [`AdapterError`] when the backing store fails or the call
    /// exceeds its budget.
    pub async fn try_search(
        &self,
        query: &str,
        limit: usize,
    ) -> std::result::Result<Vec<ContextItem>, AdapterError> {
        let call = async {
            match self {
                Self::Notes(a) => a.search(query, limit).await,
                Self::Git(a) => a.search(query, limit).await,
                Self::RemoteKb(a) => a.search(query, limit).await,
            }
        };
        self.bounded(call).await
    }

    /// Lists items changed within `window`, surfacing failures.
    ///
    /// # Errors
    ///
    /// Returns an [`AdapterError`] when the backing store fails or the call
    /// exceeds its budget.
    pub async fn try_recent(
        &self,
        window: Duration,
        limit: usize,
    ) -> std::result::Result<Vec<ContextItem>, AdapterError> {
        let call = async {
            match self {
                Self::Notes(a) => a.get_recent(window, limit).await,
                Self::Git(a) => a.get_recent(window, limit).await,
                Self::RemoteKb(a) => a.get_recent(window, limit).await,
            }
        };
        self.bounded(call).await
    }

    /// Searches the source. Any failure yields an empty list.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<ContextItem> {
        let start = Instant::now();
        let result = self.try_search(query, limit).await;
        self.absorb("search", result, start)
    }

    /// Lists items changed within `window`. Any failure yields an empty list.
    pub async fn get_recent(&self, window: Duration, limit: usize) -> Vec<ContextItem> {
        let start = Instant::now();
        let result = self.try_recent(window, limit).await;
        self.absorb("get_recent", result, start)
    }

    /// Probes the backing store within the adapter's budget.
    pub async fn health_check(&self) -> HealthStatus {
        let probe = async {
            match self {
                Self::Notes(a) => a.health_check().await,
                Self::Git(a) => a.health_check().await,
                Self::RemoteKb(a) => a.health_check().await,
            }
        };
        let start = Instant::now();
        match tokio::time::timeout(self.timeout(), probe).await {
            Ok(status) => status,
            Err(_) => self.timeout_error(start).to_health(),
        }
    }

    async fn bounded<F>(&self, call: F) -> std::result::Result<Vec<ContextItem>, AdapterError>
    where
        F: Future<Output = std::result::Result<Vec<ContextItem>, AdapterError>>,
    {
        within(self.source(), self.timeout(), call).await
    }

    fn timeout_error(&self, start: Instant) -> AdapterError {
        AdapterError::timeout(self.source(), start)
    }

    fn absorb(
        &self,
        operation: &'static str,
        result: std::result::Result<Vec<ContextItem>, AdapterError>,
        start: Instant,
    ) -> Vec<ContextItem> {
        let source = self.name();
        let request_id = current_request_id().unwrap_or_default();
        #[allow(clippy::cast_precision_loss)]
        let elapsed_ms = start.elapsed().as_millis() as f64;
        metrics::histogram!("adapter_duration_ms", "source" => source, "operation" => operation)
            .record(elapsed_ms);

        match result {
            Ok(items) => {
                metrics::counter!("adapter_calls_total", "source" => source, "status" => "ok")
                    .increment(1);
                tracing::debug!(
                    source,
                    operation,
                    request_id = %request_id,
                    results = items.len(),
                    "Adapter call complete"
                );
                items
            },
            Err(e) => {
                let status = e.kind();
                metrics::counter!("adapter_calls_total", "source" => source, "status" => status)
                    .increment(1);
                tracing::warn!(
                    source,
                    operation,
                    request_id = %request_id,
                    error = %e,
                    error_kind = status,
                    "Adapter call failed, continuing without it"
                );
                Vec::new()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(ScoreScale::Unit, 0.4, 0.4; "unit passthrough")]
    #[test_case(ScoreScale::Unit, 1.7, 1.0; "unit clamps high")]
    #[test_case(ScoreScale::Cosine, -1.0, 0.0; "cosine floor")]
    #[test_case(ScoreScale::Cosine, 0.5, 0.75; "cosine mid")]
    #[test_case(ScoreScale::Bm25 { saturation: 10.0 }, 10.0, 0.5; "bm25 saturation point")]
    #[test_case(ScoreScale::Bm25 { saturation: 10.0 }, -3.0, 0.0; "bm25 negative")]
    fn test_normalize(scale: ScoreScale, input: f32, expected: f32) {
        assert!((scale.normalize(input) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_nan_is_zero() {
        assert!(ScoreScale::Cosine.normalize(f32::NAN).abs() < f32::EPSILON);
    }

    #[test]
    fn test_parse_scale() {
        assert_eq!(ScoreScale::parse("Cosine", None).unwrap(), ScoreScale::Cosine);
        assert_eq!(
            ScoreScale::parse("bm25", None).unwrap(),
            ScoreScale::Bm25 { saturation: 10.0 }
        );
        assert!(ScoreScale::parse("tfidf", None).is_err());
        assert!(ScoreScale::Bm25 { saturation: 0.0 }.validate().is_err());
    }

    #[test]
    fn test_error_health_mapping() {
        let err = AdapterError::Malformed {
            adapter: Source::RemoteKnowledgeBase,
            reason: "bad json".to_string(),
        };
        assert_eq!(err.kind(), "malformed");
        assert!(matches!(err.to_health(), HealthStatus::Degraded(_)));

        let err = AdapterError::Timeout {
            adapter: Source::VersionControl,
            elapsed_ms: 2_000,
        };
        assert_eq!(err.adapter(), Source::VersionControl);
        assert_eq!(err.to_string(), "version_control timed out after 2000ms");
        assert!(matches!(err.to_health(), HealthStatus::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_failing_adapter_yields_empty_list() {
        let adapter: Adapter = NotesAdapter::new("/nonexistent/vault").into();
        assert!(adapter.search("anything", 5).await.is_empty());
        assert!(adapter.try_search("anything", 5).await.is_err());
    }

    #[test]
    fn test_from_config_order() {
        let config = FusionConfig::new()
            .with_remote(crate::config::RemoteSourceConfig::new("http://127.0.0.1:1"))
            .with_notes("/tmp/vault");
        let sources: Vec<Source> = Adapter::from_config(&config)
            .iter()
            .map(Adapter::source)
            .collect();
        assert_eq!(sources, vec![Source::Notes, Source::RemoteKnowledgeBase]);
    }
}
