//! Fan-out, fusion, and the four public query operations.
//!
//! Every query runs the same pipeline:
//!
//! ```text
//! FannedOut ─► Collecting ─► Deduplicating ─► Fusing ─► Interleaving ─► Done
//! ```
//!
//! Adapters are called concurrently, each under its own timeout and all
//! under a shared overall budget. When the budget runs out, calls still in
//! flight are aborted and count as empty. Everything after collection runs
//! on the joined result set, so completion order never affects the output.

use crate::adapters::Adapter;
use crate::config::FusionConfig;
use crate::models::{ContextItem, HealthStatus, Source};
use crate::observability::{QueryContext, current_context, scope_query_context};
use crate::services::{
    Deduplicator, DiversityInterleaver, EntityExtractor, EntityIndex, RelevanceScorer, RrfFusion,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::instrument;

/// Pipeline stage of one query, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryPhase {
    FannedOut,
    Collecting,
    Deduplicating,
    Fusing,
    Interleaving,
    Done,
}

impl QueryPhase {
    const fn as_str(self) -> &'static str {
        match self {
            Self::FannedOut => "fanned_out",
            Self::Collecting => "collecting",
            Self::Deduplicating => "deduplicating",
            Self::Fusing => "fusing",
            Self::Interleaving => "interleaving",
            Self::Done => "done",
        }
    }

    fn advance(&mut self, next: Self) {
        tracing::debug!(from = self.as_str(), to = next.as_str(), "Query phase transition");
        *self = next;
    }
}

/// Aggregates ranked results from every registered source.
///
/// Adapter failures never reach the caller: a failed, slow, or malformed
/// source contributes nothing and the query completes with the rest.
///
/// # Example
///
/// ```rust,ignore
/// use ctxfuse::{ContextAggregator, FusionConfig};
///
/// let config = FusionConfig::new().with_notes("~/vault").with_git("~/src");
/// let aggregator = ContextAggregator::from_config(&config)?;
/// let hits = aggregator.search_all("token refresh", None, 20).await;
/// ```
#[derive(Debug, Clone)]
pub struct ContextAggregator {
    adapters: Vec<Adapter>,
    config: FusionConfig,
    extractor: EntityExtractor,
    scorer: RelevanceScorer,
    deduplicator: Deduplicator,
    fusion: RrfFusion,
    diversity: DiversityInterleaver,
}

impl ContextAggregator {
    /// Creates an aggregator over `adapters`, ordered by source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when no adapters are given or the
    /// configuration fails validation.
    pub fn new(mut adapters: Vec<Adapter>, config: FusionConfig) -> Result<Self> {
        if adapters.is_empty() {
            return Err(Error::Configuration(
                "no sources registered; configure at least one of notes, git, or remote"
                    .to_string(),
            ));
        }
        config.validate()?;
        adapters.sort_by_key(Adapter::source);

        tracing::debug!(
            sources = ?adapters.iter().map(Adapter::name).collect::<Vec<_>>(),
            "Aggregator ready"
        );

        Ok(Self {
            adapters,
            extractor: EntityExtractor::new(),
            scorer: RelevanceScorer::with_config(config.relevance),
            deduplicator: Deduplicator::with_config(config.dedup),
            fusion: RrfFusion::with_config(config.rrf),
            diversity: DiversityInterleaver::with_config(config.diversity),
            config,
        })
    }

    /// Builds every adapter the configuration registers.
    ///
    /// # Errors
    ///
    /// Same as [`ContextAggregator::new`].
    pub fn from_config(config: &FusionConfig) -> Result<Self> {
        Self::new(Adapter::from_config(config), config.clone())
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Returns the registered sources, in order.
    #[must_use]
    pub fn sources(&self) -> Vec<Source> {
        self.adapters.iter().map(Adapter::source).collect()
    }

    /// Searches every selected source and returns one fused list.
    ///
    /// `sources` of `None` selects every registered adapter. Each adapter
    /// is asked for `limit` hits; the fused list is truncated to `limit`.
    #[instrument(
        name = "ctxfuse.search_all",
        skip(self, sources),
        fields(operation = "search_all", request_id = tracing::field::Empty, results = tracing::field::Empty)
    )]
    pub async fn search_all(
        &self,
        query: &str,
        sources: Option<&BTreeSet<Source>>,
        limit: usize,
    ) -> Vec<ContextItem> {
        let context = QueryContext::new("search_all");
        tracing::Span::current().record("request_id", context.request_id());
        let start = Instant::now();

        let selected = self.select(sources);
        let owned_query = query.to_string();
        let results = scope_query_context(context, async {
            let lists = self
                .collect(selected, move |adapter| {
                    let query = owned_query.clone();
                    async move { adapter.search(&query, limit).await }
                })
                .await;
            let mut ranked = self.rank(lists, Some(query), Utc::now());
            ranked.truncate(limit);
            ranked
        })
        .await;

        record_query("search_all", start, results.len());
        results
    }

    /// Returns everything that changed within `window`, most recent first.
    ///
    /// Items go through the full pipeline first; entries with equal
    /// timestamps keep their fused order.
    #[instrument(
        name = "ctxfuse.get_recent_activity",
        skip(self, sources),
        fields(operation = "get_recent_activity", request_id = tracing::field::Empty, results = tracing::field::Empty)
    )]
    pub async fn get_recent_activity(
        &self,
        window: Duration,
        sources: Option<&BTreeSet<Source>>,
    ) -> Vec<ContextItem> {
        let context = QueryContext::new("get_recent_activity");
        tracing::Span::current().record("request_id", context.request_id());
        let start = Instant::now();

        let selected = self.select(sources);
        let results = scope_query_context(context, async {
            let mut items = self.recent_corpus(selected, window).await;
            sort_newest_first(&mut items);
            items
        })
        .await;

        record_query("get_recent_activity", start, results.len());
        results
    }

    /// Returns what is being worked on right now.
    ///
    /// Recent activity over `windows.working_hours` from every source, in
    /// fused order, truncated to `default_limit`.
    #[instrument(
        name = "ctxfuse.get_working_context",
        skip(self),
        fields(operation = "get_working_context", request_id = tracing::field::Empty, results = tracing::field::Empty)
    )]
    pub async fn get_working_context(&self) -> Vec<ContextItem> {
        let context = QueryContext::new("get_working_context");
        tracing::Span::current().record("request_id", context.request_id());
        let start = Instant::now();

        let selected = self.select(None);
        let window = self.config.windows.working();
        let limit = self.config.default_limit;
        let results = scope_query_context(context, async {
            let mut items = self.recent_corpus(selected, window).await;
            items.truncate(limit);
            items
        })
        .await;

        record_query("get_working_context", start, results.len());
        results
    }

    /// Returns recent items that mention `entity`, most recent first.
    ///
    /// The name is normalized the same way extracted entities are, so
    /// `"OAuth-2"` finds items tagged `oauth2`. A name with nothing left
    /// after normalization matches no entity and yields an empty list.
    #[instrument(
        name = "ctxfuse.get_entity_context",
        skip(self),
        fields(operation = "get_entity_context", request_id = tracing::field::Empty, results = tracing::field::Empty)
    )]
    pub async fn get_entity_context(&self, entity: &str) -> Vec<ContextItem> {
        let normalized = EntityExtractor::normalize(entity);
        if normalized.is_empty() {
            tracing::debug!(entity, "Entity name normalizes to nothing, no matches");
            return Vec::new();
        }

        let context = QueryContext::new("get_entity_context");
        tracing::Span::current().record("request_id", context.request_id());
        let start = Instant::now();

        let selected = self.select(None);
        let window = self.config.windows.entity();
        let results = scope_query_context(context, async {
            let mut items: Vec<ContextItem> = self
                .recent_corpus(selected, window)
                .await
                .into_iter()
                .filter(|item| item.entities.contains(&normalized))
                .collect();
            sort_newest_first(&mut items);
            items
        })
        .await;

        record_query("get_entity_context", start, results.len());
        results
    }

    /// Builds an entity index over `items` for related-entity lookups.
    #[must_use]
    pub fn entity_index(&self, items: &[ContextItem]) -> EntityIndex {
        EntityIndex::build(&self.extractor, items)
    }

    /// Probes every adapter concurrently, in source order.
    #[instrument(name = "ctxfuse.health", skip(self), fields(operation = "health"))]
    pub async fn health(&self) -> Vec<(Source, HealthStatus)> {
        let context = current_context();
        let mut set = JoinSet::new();
        for (index, adapter) in self.adapters.iter().cloned().enumerate() {
            let context = context.clone();
            set.spawn(async move {
                let probe = async { adapter.health_check().await };
                let status = match context {
                    Some(ctx) => scope_query_context(ctx, probe).await,
                    None => probe.await,
                };
                (index, status)
            });
        }

        let mut statuses: Vec<(Source, HealthStatus)> = self
            .adapters
            .iter()
            .map(|a| (a.source(), HealthStatus::Unavailable("health probe did not finish".to_string())))
            .collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, status)) => {
                    if let Some(slot) = statuses.get_mut(index) {
                        slot.1 = status;
                    }
                },
                Err(e) => tracing::warn!(error = %e, "Health probe task failed"),
            }
        }
        statuses
    }

    /// Runs the post-collection pipeline over per-source lists.
    ///
    /// Lists are entity-tagged and scored, deduplicated across sources,
    /// fused by reciprocal rank, then diversity-interleaved. `now` is the
    /// single reference time for recency, so one query scores consistently.
    #[must_use]
    pub fn rank(
        &self,
        mut lists: Vec<Vec<ContextItem>>,
        query: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<ContextItem> {
        let mut phase = QueryPhase::Collecting;
        for list in &mut lists {
            self.extractor.tag_all(list);
            self.scorer.score_all(list, query, now);
        }

        phase.advance(QueryPhase::Deduplicating);
        let outcome = self.deduplicator.deduplicate(lists);

        phase.advance(QueryPhase::Fusing);
        let fused = self
            .fusion
            .fuse(&outcome.lists, |item| self.scorer.composite(item));

        phase.advance(QueryPhase::Interleaving);
        let (items, demoted) = self
            .diversity
            .interleave(fused.into_iter().map(|f| f.item).collect());
        metrics::counter!("diversity_demotions_total").increment(demoted as u64);

        phase.advance(QueryPhase::Done);
        tracing::debug!(
            merges = outcome.merges,
            demoted,
            results = items.len(),
            "Ranking complete"
        );
        items
    }

    fn select(&self, sources: Option<&BTreeSet<Source>>) -> Vec<Adapter> {
        self.adapters
            .iter()
            .filter(|a| sources.is_none_or(|s| s.contains(&a.source())))
            .cloned()
            .collect()
    }

    async fn recent_corpus(&self, selected: Vec<Adapter>, window: Duration) -> Vec<ContextItem> {
        let limit = self.config.windows.recent_limit;
        let lists = self
            .collect(selected, move |adapter| async move {
                adapter.get_recent(window, limit).await
            })
            .await;
        self.rank(lists, None, Utc::now())
    }

    /// Calls every selected adapter concurrently under the overall budget.
    ///
    /// Returns one list per adapter, in adapter order. Adapters that did not
    /// finish in time contribute an empty list.
    async fn collect<F, Fut>(&self, selected: Vec<Adapter>, call: F) -> Vec<Vec<ContextItem>>
    where
        F: Fn(Adapter) -> Fut,
        Fut: Future<Output = Vec<ContextItem>> + Send + 'static,
    {
        let mut phase = QueryPhase::FannedOut;
        let deadline = tokio::time::Instant::now() + self.config.timeouts.overall();
        let context = current_context();
        let names: Vec<&'static str> = selected.iter().map(Adapter::name).collect();

        let mut set = JoinSet::new();
        for (index, adapter) in selected.into_iter().enumerate() {
            let fut = call(adapter);
            let context = context.clone();
            set.spawn(async move {
                let items = match context {
                    Some(ctx) => scope_query_context(ctx, fut).await,
                    None => fut.await,
                };
                (index, items)
            });
        }

        phase.advance(QueryPhase::Collecting);
        let mut lists: Vec<Option<Vec<ContextItem>>> = vec![None; names.len()];
        loop {
            match tokio::time::timeout_at(deadline, set.join_next()).await {
                Ok(Some(Ok((index, items)))) => {
                    if let Some(slot) = lists.get_mut(index) {
                        *slot = Some(items);
                    }
                },
                Ok(Some(Err(e))) => tracing::warn!(error = %e, "Adapter task failed"),
                Ok(None) => break,
                Err(_) => {
                    let pending: Vec<&'static str> = names
                        .iter()
                        .zip(&lists)
                        .filter(|(_, list)| list.is_none())
                        .map(|(name, _)| *name)
                        .collect();
                    tracing::warn!(
                        budget_ms = self.config.timeouts.overall_ms,
                        pending = ?pending,
                        "Overall budget expired, abandoning pending adapters"
                    );
                    for source in &pending {
                        metrics::counter!("adapter_calls_total", "source" => *source, "status" => "abandoned")
                            .increment(1);
                    }
                    set.abort_all();
                    break;
                },
            }
        }

        lists.into_iter().map(Option::unwrap_or_default).collect()
    }
}

/// Stable sort by timestamp, newest first.
fn sort_newest_first(items: &mut [ContextItem]) {
    items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

fn record_query(operation: &'static str, start: Instant, results: usize) {
    #[allow(clippy::cast_precision_loss)]
    let elapsed_ms = start.elapsed().as_millis() as f64;
    metrics::histogram!("aggregator_query_duration_ms", "operation" => operation).record(elapsed_ms);
    tracing::Span::current().record("results", results);
    tracing::info!(operation, results, elapsed_ms, "Query complete");
}
