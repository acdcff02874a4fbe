//! Benchmarks for the ranking pipeline.
//!
//! Covers the CPU-bound half of a query, with adapters out of the picture:
//! - Near-duplicate detection across sources
//! - RRF fusion alone
//! - The full rank pass (tagging, scoring, dedup, fusion, interleave)

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{Duration, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ctxfuse::models::{ContextItem, ItemType, Source};
use ctxfuse::{ContextAggregator, Deduplicator, FusionConfig, NotesAdapter, RrfFusion};
use std::hint::black_box;

// ============================================================================
// Helper Functions
// ============================================================================

const TOPICS: &[&str] = &[
    "refresh token rotation for the OAuth2 gateway",
    "postgres vacuum tuning on the billing database",
    "kubernetes ingress timeouts behind the load balancer",
    "rust async runtime shutdown ordering",
    "weekly planning and retro notes",
];

/// One list per source, `per_source` items each; every third item repeats
/// across sources so dedup has work to do.
fn make_lists(per_source: usize) -> Vec<Vec<ContextItem>> {
    let now = Utc::now();
    Source::all()
        .iter()
        .map(|source| {
            (0..per_source)
                .map(|i| {
                    let topic = TOPICS[i % TOPICS.len()];
                    let content = if i % 3 == 0 {
                        format!("{topic} shared entry {i}")
                    } else {
                        format!("{topic} from {} entry {i}", source.as_str())
                    };
                    let hours = i64::try_from(i).unwrap_or(0);
                    ContextItem::new(
                        *source,
                        format!("{}-{i}", source.as_str()),
                        ItemType::Note,
                        content,
                        now - Duration::hours(hours),
                    )
                    .with_semantic_score(1.0 / (1.0 + i as f32))
                })
                .collect()
        })
        .collect()
}

fn bench_dedup(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup");
    let dedup = Deduplicator::new();
    for size in [10, 50, 100] {
        let lists = make_lists(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &lists, |b, lists| {
            b.iter(|| black_box(dedup.deduplicate(lists.clone())));
        });
    }
    group.finish();
}

fn bench_rrf(c: &mut Criterion) {
    let mut group = c.benchmark_group("rrf_fuse");
    let fusion = RrfFusion::new();
    for size in [10, 100, 1_000] {
        let lists = make_lists(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &lists, |b, lists| {
            b.iter(|| black_box(fusion.fuse(lists, |item| item.relevance.semantic_score())));
        });
    }
    group.finish();
}

fn bench_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank");
    let aggregator = ContextAggregator::new(
        vec![NotesAdapter::new("/nonexistent").into()],
        FusionConfig::new(),
    )
    .unwrap();
    let now = Utc::now();
    for size in [10, 50, 100] {
        let lists = make_lists(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &lists, |b, lists| {
            b.iter(|| black_box(aggregator.rank(lists.clone(), Some("refresh token"), now)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dedup, bench_rrf, bench_rank);
criterion_main!(benches);
