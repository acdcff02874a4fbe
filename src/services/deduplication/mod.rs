//! Cross-source near-duplicate collapsing.
//!
//! The same fact often shows up twice: a note describes a change and the
//! commit that made it says the same thing. Before fusion, every pair of
//! items from *different* sources is compared by Jaccard similarity over
//! word shingles; pairs at or above the threshold are merged.
//!
//! # Merge rules
//!
//! - Items from the same source are never compared.
//! - A cluster holds at most one item per source. Two clusters only join
//!   when their source sets are disjoint, so a survivor that already speaks
//!   for a source never absorbs another item from it. This is what makes a
//!   second pass over the output a no-op.
//! - The survivor is the member with the best list position, then the
//!   higher source quality, then source order, then id. It keeps its own
//!   `id`, `content`, and `type`; `entities` and `tags` become the union of
//!   the members'; `metadata.merged_from` lists every absorbed `(source, id)`.
//! - Every list position a member held is taken over by the survivor, so
//!   reciprocal-rank contributions of all members add up during fusion.
//!
//! Candidate pairs are visited by similarity (highest first), then by key,
//! so the result does not depend on the order lists were collected in.

mod config;
mod shingles;

pub use config::DeduplicationConfig;
pub use shingles::{Shingler, jaccard};

use crate::models::{ContextItem, ItemKey, MergedFrom, Source};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::instrument;

/// Result of a deduplication pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupOutcome {
    /// Input lists with merged members replaced by their survivor.
    pub lists: Vec<Vec<ContextItem>>,
    /// Number of items absorbed into a survivor.
    pub merges: usize,
}

struct Node {
    item: ContextItem,
    best_rank: usize,
    sources: BTreeSet<Source>,
    shingles: HashSet<String>,
}

/// Union-find over node indices, tracking each cluster's source set.
struct Clusters {
    parent: Vec<usize>,
    sources: Vec<BTreeSet<Source>>,
}

impl Clusters {
    fn new(nodes: &[Node]) -> Self {
        Self {
            parent: (0..nodes.len()).collect(),
            sources: nodes.iter().map(|n| n.sources.clone()).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// Joins two clusters if their source sets are disjoint.
    fn try_union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb || !self.sources[ra].is_disjoint(&self.sources[rb]) {
            return false;
        }
        let (keep, absorb) = if ra < rb { (ra, rb) } else { (rb, ra) };
        let absorbed = std::mem::take(&mut self.sources[absorb]);
        self.sources[keep].extend(absorbed);
        self.parent[absorb] = keep;
        true
    }
}

/// Collapses near-duplicate items reported by different sources.
#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    config: DeduplicationConfig,
}

impl Deduplicator {
    /// Creates a deduplicator with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a deduplicator with the given configuration.
    #[must_use]
    pub const fn with_config(config: DeduplicationConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &DeduplicationConfig {
        &self.config
    }

    /// Similarity of two contents under this deduplicator's shingling.
    #[must_use]
    pub fn similarity(&self, a: &str, b: &str) -> f32 {
        let shingler = Shingler::new(self.config.shingle_size);
        jaccard(&shingler.shingles(a), &shingler.shingles(b))
    }

    /// Deduplicates across all lists.
    ///
    /// Lists keep their length and order except that a survivor which
    /// would appear twice in one list keeps only its first position.
    #[instrument(
        name = "ctxfuse.dedup",
        skip(self, lists),
        fields(
            operation = "dedup",
            lists = lists.len(),
            merges = tracing::field::Empty
        )
    )]
    pub fn deduplicate(&self, lists: Vec<Vec<ContextItem>>) -> DedupOutcome {
        let nodes = self.collect_nodes(&lists);
        let pairs = self.candidate_pairs(&nodes);

        let mut clusters = Clusters::new(&nodes);
        for (_, a, b) in pairs {
            clusters.try_union(a, b);
        }

        let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..nodes.len() {
            let root = clusters.find(i);
            members.entry(root).or_default().push(i);
        }

        let mut survivor_of: HashMap<ItemKey, ContextItem> = HashMap::new();
        let mut merges = 0;
        for group in members.values() {
            if group.len() < 2 {
                continue;
            }
            merges += group.len() - 1;
            let survivor = merge_group(&nodes, group);
            for &i in group {
                survivor_of.insert(nodes[i].item.key(), survivor.clone());
            }
        }

        tracing::Span::current().record("merges", merges);
        if merges > 0 {
            tracing::debug!(merges, "Merged cross-source duplicates");
            metrics::counter!("dedup_merges_total").increment(merges as u64);
        }

        let lists = lists
            .into_iter()
            .map(|list| {
                let mut emitted: HashSet<ItemKey> = HashSet::with_capacity(list.len());
                list.into_iter()
                    .filter_map(|item| {
                        let replacement = survivor_of.get(&item.key()).cloned().unwrap_or(item);
                        emitted.insert(replacement.key()).then_some(replacement)
                    })
                    .collect()
            })
            .collect();

        DedupOutcome { lists, merges }
    }

    /// One node per distinct `(source, id)`, ordered by key.
    fn collect_nodes(&self, lists: &[Vec<ContextItem>]) -> Vec<Node> {
        let shingler = Shingler::new(self.config.shingle_size);
        let mut by_key: BTreeMap<ItemKey, Node> = BTreeMap::new();
        for list in lists {
            for (index, item) in list.iter().enumerate() {
                let rank = index + 1;
                by_key
                    .entry(item.key())
                    .and_modify(|node| node.best_rank = node.best_rank.min(rank))
                    .or_insert_with(|| Node {
                        sources: item.covered_sources(),
                        shingles: shingler.shingles(&item.content),
                        best_rank: rank,
                        item: item.clone(),
                    });
            }
        }
        by_key.into_values().collect()
    }

    /// Cross-source pairs at or above the threshold, most similar first.
    fn candidate_pairs(&self, nodes: &[Node]) -> Vec<(f32, usize, usize)> {
        let mut pairs = Vec::new();
        for a in 0..nodes.len() {
            for b in (a + 1)..nodes.len() {
                if !nodes[a].sources.is_disjoint(&nodes[b].sources) {
                    continue;
                }
                let similarity = jaccard(&nodes[a].shingles, &nodes[b].shingles);
                if similarity >= self.config.threshold {
                    pairs.push((similarity, a, b));
                }
            }
        }
        // Node indices follow key order, so (a, b) is a stable tie-break.
        pairs.sort_by(|x, y| {
            y.0.total_cmp(&x.0)
                .then_with(|| x.1.cmp(&y.1))
                .then_with(|| x.2.cmp(&y.2))
        });
        pairs
    }
}

/// Builds the survivor for a cluster of node indices.
fn merge_group(nodes: &[Node], group: &[usize]) -> ContextItem {
    let winner = group
        .iter()
        .copied()
        .min_by(|&a, &b| {
            let (na, nb) = (&nodes[a], &nodes[b]);
            na.best_rank
                .cmp(&nb.best_rank)
                .then_with(|| {
                    nb.item
                        .relevance
                        .source_quality()
                        .total_cmp(&na.item.relevance.source_quality())
                })
                .then_with(|| na.item.source().cmp(&nb.item.source()))
                .then_with(|| na.item.id().cmp(nb.item.id()))
        })
        .unwrap_or(group[0]);

    let mut survivor = nodes[winner].item.clone();
    let mut merged: Vec<MergedFrom> = survivor.merged_from();
    let mut tags: Vec<String> = survivor.tags.clone();

    for &i in group {
        if i == winner {
            continue;
        }
        let member = &nodes[i].item;
        merged.push(member.key());
        merged.extend(member.merged_from());
        survivor.entities.extend(member.entities.iter().cloned());
        for tag in &member.tags {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
    }

    survivor.tags = tags;
    survivor.set_merged_from(merged);
    survivor
}
