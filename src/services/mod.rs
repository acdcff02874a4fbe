//! Ranking services.
//!
//! Each service is a small, synchronous transformation configured at
//! construction; [`ContextAggregator`] wires them into the query pipeline.
//!
//! | Service | Role |
//! |---------|------|
//! | [`EntityExtractor`] | Tags items with canonical entity names |
//! | [`RelevanceScorer`] | Fills recency, source quality, and frequency |
//! | [`Deduplicator`] | Collapses near-duplicates across sources |
//! | [`RrfFusion`] | Merges ranked lists by reciprocal rank |
//! | [`DiversityInterleaver`] | Caps one source's share of the top-K |

mod aggregator;
mod deduplication;
mod diversity;
mod entity_extraction;
mod relevance;
mod rrf_fusion;

pub use aggregator::ContextAggregator;
pub use deduplication::{DedupOutcome, DeduplicationConfig, Deduplicator, Shingler, jaccard};
pub use diversity::{DiversityConfig, DiversityInterleaver};
pub use entity_extraction::{EntityExtractor, EntityIndex, IndexedEntity};
pub use relevance::{RelevanceConfig, RelevanceScorer, ScoringWeights, SourceWeights};
pub use rrf_fusion::{FusedItem, RrfConfig, RrfFusion, compare_fused};
