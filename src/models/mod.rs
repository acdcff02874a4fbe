//! Data models for ctxfuse.
//!
//! Everything here is query-scoped: items are built per request by the
//! adapters and dropped once the response is returned.

mod entity;
mod health;
mod item;
mod source;

pub use entity::{EntityCategory, EntityMention};
pub use health::HealthStatus;
pub use item::{
    ContextItem, ItemKey, MERGED_FROM_KEY, MergedFrom, Relevance, TIMESTAMP_OBSERVED_KEY,
    TRUNCATED_KEY,
};
pub use source::{ItemType, Source};
