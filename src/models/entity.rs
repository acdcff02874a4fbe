//! Entity mentions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category an entity pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityCategory {
    /// A known technology, language, or tool.
    Technology,
    /// A project-like identifier (`PascalCase` or kebab-case).
    Project,
    /// A path-like token with a source-file extension.
    Path,
}

impl EntityCategory {
    /// Returns the category as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Technology => "technology",
            Self::Project => "project",
            Self::Path => "path",
        }
    }
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One occurrence of an entity in one item. Query-scoped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityMention {
    /// Surface form as it appeared in the content.
    pub name: String,
    /// Canonical form shared by every spelling of the entity.
    pub normalized_form: String,
    /// Identifier of the item the mention was found in.
    pub item_id: String,
    /// Pattern category that matched.
    pub category: EntityCategory,
}
