//! Source and item-type enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A knowledge source that contributes items.
///
/// The declaration order is significant: it is the last-resort tie-break
/// in fused rankings (`Notes` < `VersionControl` < `RemoteKnowledgeBase`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Markdown note vault on the local filesystem.
    #[serde(alias = "obsidian")]
    Notes,
    /// Git history of one or more local repositories.
    #[serde(alias = "git")]
    VersionControl,
    /// Remote knowledge-base service reached over HTTP.
    #[serde(rename = "remote", alias = "kas", alias = "remote_knowledge_base")]
    RemoteKnowledgeBase,
}

impl Source {
    /// Returns all source variants in tie-break order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Notes, Self::VersionControl, Self::RemoteKnowledgeBase]
    }

    /// Returns the source as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Notes => "notes",
            Self::VersionControl => "version_control",
            Self::RemoteKnowledgeBase => "remote",
        }
    }

    /// Parses a source from a string, accepting the common aliases.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "notes" | "note" | "obsidian" | "vault" => Some(Self::Notes),
            "version_control" | "version-control" | "vcs" | "git" => Some(Self::VersionControl),
            "remote" | "remote_knowledge_base" | "kb" | "kas" => Some(Self::RemoteKnowledgeBase),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of content an item carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// A note document (or a snippet of one).
    Note,
    /// A commit from version-control history.
    Commit,
    /// Uncommitted working-tree changes.
    Diff,
    /// A document from the remote knowledge base.
    KbArticle,
}

impl ItemType {
    /// Returns the item type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Commit => "commit",
            Self::Diff => "diff",
            Self::KbArticle => "kb_article",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("notes", Some(Source::Notes); "canonical notes")]
    #[test_case("Obsidian", Some(Source::Notes); "obsidian alias")]
    #[test_case("git", Some(Source::VersionControl); "git alias")]
    #[test_case("version-control", Some(Source::VersionControl); "dashed")]
    #[test_case("KAS", Some(Source::RemoteKnowledgeBase); "kas alias")]
    #[test_case(" remote ", Some(Source::RemoteKnowledgeBase); "padded")]
    #[test_case("svn", None; "unknown")]
    fn test_source_parse(input: &str, expected: Option<Source>) {
        assert_eq!(Source::parse(input), expected);
    }

    #[test]
    fn test_source_order_is_declaration_order() {
        let mut sources = vec![
            Source::RemoteKnowledgeBase,
            Source::Notes,
            Source::VersionControl,
        ];
        sources.sort();
        assert_eq!(sources, Source::all());
    }

    #[test]
    fn test_source_round_trips_through_as_str() {
        for source in Source::all() {
            assert_eq!(Source::parse(source.as_str()), Some(*source));
        }
    }

    #[test]
    fn test_source_serde() {
        let json = serde_json::to_string(&Source::RemoteKnowledgeBase).unwrap();
        assert_eq!(json, "\"remote\"");
        let parsed: Source = serde_json::from_str("\"git\"").unwrap();
        assert_eq!(parsed, Source::VersionControl);
    }
}
