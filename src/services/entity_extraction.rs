//! Pattern-based entity extraction and the per-query entity index.
//!
//! Extraction is a pure function of the text: no model, no I/O. Three
//! pattern categories are recognised:
//!
//! | Category | Matches | Canonical form |
//! |----------|---------|----------------|
//! | Technology | tokens from [`TECH_PATTERNS`] | lowercase, separators removed |
//! | Project | `PascalCase` or kebab-case identifiers longer than 3 chars | lowercase, separators removed |
//! | Path | path-like tokens with a source-file extension | lowercase |
//!
//! Removing `-`, `_`, `.` and whitespace before comparing means `OAuth2`,
//! `oauth-2` and `OAUTH_2` all resolve to `oauth2`, and `PersonalContext`
//! resolves to the same entity as `personal-context`.
//!
//! # Example
//!
//! ```rust,ignore
//! use ctxfuse::services::EntityExtractor;
//!
//! let extractor = EntityExtractor::new();
//! let entities = extractor.extract("OAuth2 login via OAuth-2 provider");
//! assert_eq!(entities.len(), 1);
//! ```

use crate::models::{ContextItem, EntityCategory, EntityMention, ItemKey};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Technology names recognised by the extractor.
///
/// Organized by category for maintainability.
static TECH_PATTERNS: &[&str] = &[
    // Programming Languages
    "Rust",
    "Python",
    "Java",
    "JavaScript",
    "TypeScript",
    "Go",
    "C++",
    "C#",
    "Ruby",
    "PHP",
    "Swift",
    "Kotlin",
    "Scala",
    "Elixir",
    "Haskell",
    "Zig",
    // Databases
    "PostgreSQL",
    "Postgres",
    "MySQL",
    "SQLite",
    "Redis",
    "MongoDB",
    "DynamoDB",
    "ClickHouse",
    "Elasticsearch",
    "Neo4j",
    "Qdrant",
    "Pinecone",
    // Web Frameworks
    "React",
    "Vue",
    "Angular",
    "Svelte",
    "Next.js",
    "Express",
    "Django",
    "Rails",
    "Flask",
    "FastAPI",
    "Axum",
    "Actix",
    // Cloud and Containers
    "AWS",
    "Azure",
    "GCP",
    "Cloudflare",
    "Vercel",
    "Docker",
    "Kubernetes",
    "k8s",
    "Terraform",
    "Ansible",
    // Observability and Messaging
    "Prometheus",
    "Grafana",
    "Kafka",
    "RabbitMQ",
    "NATS",
    // Runtimes and Build Tools
    "Node.js",
    "Node",
    "Deno",
    "Bun",
    "WASM",
    "Cargo",
    "npm",
    "pnpm",
    "Vite",
    // Protocols and Auth
    "REST",
    "GraphQL",
    "gRPC",
    "WebSocket",
    "OpenAPI",
    "OAuth",
    "OAuth2",
    "JWT",
    "MCP",
    // Tooling and Services
    "Git",
    "GitHub",
    "GitLab",
    "Obsidian",
    "LangChain",
    "LLM",
    "RAG",
    "Ollama",
    "Anthropic",
    "OpenAI",
    "Playwright",
    "pytest",
    "Jest",
    "Vitest",
];

/// Words that look like project identifiers but are not.
static STOP_WORDS: &[&str] = &["the", "and", "for", "with", "from", "this", "that"];

/// Canonical technology forms, built once from [`TECH_PATTERNS`].
static TECH_CANONICAL: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    TECH_PATTERNS
        .iter()
        .map(|name| (canonical_token(name), *name))
        .collect()
});

/// Word-like tokens, including `C++`, `C#`, `Node.js`, `oauth-2`.
static TOKEN_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9][A-Za-z0-9+#]*(?:[-_.][A-Za-z0-9+#]+)*").ok());

/// `PascalCase` (two or more humps) or kebab-case identifiers.
static PROJECT_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][a-z]+(?:[A-Z][a-z]+)+)\b|\b([a-z]+-[a-z]+(?:-[a-z]+)*)\b").ok()
});

/// Path-like tokens with a source-file extension.
static PATH_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?m)(?:^|\s)([A-Za-z0-9_/.\-]+\.(?:rs|py|js|ts|tsx|jsx|go|md|json|yaml|yml|toml))\b",
    )
    .ok()
});

/// Whole-string check used when normalising a caller-supplied name.
static PATH_NAME_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)^[A-Za-z0-9_/.\-]+\.(?:rs|py|js|ts|tsx|jsx|go|md|json|yaml|yml|toml)$").ok()
});

/// Lowercases and drops everything except alphanumerics, `+` and `#`.
fn canonical_token(surface: &str) -> String {
    surface
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '+' || *c == '#')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Pattern-based entity extractor.
///
/// Stateless; cheap to clone and safe to share across queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityExtractor;

impl EntityExtractor {
    /// Creates a new extractor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the canonical form of a caller-supplied entity name.
    ///
    /// Path-like names are only lowercased; everything else goes through
    /// the same folding as extracted tokens.
    #[must_use]
    pub fn normalize(name: &str) -> String {
        let trimmed = name.trim();
        let is_path = PATH_NAME_PATTERN
            .as_ref()
            .is_some_and(|re| re.is_match(trimmed));
        if is_path {
            trimmed.to_lowercase()
        } else {
            canonical_token(trimmed)
        }
    }

    /// Extracts the canonical entity names found in `content`.
    ///
    /// Identical input always yields an identical set.
    #[must_use]
    pub fn extract(&self, content: &str) -> BTreeSet<String> {
        self.extract_mentions(content, "")
            .into_iter()
            .map(|m| m.normalized_form)
            .collect()
    }

    /// Extracts every mention in `content`, attributed to `item_id`.
    ///
    /// Each canonical form is reported once per category, under the
    /// first surface form seen.
    #[must_use]
    pub fn extract_mentions(&self, content: &str, item_id: &str) -> Vec<EntityMention> {
        let mut found: BTreeMap<String, (EntityCategory, String)> = BTreeMap::new();
        let mut record = |normalized: String, surface: &str, category: EntityCategory| {
            found
                .entry(normalized)
                .and_modify(|(existing, _)| {
                    if category < *existing {
                        *existing = category;
                    }
                })
                .or_insert_with(|| (category, surface.to_string()));
        };

        if let Some(re) = TOKEN_PATTERN.as_ref() {
            for token in re.find_iter(content) {
                let surface = token.as_str();
                let whole = canonical_token(surface);
                if TECH_CANONICAL.contains_key(&whole) {
                    record(whole, surface, EntityCategory::Technology);
                    continue;
                }
                for part in surface.split(['-', '_', '.']) {
                    let canonical = canonical_token(part);
                    if TECH_CANONICAL.contains_key(&canonical) {
                        record(canonical, part, EntityCategory::Technology);
                    }
                }
            }
        }

        if let Some(re) = PROJECT_PATTERN.as_ref() {
            for caps in re.captures_iter(content) {
                let Some(name) = caps.get(1).or_else(|| caps.get(2)) else {
                    continue;
                };
                let surface = name.as_str();
                if surface.len() <= 3 || STOP_WORDS.contains(&surface.to_lowercase().as_str()) {
                    continue;
                }
                record(canonical_token(surface), surface, EntityCategory::Project);
            }
        }

        if let Some(re) = PATH_PATTERN.as_ref() {
            for caps in re.captures_iter(content) {
                let Some(path) = caps.get(1) else {
                    continue;
                };
                let surface = path.as_str();
                if surface.contains('/') || surface.matches('.').count() == 1 {
                    record(surface.to_lowercase(), surface, EntityCategory::Path);
                }
            }
        }

        found
            .into_iter()
            .map(|(normalized_form, (category, name))| EntityMention {
                name,
                normalized_form,
                item_id: item_id.to_string(),
                category,
            })
            .collect()
    }

    /// Populates `item.entities` from its title and content.
    pub fn tag(&self, item: &mut ContextItem) {
        item.entities = self.extract(&item.searchable_text());
    }

    /// Tags every item of a list in place.
    pub fn tag_all(&self, items: &mut [ContextItem]) {
        for item in items {
            self.tag(item);
        }
    }
}

/// One entity in an [`EntityIndex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedEntity {
    /// Canonical form.
    pub normalized_form: String,
    /// Strongest category seen.
    pub category: EntityCategory,
    /// Every surface spelling seen.
    pub aliases: BTreeSet<String>,
    /// Items mentioning the entity.
    pub items: BTreeSet<ItemKey>,
}

impl IndexedEntity {
    /// Number of items mentioning the entity.
    #[must_use]
    pub fn mention_count(&self) -> usize {
        self.items.len()
    }
}

/// Query-scoped index from canonical entity name to mentioning items.
///
/// Built from a fused result set and dropped with it.
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    entities: BTreeMap<String, IndexedEntity>,
}

impl EntityIndex {
    /// Builds an index over `items` using `extractor`.
    #[must_use]
    pub fn build(extractor: &EntityExtractor, items: &[ContextItem]) -> Self {
        let mut index = Self::default();
        for item in items {
            let key = item.key();
            for mention in extractor.extract_mentions(&item.searchable_text(), item.id()) {
                index.insert(&key, mention);
            }
        }
        index
    }

    fn insert(&mut self, key: &ItemKey, mention: EntityMention) {
        let entry = self
            .entities
            .entry(mention.normalized_form.clone())
            .or_insert_with(|| IndexedEntity {
                normalized_form: mention.normalized_form.clone(),
                category: mention.category,
                aliases: BTreeSet::new(),
                items: BTreeSet::new(),
            });
        if mention.category < entry.category {
            entry.category = mention.category;
        }
        entry.aliases.insert(mention.name);
        entry.items.insert(key.clone());
    }

    /// Number of distinct entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true when no entity was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Looks an entity up by any spelling.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&IndexedEntity> {
        self.entities.get(&EntityExtractor::normalize(name))
    }

    /// Entities co-mentioned with `name`, most shared items first.
    ///
    /// Ties break by canonical name.
    #[must_use]
    pub fn related_entities(&self, name: &str, limit: usize) -> Vec<(String, usize)> {
        let Some(target) = self.get(name) else {
            return Vec::new();
        };
        let mut related: Vec<(String, usize)> = self
            .entities
            .values()
            .filter(|e| e.normalized_form != target.normalized_form)
            .filter_map(|e| {
                let shared = e.items.intersection(&target.items).count();
                (shared > 0).then(|| (e.normalized_form.clone(), shared))
            })
            .collect();
        related.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        related.truncate(limit);
        related
    }

    /// All entities, most-mentioned first.
    #[must_use]
    pub fn ranked(&self) -> Vec<&IndexedEntity> {
        let mut all: Vec<&IndexedEntity> = self.entities.values().collect();
        all.sort_by(|a, b| {
            b.mention_count()
                .cmp(&a.mention_count())
                .then_with(|| a.normalized_form.cmp(&b.normalized_form))
        });
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemType, Source};
    use chrono::Utc;
    use test_case::test_case;

    #[test]
    fn test_oauth_spellings_resolve_to_one_entity() {
        let entities = EntityExtractor::new().extract("OAuth2 login via OAuth-2 provider");
        assert_eq!(entities.len(), 1, "{entities:?}");
        assert!(entities.contains("oauth2"));
    }

    #[test_case("OAuth2", "oauth2"; "camel")]
    #[test_case("oauth-2", "oauth2"; "kebab")]
    #[test_case("OAUTH_2", "oauth2"; "snake")]
    #[test_case("Node.js", "nodejs"; "dotted")]
    #[test_case("C++", "c++"; "symbols kept")]
    #[test_case(" personal-context ", "personalcontext"; "padded kebab")]
    #[test_case("src/Auth.rs", "src/auth.rs"; "path")]
    fn test_normalize(input: &str, expected: &str) {
        assert_eq!(EntityExtractor::normalize(input), expected);
    }

    #[test]
    fn test_extract_technologies() {
        let entities = EntityExtractor::new()
            .extract("Deployed the Rust service on Kubernetes behind PostgreSQL.");
        assert!(entities.contains("rust"));
        assert!(entities.contains("kubernetes"));
        assert!(entities.contains("postgresql"));
    }

    #[test]
    fn test_extract_tech_inside_compound_token() {
        let entities = EntityExtractor::new().extract("see docker-compose for details");
        assert!(entities.contains("docker"));
        assert!(entities.contains("dockercompose"));
    }

    #[test]
    fn test_project_forms_resolve_together() {
        let extractor = EntityExtractor::new();
        let pascal = extractor.extract("Working on PersonalContext today");
        let kebab = extractor.extract("the personal-context repo");
        assert!(pascal.contains("personalcontext"));
        assert!(kebab.contains("personalcontext"));
    }

    #[test]
    fn test_short_and_stop_words_are_not_projects() {
        let mentions = EntityExtractor::new().extract_mentions("an a-b thing", "x");
        assert!(mentions.is_empty(), "{mentions:?}");
    }

    #[test]
    fn test_extract_paths() {
        let mentions =
            EntityExtractor::new().extract_mentions("Touched src/services/relevance.rs today", "c1");
        let path = mentions
            .iter()
            .find(|m| m.category == EntityCategory::Path)
            .unwrap();
        assert_eq!(path.normalized_form, "src/services/relevance.rs");
        assert_eq!(path.item_id, "c1");
    }

    #[test]
    fn test_extract_is_idempotent() {
        let extractor = EntityExtractor::new();
        let text = "GraphQL gateway in TypeScript, see api/schema.ts and data-loader";
        assert_eq!(extractor.extract(text), extractor.extract(text));
    }

    #[test]
    fn test_empty_content() {
        assert!(EntityExtractor::new().extract("").is_empty());
    }

    #[test]
    fn test_index_related_entities() {
        let extractor = EntityExtractor::new();
        let now = Utc::now();
        let items = vec![
            ContextItem::new(Source::Notes, "a.md", ItemType::Note, "Rust and Redis cache", now),
            ContextItem::new(Source::VersionControl, "c1", ItemType::Commit, "rust redis fix", now),
            ContextItem::new(Source::Notes, "b.md", ItemType::Note, "Rust with Kafka", now),
        ];

        let index = EntityIndex::build(&extractor, &items);
        let rust = index.get("RUST").unwrap();
        assert_eq!(rust.mention_count(), 3);
        assert!(rust.aliases.contains("Rust"));
        assert!(rust.aliases.contains("rust"));

        let related = index.related_entities("rust", 10);
        assert_eq!(related[0], ("redis".to_string(), 2));
        assert_eq!(related[1], ("kafka".to_string(), 1));
        assert!(index.related_entities("unknown", 10).is_empty());
        assert_eq!(index.ranked()[0].normalized_form, "rust");
    }
}
