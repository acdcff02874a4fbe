//! Markdown note vault adapter.
//!
//! Walks the vault for `*.md` files (skipping hidden directories such as
//! `.obsidian` or `.git`) and scores each note against the query terms.
//! Filesystem work runs on the blocking pool.
//!
//! # Match score
//!
//! | Signal | Contribution |
//! |--------|--------------|
//! | whole query in file name | 0.5 |
//! | each query term in file name | 0.2 |
//! | each query term in a tag | 0.2 |
//! | whole query in body | 0.05 per occurrence, at most 0.3 |
//! | each query term in body | 0.02 per occurrence, at most 0.2 per term |
//!
//! The sum is clamped to `[0, 1]` and becomes the item's `semantic_score`.
//!
//! Besides search, the adapter reads single notes, follows `[[wikilinks]]`
//! backwards, and lists notes by tag.

use super::{AdapterError, window_start, within};
use super::frontmatter::{FrontMatter, FrontMatterParser};
use crate::models::{ContextItem, HealthStatus, ItemType, Source};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use walkdir::{DirEntry, WalkDir};

/// Characters kept around the first match in search snippets.
const SNIPPET_CHARS: usize = 300;

/// Characters of body kept for time-window results.
const RECENT_CONTENT_CHARS: usize = 500;

/// Characters of body kept for tag listings.
const TAG_CONTENT_CHARS: usize = 300;

/// `[[target]]`, `[[target#heading]]`, `[[target|alias]]`.
static WIKILINK: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\[\[([^\]|#]+)(?:#[^\]|]*)?(?:\|[^\]]*)?\]\]").ok());

/// Adapter over a local markdown vault.
#[derive(Debug, Clone)]
pub struct NotesAdapter {
    vault: PathBuf,
    timeout: Duration,
}

/// A full note with the notes linking to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteDocument {
    /// Vault-relative path, `/`-separated.
    pub path: String,
    /// Front matter title, else the file stem.
    pub title: String,
    /// Body without front matter.
    pub content: String,
    /// Front matter and inline tags.
    pub tags: Vec<String>,
    /// Every front matter key.
    pub frontmatter: Map<String, Value>,
    /// File modification time, when the filesystem reports one.
    pub modified: Option<DateTime<Utc>>,
    /// Vault-relative paths of notes with a wikilink to this one, sorted.
    pub backlinks: Vec<String>,
}

/// One note read from disk.
struct Note {
    relative: String,
    stem: String,
    front: FrontMatter,
    body: String,
    tags: Vec<String>,
    modified: Option<DateTime<Utc>>,
}

impl NotesAdapter {
    /// Creates an adapter over `vault` with a 2 second call budget.
    #[must_use]
    pub fn new(vault: impl Into<PathBuf>) -> Self {
        Self {
            vault: vault.into(),
            timeout: Duration::from_secs(2),
        }
    }

    /// Sets the call budget.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the call budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the vault root.
    #[must_use]
    pub fn vault(&self) -> &Path {
        &self.vault
    }

    /// Searches notes by file name, tags, and body.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Unavailable`] if the vault is missing.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<ContextItem>, AdapterError> {
        let vault = self.vault.clone();
        let query = query.to_string();
        run_blocking(move || search_vault(&vault, &query, limit)).await
    }

    /// Returns notes modified within `window`, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Unavailable`] if the vault is missing.
    pub async fn get_recent(
        &self,
        window: Duration,
        limit: usize,
    ) -> Result<Vec<ContextItem>, AdapterError> {
        let vault = self.vault.clone();
        run_blocking(move || recent_notes(&vault, window, limit)).await
    }

    /// Reads one note by vault-relative path; the `.md` extension is optional.
    ///
    /// Paths that leave the vault, or name no markdown file, yield `None`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Unavailable`] if the vault is missing, or
    /// [`AdapterError::Timeout`] past the call budget.
    pub async fn read_note(&self, path: &str) -> Result<Option<NoteDocument>, AdapterError> {
        let vault = self.vault.clone();
        let path = path.to_string();
        let work = run_blocking(move || read_document(&vault, &path));
        within(Source::Notes, self.timeout, work).await
    }

    /// Lists notes that wikilink to `path`, sorted by path.
    ///
    /// A link matches on the target's file stem, case-insensitively, either
    /// bare (`[[oauth]]`) or with a folder prefix (`[[projects/oauth]]`).
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Unavailable`] if the vault is missing, or
    /// [`AdapterError::Timeout`] past the call budget.
    pub async fn get_backlinks(&self, path: &str) -> Result<Vec<String>, AdapterError> {
        let vault = self.vault.clone();
        let path = path.to_string();
        let work = run_blocking(move || {
            ensure_vault(&vault)?;
            Ok(backlinks(&vault, &path))
        });
        within(Source::Notes, self.timeout, work).await
    }

    /// Lists notes carrying `tag` in front matter or inline, newest first.
    ///
    /// A leading `#` is ignored and the comparison is case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Unavailable`] if the vault is missing, or
    /// [`AdapterError::Timeout`] past the call budget.
    pub async fn list_by_tag(&self, tag: &str, limit: usize) -> Result<Vec<ContextItem>, AdapterError> {
        let vault = self.vault.clone();
        let tag = tag.to_string();
        let work = run_blocking(move || tagged_notes(&vault, &tag, limit));
        within(Source::Notes, self.timeout, work).await
    }

    /// Reports whether the vault directory is readable.
    pub async fn health_check(&self) -> HealthStatus {
        let vault = self.vault.clone();
        let result = tokio::task::spawn_blocking(move || std::fs::read_dir(&vault).map(|_| ())).await;
        match result {
            Ok(Ok(())) => HealthStatus::Ok,
            Ok(Err(e)) => HealthStatus::Unavailable(format!("vault not readable: {e}")),
            Err(e) => HealthStatus::Unavailable(format!("health task failed: {e}")),
        }
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T, AdapterError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AdapterError> + Send + 'static,
{
    let context = crate::observability::current_context();
    tokio::task::spawn_blocking(move || {
        let _guard = context.map(crate::observability::enter_query_context);
        work()
    })
    .await
    .map_err(|e| AdapterError::Unavailable {
        adapter: Source::Notes,
        reason: format!("vault task failed: {e}"),
    })?
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn ensure_vault(vault: &Path) -> Result<(), AdapterError> {
    if vault.is_dir() {
        Ok(())
    } else {
        Err(AdapterError::Unavailable {
            adapter: Source::Notes,
            reason: format!("vault not found: {}", vault.display()),
        })
    }
}

/// Iterates over readable markdown notes, skipping hidden paths.
fn notes(vault: &Path) -> impl Iterator<Item = Note> + '_ {
    WalkDir::new(vault)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"))
        .filter_map(move |e| load_note(vault, e.path()))
}

fn load_note(vault: &Path, path: &Path) -> Option<Note> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable note");
            return None;
        },
    };
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from);

    let relative = path
        .strip_prefix(vault)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (front, body) = FrontMatterParser::parse_lenient(&raw);
    let mut tags = front.tags();
    for tag in FrontMatterParser::inline_tags(body) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    let body = body.to_string();

    Some(Note {
        relative,
        stem,
        front,
        body,
        tags,
        modified,
    })
}

/// Match score of one note, clamped to `[0, 1]`.
fn score_note(note: &Note, query_lower: &str, terms: &[&str]) -> f32 {
    let filename = note.stem.to_lowercase();
    let body = note.body.to_lowercase();
    let tags: Vec<String> = note.tags.iter().map(|t| t.to_lowercase()).collect();
    let mut score = 0.0_f32;

    if filename.contains(query_lower) {
        score += 0.5;
    }
    for term in terms {
        if filename.contains(term) {
            score += 0.2;
        }
        if tags.iter().any(|t| t.contains(term)) {
            score += 0.2;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let phrase_hits = body.matches(query_lower).count() as f32;
    score += (phrase_hits * 0.05).min(0.3);

    for term in terms {
        #[allow(clippy::cast_precision_loss)]
        let hits = body.matches(term).count() as f32;
        score += (hits * 0.02).min(0.2);
    }

    score.clamp(0.0, 1.0)
}

/// Takes `max_chars` characters around the first match of the query or a term.
fn extract_snippet(content: &str, query_lower: &str, terms: &[&str], max_chars: usize) -> String {
    // Lowercasing can change the character count (`İ` becomes two chars), so
    // each lowercased char remembers which original char it came from.
    let mut lower = String::with_capacity(content.len());
    let mut origin: Vec<usize> = Vec::with_capacity(content.len());
    for (idx, ch) in content.chars().enumerate() {
        for folded in ch.to_lowercase() {
            lower.push(folded);
            origin.push(idx);
        }
    }
    let found = lower
        .find(query_lower)
        .or_else(|| terms.iter().find_map(|t| lower.find(t)));

    let chars: Vec<char> = content.chars().collect();
    let Some(byte_idx) = found else {
        return chars.iter().take(max_chars).collect();
    };

    let idx = origin
        .get(lower[..byte_idx].chars().count())
        .copied()
        .unwrap_or(chars.len());
    let start = idx.saturating_sub(max_chars / 3);
    let end = (idx + max_chars * 2 / 3).min(chars.len());

    let mut snippet = String::new();
    if start > 0 {
        snippet.push_str("...");
    }
    snippet.extend(&chars[start..end]);
    if end < chars.len() {
        snippet.push_str("...");
    }
    snippet
}

fn to_item(note: Note, content: String) -> ContextItem {
    let title = note
        .front
        .title()
        .map_or_else(|| note.stem.clone(), str::to_string);
    let (timestamp, observed) = match note.modified {
        Some(ts) => (ts, false),
        None => (Utc::now(), true),
    };

    let mut item = ContextItem::new(Source::Notes, note.relative.clone(), ItemType::Note, content, timestamp)
        .with_title(title)
        .with_tags(note.tags)
        .with_metadata("path", note.relative);
    if !note.front.fields.is_empty() {
        item = item.with_metadata("frontmatter", Value::Object(note.front.fields));
    }
    if observed {
        item = item.with_observed_timestamp();
    }
    item
}

fn search_vault(vault: &Path, query: &str, limit: usize) -> Result<Vec<ContextItem>, AdapterError> {
    ensure_vault(vault)?;
    let query_lower = query.trim().to_lowercase();
    let terms: Vec<&str> = query_lower.split_whitespace().collect();
    if terms.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let mut scored: Vec<(f32, ContextItem)> = notes(vault)
        .filter_map(|note| {
            let score = score_note(&note, &query_lower, &terms);
            if score <= 0.0 {
                return None;
            }
            let snippet = extract_snippet(&note.body, &query_lower, &terms, SNIPPET_CHARS);
            Some((score, to_item(note, snippet).with_semantic_score(score)))
        })
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id().cmp(b.1.id())));
    scored.truncate(limit);

    tracing::debug!(results = scored.len(), "Vault search complete");
    Ok(scored.into_iter().map(|(_, item)| item).collect())
}

/// Joins `path` under the vault, refusing anything that could escape it.
fn resolve_note(vault: &Path, path: &str) -> Option<PathBuf> {
    let path = path.trim();
    let relative = Path::new(path);
    let contained = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if path.is_empty() || !contained {
        return None;
    }

    let is_markdown = |p: &Path| p.is_file() && p.extension().is_some_and(|ext| ext == "md");
    let direct = vault.join(relative);
    if is_markdown(direct.as_path()) {
        return Some(direct);
    }
    let with_extension = vault.join(format!("{path}.md"));
    is_markdown(with_extension.as_path()).then_some(with_extension)
}

fn read_document(vault: &Path, path: &str) -> Result<Option<NoteDocument>, AdapterError> {
    ensure_vault(vault)?;
    let Some(note) = resolve_note(vault, path).and_then(|file| load_note(vault, &file)) else {
        return Ok(None);
    };

    let backlinks = backlinks(vault, &note.relative);
    let title = note
        .front
        .title()
        .map_or_else(|| note.stem.clone(), str::to_string);
    Ok(Some(NoteDocument {
        path: note.relative,
        title,
        content: note.body,
        tags: note.tags,
        frontmatter: note.front.fields,
        modified: note.modified,
        backlinks,
    }))
}

/// Whether `body` holds a wikilink whose target resolves to `stem`.
fn links_to(body: &str, stem: &str) -> bool {
    let Some(re) = WIKILINK.as_ref() else {
        return false;
    };
    let suffix = format!("/{stem}");
    re.captures_iter(body).filter_map(|caps| caps.get(1)).any(|target| {
        let target = target.as_str().trim().to_lowercase();
        let target = target.strip_suffix(".md").unwrap_or(&target);
        target == stem || target.ends_with(&suffix)
    })
}

fn backlinks(vault: &Path, path: &str) -> Vec<String> {
    let name = path.trim().trim_end_matches(".md");
    let stem = name.rsplit('/').next().unwrap_or(name).to_lowercase();
    if stem.is_empty() {
        return Vec::new();
    }
    let own = format!("{name}.md");

    let mut linking: Vec<String> = notes(vault)
        .filter(|note| note.relative != own && links_to(&note.body, &stem))
        .map(|note| note.relative)
        .collect();
    linking.sort();
    linking
}

fn tagged_notes(vault: &Path, tag: &str, limit: usize) -> Result<Vec<ContextItem>, AdapterError> {
    ensure_vault(vault)?;
    let wanted = tag.trim().trim_start_matches('#').to_lowercase();
    if wanted.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let mut items: Vec<ContextItem> = notes(vault)
        .filter(|note| note.tags.iter().any(|t| t.to_lowercase() == wanted))
        .map(|note| {
            let content: String = note.body.chars().take(TAG_CONTENT_CHARS).collect();
            to_item(note, content)
        })
        .collect();

    items.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| a.id().cmp(b.id()))
    });
    items.truncate(limit);
    Ok(items)
}

fn recent_notes(vault: &Path, window: Duration, limit: usize) -> Result<Vec<ContextItem>, AdapterError> {
    ensure_vault(vault)?;
    let cutoff = window_start(window);

    let mut items: Vec<ContextItem> = notes(vault)
        .filter(|note| note.modified.is_none_or(|ts| ts >= cutoff))
        .map(|note| {
            let content: String = note.body.chars().take(RECENT_CONTENT_CHARS).collect();
            to_item(note, content)
        })
        .collect();

    items.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| a.id().cmp(b.id()))
    });
    items.truncate(limit);
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn vault() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("projects")).unwrap();
        fs::create_dir_all(dir.path().join(".obsidian")).unwrap();
        fs::write(
            dir.path().join("projects/oauth.md"),
            "---\ntitle: OAuth rollout\ntags: [auth]\n---\nWe rotate the oauth refresh token daily.",
        )
        .unwrap();
        fs::write(dir.path().join("groceries.md"), "eggs, milk, bread").unwrap();
        fs::write(dir.path().join(".obsidian/oauth.md"), "oauth oauth oauth").unwrap();
        fs::write(dir.path().join("notes.txt"), "oauth").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_search_scores_and_skips_hidden() {
        let dir = vault();
        let adapter = NotesAdapter::new(dir.path());
        let items = adapter.search("oauth", 10).await.unwrap();

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.id(), "projects/oauth.md");
        assert_eq!(item.title.as_deref(), Some("OAuth rollout"));
        assert_eq!(item.tags, vec!["auth".to_string()]);
        assert_eq!(item.metadata["path"], "projects/oauth.md");
        // name 0.5 + name term 0.2 + body phrase 0.05 + body term 0.02
        assert!((item.relevance.semantic_score() - 0.77).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_search_matches_tags() {
        let dir = vault();
        let items = NotesAdapter::new(dir.path()).search("auth", 10).await.unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].relevance.semantic_score() >= 0.2);
    }

    #[tokio::test]
    async fn test_search_no_match() {
        let dir = vault();
        let items = NotesAdapter::new(dir.path()).search("kubernetes", 10).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_missing_vault_is_unavailable() {
        let err = NotesAdapter::new("/nonexistent/vault")
            .search("x", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Unavailable { .. }));
        assert!(matches!(
            NotesAdapter::new("/nonexistent/vault").health_check().await,
            HealthStatus::Unavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_recent_returns_fresh_notes_newest_first() {
        let dir = vault();
        let items = NotesAdapter::new(dir.path())
            .get_recent(Duration::from_secs(3_600), 10)
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].timestamp >= items[1].timestamp);
        assert!(items.iter().all(|i| !i.timestamp_observed()));
    }

    #[test]
    fn test_snippet_centres_on_match() {
        let content = format!("{}needle{}", "a".repeat(400), "b".repeat(400));
        let snippet = extract_snippet(&content, "needle", &["needle"], 300);
        assert!(snippet.starts_with("..."));
        assert!(snippet.ends_with("..."));
        assert!(snippet.contains("needle"));
        assert_eq!(snippet.chars().count(), 306);
    }

    #[test]
    fn test_snippet_window_survives_length_changing_lowercase() {
        // 'İ' lowercases to two chars; the window must still land on the match.
        let content = format!("{}token{}", "İ".repeat(50), "x".repeat(100));
        let snippet = extract_snippet(&content, "token", &["token"], 30);
        assert!(snippet.contains("token"), "snippet drifted: {snippet}");
        assert_eq!(snippet, format!("...{}token{}...", "İ".repeat(10), "x".repeat(15)));
    }

    #[test]
    fn test_snippet_without_match_takes_prefix() {
        let snippet = extract_snippet("short body", "zzz", &["zzz"], 300);
        assert_eq!(snippet, "short body");
    }

    // ========================================================================
    // Single notes, backlinks, tags
    // ========================================================================

    fn linked_vault() -> tempfile::TempDir {
        let dir = vault();
        fs::write(
            dir.path().join("daily.md"),
            "Worked on [[OAuth|the rollout]] today. #standup",
        )
        .unwrap();
        fs::write(
            dir.path().join("projects/plan.md"),
            "---\ntags: [Auth, planning]\n---\nSee [[projects/oauth#Risks]].",
        )
        .unwrap();
        fs::write(dir.path().join("unrelated.md"), "[[oauthish]] and [[other]]").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_read_note_with_and_without_extension() {
        let dir = linked_vault();
        let adapter = NotesAdapter::new(dir.path());

        let note = adapter.read_note("projects/oauth").await.unwrap().unwrap();
        assert_eq!(note.path, "projects/oauth.md");
        assert_eq!(note.title, "OAuth rollout");
        assert_eq!(note.content, "We rotate the oauth refresh token daily.");
        assert_eq!(note.frontmatter["title"], "OAuth rollout");
        assert!(note.modified.is_some());
        assert_eq!(note.backlinks, vec!["daily.md".to_string(), "projects/plan.md".to_string()]);

        let same = adapter.read_note("projects/oauth.md").await.unwrap().unwrap();
        assert_eq!(same.path, note.path);
    }

    #[tokio::test]
    async fn test_read_note_missing_or_outside_vault() {
        let dir = linked_vault();
        let adapter = NotesAdapter::new(dir.path().join("projects"));
        assert!(adapter.read_note("nope").await.unwrap().is_none());
        assert!(adapter.read_note("../groceries").await.unwrap().is_none());
        assert!(adapter.read_note("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_backlinks_match_stem_case_insensitively() {
        let dir = linked_vault();
        let adapter = NotesAdapter::new(dir.path());
        let links = adapter.get_backlinks("projects/oauth.md").await.unwrap();
        assert_eq!(links, vec!["daily.md".to_string(), "projects/plan.md".to_string()]);

        assert!(adapter.get_backlinks("groceries").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_by_tag_reads_front_matter_and_inline_tags() {
        let dir = linked_vault();
        let adapter = NotesAdapter::new(dir.path());

        let mut ids: Vec<String> = adapter
            .list_by_tag("#auth", 10)
            .await
            .unwrap()
            .iter()
            .map(|i| i.id().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["projects/oauth.md".to_string(), "projects/plan.md".to_string()]);

        let standup = adapter.list_by_tag("STANDUP", 10).await.unwrap();
        assert_eq!(standup.len(), 1);
        assert_eq!(standup[0].id(), "daily.md");

        assert_eq!(adapter.list_by_tag("auth", 1).await.unwrap().len(), 1);
        assert!(adapter.list_by_tag("#", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_note_lookups_on_missing_vault_are_unavailable() {
        let adapter = NotesAdapter::new("/nonexistent/vault");
        assert!(matches!(
            adapter.read_note("x").await.unwrap_err(),
            AdapterError::Unavailable { .. }
        ));
        assert!(adapter.get_backlinks("x").await.is_err());
        assert!(adapter.list_by_tag("x", 5).await.is_err());
    }
}
