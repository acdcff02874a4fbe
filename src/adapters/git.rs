//! Git history adapter.
//!
//! Shells out to the `git` binary for every repository found at the
//! discovery root (the root itself and its immediate subdirectories).
//! Child processes are killed if the call is cancelled, so a timed-out
//! search never leaves a `git log` running.
//!
//! Beyond search and recency, the adapter answers per-file history and a
//! `git diff --stat` summary for one repository.

use super::{AdapterError, window_start, within};
use crate::models::{ContextItem, HealthStatus, ItemType, Source};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Field separator in `git log` output.
const FIELD_SEP: char = '\x1f';

/// Record separator in `git log` output.
const RECORD_SEP: char = '\x1e';

/// Hash, author date, author, subject, body.
const LOG_FORMAT: &str = "--format=%H%x1f%aI%x1f%an%x1f%s%x1f%b%x1e";

/// Score given to commits that only matched through a touched path.
const PATH_MATCH_SCORE: f32 = 0.3;

/// Files listed in a working-tree item before eliding the rest.
const MAX_STATUS_FILES: usize = 20;

/// Shown instead of an empty `--stat`.
const NO_CHANGES: &str = "No changes";

/// Uncommitted change summary for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    /// Repository directory name.
    pub repo: String,
    /// Whether this is the index (`--cached`) rather than the working tree.
    pub staged: bool,
    /// `git diff --stat` output, or `No changes`.
    pub stat: String,
    /// True when there is nothing to report.
    pub clean: bool,
}

impl DiffSummary {
    fn from_stat(repo: String, staged: bool, stat: &str) -> Self {
        let stat = stat.trim_end();
        let clean = stat.trim().is_empty();
        Self {
            repo,
            staged,
            stat: if clean { NO_CHANGES.to_string() } else { stat.to_string() },
            clean,
        }
    }
}

/// Adapter over git repositories under a discovery root.
#[derive(Debug, Clone)]
pub struct GitAdapter {
    root: PathBuf,
    timeout: Duration,
}

/// One parsed `git log` record.
#[derive(Debug, Clone, PartialEq)]
struct Commit {
    sha: String,
    timestamp: DateTime<Utc>,
    author: String,
    subject: String,
    body: String,
}

impl Commit {
    fn message(&self) -> String {
        if self.body.is_empty() {
            self.subject.clone()
        } else {
            format!("{}\n\n{}", self.subject, self.body)
        }
    }
}

/// Where a search hit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchedOn {
    Message,
    Path,
}

impl MatchedOn {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Path => "path",
        }
    }
}

impl GitAdapter {
    /// Creates an adapter over `root` with a 2 second call budget.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
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

    /// Searches commit messages and touched paths.
    ///
    /// A commit's score is `matched_terms / terms * 0.7` plus `0.1` per
    /// term occurrence in the message, capped at `0.3`. Commits found
    /// only through a touched path score `0.3`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Unavailable`] if the root is missing or
    /// every repository fails.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<ContextItem>, AdapterError> {
        let query_lower = query.trim().to_lowercase();
        let terms: Vec<String> = query_lower.split_whitespace().map(str::to_string).collect();
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let repos = self.repositories().await?;
        let mut scored: Vec<(f32, ContextItem)> = Vec::new();
        let mut failure = None;
        let mut succeeded = 0usize;

        for repo in &repos {
            match search_repo(repo, &terms, limit).await {
                Ok(hits) => {
                    succeeded += 1;
                    scored.extend(hits);
                },
                Err(e) => {
                    tracing::debug!(repo = %repo.display(), error = %e, "Skipping repository");
                    failure = Some(e);
                },
            }
        }
        if succeeded == 0 {
            if let Some(e) = failure {
                return Err(e);
            }
        }

        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| b.1.timestamp.cmp(&a.1.timestamp))
                .then_with(|| a.1.id().cmp(b.1.id()))
        });
        scored.truncate(limit);
        Ok(scored.into_iter().map(|(_, item)| item).collect())
    }

    /// Returns commits within `window` plus one item per dirty working tree.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Unavailable`] if the root is missing or
    /// every repository fails.
    pub async fn get_recent(
        &self,
        window: Duration,
        limit: usize,
    ) -> Result<Vec<ContextItem>, AdapterError> {
        let repos = self.repositories().await?;
        let since_arg = format!("--since={}", window_start(window).to_rfc3339());

        let mut items = Vec::new();
        let mut failure = None;
        let mut succeeded = 0usize;

        for repo in &repos {
            let name = repo_name(repo);
            let limit_arg = format!("-n{limit}");
            let log = run_git(repo, &["log", "--all", LOG_FORMAT, &since_arg, &limit_arg]).await;
            match log.and_then(|out| parse_log(&out)) {
                Ok(commits) => {
                    succeeded += 1;
                    items.extend(commits.into_iter().map(|c| commit_item(&name, c, None)));
                },
                Err(e) => {
                    tracing::debug!(repo = %repo.display(), error = %e, "Skipping repository");
                    failure = Some(e);
                    continue;
                },
            }
            match run_git(repo, &["status", "--porcelain"]).await {
                Ok(status) => items.extend(working_tree_item(&name, &status)),
                Err(e) => tracing::debug!(repo = %repo.display(), error = %e, "Status unavailable"),
            }
        }
        if succeeded == 0 {
            if let Some(e) = failure {
                return Err(e);
            }
        }

        items.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.id().cmp(b.id()))
        });
        items.truncate(limit);
        Ok(items)
    }

    /// Lists the last `count` commits touching `file`, newest first.
    ///
    /// With `repo` unset, repositories are tried in discovery order and the
    /// first one with any history for the path wins. Absolute paths inside a
    /// repository are made relative to it.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Unavailable`] if the root is missing, the named
    /// repository does not exist, or `git` fails; [`AdapterError::Timeout`]
    /// past the call budget.
    pub async fn get_file_history(
        &self,
        file: &str,
        repo: Option<&str>,
        count: usize,
    ) -> Result<Vec<ContextItem>, AdapterError> {
        let file = file.trim();
        if file.is_empty() || count == 0 {
            return Ok(Vec::new());
        }
        let lookup = async {
            let candidates = match repo {
                Some(name) => vec![self.select_repo(Some(name)).await?],
                None => self.repositories().await?,
            };
            for candidate in &candidates {
                let history = file_history(candidate, file, count).await?;
                if !history.is_empty() {
                    return Ok(history);
                }
            }
            Ok::<_, AdapterError>(Vec::new())
        };
        within(Source::VersionControl, self.timeout, lookup).await
    }

    /// Summarizes uncommitted changes with `git diff --stat`.
    ///
    /// `staged` reports the index instead of the working tree. With `repo`
    /// unset, the first discovered repository is used.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Unavailable`] if no matching repository exists
    /// or `git` fails; [`AdapterError::Timeout`] past the call budget.
    pub async fn diff_summary(
        &self,
        repo: Option<&str>,
        staged: bool,
    ) -> Result<DiffSummary, AdapterError> {
        let summary = async {
            let path = self.select_repo(repo).await?;
            let args: &[&str] = if staged {
                &["diff", "--cached", "--stat"]
            } else {
                &["diff", "--stat"]
            };
            let stat = run_git(&path, args).await?;
            Ok::<_, AdapterError>(DiffSummary::from_stat(repo_name(&path), staged, &stat))
        };
        within(Source::VersionControl, self.timeout, summary).await
    }

    /// Checks the `git` binary and the discovery root.
    pub async fn health_check(&self) -> HealthStatus {
        if !self.root.is_dir() {
            return HealthStatus::Unavailable(format!(
                "git root not found: {}",
                self.root.display()
            ));
        }
        let version = Command::new("git")
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;
        match version {
            Ok(out) if out.status.success() => match self.repositories().await {
                Ok(repos) if repos.is_empty() => {
                    HealthStatus::Degraded("no repositories under root".to_string())
                },
                Ok(_) => HealthStatus::Ok,
                Err(e) => e.to_health(),
            },
            Ok(out) => HealthStatus::Unavailable(format!("git --version exited with {}", out.status)),
            Err(e) => HealthStatus::Unavailable(format!("git not runnable: {e}")),
        }
    }

    /// The repository called `name`, or the first one discovered.
    async fn select_repo(&self, name: Option<&str>) -> Result<PathBuf, AdapterError> {
        let repos = self.repositories().await?;
        let root = self.root.display();
        let found = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => repos
                .into_iter()
                .find(|r| repo_name(r) == name)
                .ok_or_else(|| format!("no repository named '{name}' under {root}")),
            None => repos
                .into_iter()
                .next()
                .ok_or_else(|| format!("no repositories under {root}")),
        };
        found.map_err(|reason| AdapterError::Unavailable {
            adapter: Source::VersionControl,
            reason,
        })
    }

    /// The root if it is a repository, then its immediate subdirectories
    /// that are, sorted by path.
    async fn repositories(&self) -> Result<Vec<PathBuf>, AdapterError> {
        let unavailable = |reason: String| AdapterError::Unavailable {
            adapter: Source::VersionControl,
            reason,
        };
        let mut repos = Vec::new();
        if self.root.join(".git").exists() {
            repos.push(self.root.clone());
        }

        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| unavailable(format!("git root {}: {e}", self.root.display())))?;
        let mut children = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| unavailable(format!("git root {}: {e}", self.root.display())))?
        {
            let path = entry.path();
            if path.is_dir() && path.join(".git").exists() {
                children.push(path);
            }
        }
        children.sort();
        repos.extend(children);
        Ok(repos)
    }
}

fn repo_name(repo: &Path) -> String {
    repo.file_name()
        .map_or_else(|| repo.display().to_string(), |n| n.to_string_lossy().into_owned())
}

async fn run_git(repo: &Path, args: &[&str]) -> Result<String, AdapterError> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| AdapterError::Unavailable {
            adapter: Source::VersionControl,
            reason: format!("failed to run git: {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AdapterError::Unavailable {
            adapter: Source::VersionControl,
            reason: format!(
                "git {} exited with {}: {}",
                args.first().unwrap_or(&""),
                output.status,
                stderr.trim()
            ),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn parse_log(output: &str) -> Result<Vec<Commit>, AdapterError> {
    output
        .split(RECORD_SEP)
        .map(|r| r.trim_matches(|c: char| c == '\n' || c == '\r'))
        .filter(|r| !r.is_empty())
        .map(parse_record)
        .collect()
}

fn parse_record(record: &str) -> Result<Commit, AdapterError> {
    let malformed = |reason: String| AdapterError::Malformed {
        adapter: Source::VersionControl,
        reason,
    };
    let fields: Vec<&str> = record.splitn(5, FIELD_SEP).collect();
    let [sha, date, author, subject, body] = fields.as_slice() else {
        return Err(malformed(format!("expected 5 log fields, got {}", fields.len())));
    };
    let timestamp = DateTime::parse_from_rfc3339(date.trim())
        .map_err(|e| malformed(format!("bad commit date '{date}': {e}")))?
        .with_timezone(&Utc);
    Ok(Commit {
        sha: sha.trim().to_string(),
        timestamp,
        author: (*author).to_string(),
        subject: (*subject).to_string(),
        body: body.trim().to_string(),
    })
}

/// Message match score for one commit.
fn message_score(message: &str, terms: &[String]) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let lower = message.to_lowercase();
    let mut matched = 0usize;
    let mut occurrences = 0usize;
    for term in terms {
        let count = lower.matches(term.as_str()).count();
        if count > 0 {
            matched += 1;
            occurrences += count;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let coverage = matched as f32 / terms.len() as f32;
    #[allow(clippy::cast_precision_loss)]
    let bonus = (occurrences as f32 * 0.1).min(0.3);
    (coverage * 0.7 + bonus).clamp(0.0, 1.0)
}

async fn search_repo(
    repo: &Path,
    terms: &[String],
    limit: usize,
) -> Result<Vec<(f32, ContextItem)>, AdapterError> {
    let name = repo_name(repo);
    let limit_arg = format!("-n{limit}");

    let mut message_args: Vec<String> = vec![
        "log".to_string(),
        "--all".to_string(),
        "--regexp-ignore-case".to_string(),
        "--fixed-strings".to_string(),
        LOG_FORMAT.to_string(),
        limit_arg.clone(),
    ];
    message_args.extend(terms.iter().map(|t| format!("--grep={t}")));
    let args: Vec<&str> = message_args.iter().map(String::as_str).collect();
    let by_message = parse_log(&run_git(repo, &args).await?)?;

    let mut path_args: Vec<String> = vec![
        "log".to_string(),
        "--all".to_string(),
        LOG_FORMAT.to_string(),
        limit_arg,
        "--".to_string(),
    ];
    path_args.extend(terms.iter().map(|t| format!(":(icase)*{t}*")));
    let args: Vec<&str> = path_args.iter().map(String::as_str).collect();
    let by_path = parse_log(&run_git(repo, &args).await?)?;

    let mut hits: HashMap<String, (f32, MatchedOn, Commit)> = HashMap::new();
    for commit in by_message {
        let score = message_score(&commit.message(), terms);
        hits.insert(commit.sha.clone(), (score, MatchedOn::Message, commit));
    }
    for commit in by_path {
        hits.entry(commit.sha.clone())
            .or_insert((PATH_MATCH_SCORE, MatchedOn::Path, commit));
    }

    Ok(hits
        .into_values()
        .map(|(score, matched_on, commit)| {
            (score, commit_item(&name, commit, Some(matched_on)).with_semantic_score(score))
        })
        .collect())
}

async fn file_history(
    repo: &Path,
    file: &str,
    count: usize,
) -> Result<Vec<ContextItem>, AdapterError> {
    let path = Path::new(file);
    let relative = path
        .strip_prefix(repo)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned();
    let name = repo_name(repo);
    let count_arg = format!("-n{count}");
    let out = run_git(repo, &["log", LOG_FORMAT, &count_arg, "--", &relative]).await?;
    Ok(parse_log(&out)?
        .into_iter()
        .map(|c| commit_item(&name, c, None).with_metadata("path", relative.as_str()))
        .collect())
}

fn commit_item(repo: &str, commit: Commit, matched_on: Option<MatchedOn>) -> ContextItem {
    let content = commit.message();
    let mut item = ContextItem::new(
        Source::VersionControl,
        format!("{repo}:{}", commit.sha),
        ItemType::Commit,
        content,
        commit.timestamp,
    )
    .with_title(commit.subject)
    .with_metadata("repo", repo)
    .with_metadata("sha", commit.sha)
    .with_metadata("author", commit.author);
    if let Some(matched_on) = matched_on {
        item = item.with_metadata("matched_on", matched_on.as_str());
    }
    item
}

/// Builds a `Diff` item from `git status --porcelain`, if the tree is dirty.
fn working_tree_item(repo: &str, porcelain: &str) -> Option<ContextItem> {
    let mut staged = Vec::new();
    let mut modified = Vec::new();
    let mut untracked = Vec::new();

    for line in porcelain.lines().filter(|l| l.len() > 3) {
        let (status, file) = line.split_at(2);
        let file = file.trim().to_string();
        let mut flags = status.chars();
        let index = flags.next().unwrap_or(' ');
        let worktree = flags.next().unwrap_or(' ');
        if status == "??" {
            untracked.push(file);
            continue;
        }
        if "MADRCU".contains(index) {
            staged.push(file.clone());
        }
        if "MD".contains(worktree) {
            modified.push(file);
        }
    }
    if staged.is_empty() && modified.is_empty() && untracked.is_empty() {
        return None;
    }

    let mut sections = Vec::new();
    for (label, files) in [("Staged", &staged), ("Modified", &modified), ("Untracked", &untracked)] {
        if files.is_empty() {
            continue;
        }
        let mut listed = files.iter().take(MAX_STATUS_FILES).cloned().collect::<Vec<_>>().join(", ");
        if files.len() > MAX_STATUS_FILES {
            listed.push_str(&format!(" (+{} more)", files.len() - MAX_STATUS_FILES));
        }
        sections.push(format!("{label}: {listed}"));
    }

    let files: Vec<Value> = staged
        .iter()
        .chain(&modified)
        .chain(&untracked)
        .map(|f| Value::String(f.clone()))
        .collect();

    Some(
        ContextItem::new(
            Source::VersionControl,
            format!("{repo}:worktree"),
            ItemType::Diff,
            sections.join("\n"),
            Utc::now(),
        )
        .with_title(format!("[{repo}] Work in progress"))
        .with_metadata("repo", repo)
        .with_metadata("files", Value::Array(files))
        .with_observed_timestamp(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_records() {
        let out = "abc123\x1f2026-01-20T10:30:45-05:00\x1fAda\x1fFix oauth refresh\x1fRetry on 401\n\x1e\n\
                   def456\x1f2026-01-19T08:00:00+00:00\x1fBob\x1fInitial commit\x1f\x1e\n";
        let commits = parse_log(out).unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].sha, "abc123");
        assert_eq!(commits[0].body, "Retry on 401");
        assert_eq!(commits[0].timestamp.to_rfc3339(), "2026-01-20T15:30:45+00:00");
        assert_eq!(commits[1].message(), "Initial commit");
    }

    #[test]
    fn test_parse_log_rejects_bad_date() {
        let err = parse_log("abc\x1fyesterday\x1fAda\x1fmsg\x1f\x1e").unwrap_err();
        assert!(matches!(err, AdapterError::Malformed { .. }));
    }

    #[test]
    fn test_parse_log_empty() {
        assert!(parse_log("").unwrap().is_empty());
        assert!(parse_log("\n").unwrap().is_empty());
    }

    #[test]
    fn test_message_score() {
        let terms = vec!["oauth".to_string(), "refresh".to_string()];
        // both terms, two occurrences
        assert!((message_score("Fix OAuth refresh", &terms) - 0.9).abs() < 1e-6);
        // one of two terms, one occurrence
        assert!((message_score("oauth cleanup", &terms) - 0.45).abs() < 1e-6);
        assert!(message_score("unrelated", &terms).abs() < f32::EPSILON);
        // occurrence bonus caps at 0.3
        assert!((message_score("oauth oauth oauth oauth refresh", &terms) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_working_tree_item() {
        let porcelain = " M src/lib.rs\nA  src/new.rs\n?? scratch.txt\n";
        let item = working_tree_item("ctx", porcelain).unwrap();
        assert_eq!(item.id(), "ctx:worktree");
        assert_eq!(item.item_type, ItemType::Diff);
        assert!(item.timestamp_observed());
        assert_eq!(
            item.content,
            "Staged: src/new.rs\nModified: src/lib.rs\nUntracked: scratch.txt"
        );
        assert!(working_tree_item("ctx", "").is_none());
    }

    #[test]
    fn test_commit_item_metadata() {
        let commit = Commit {
            sha: "abc".to_string(),
            timestamp: Utc::now(),
            author: "Ada".to_string(),
            subject: "Fix".to_string(),
            body: String::new(),
        };
        let item = commit_item("ctx", commit, Some(MatchedOn::Path));
        assert_eq!(item.id(), "ctx:abc");
        assert_eq!(item.metadata["matched_on"], "path");
        assert_eq!(item.metadata["author"], "Ada");
        assert_eq!(item.title.as_deref(), Some("Fix"));
    }

    #[tokio::test]
    async fn test_missing_root_is_unavailable() {
        let err = GitAdapter::new("/nonexistent/repos").search("x", 5).await.unwrap_err();
        assert!(matches!(err, AdapterError::Unavailable { .. }));
        assert!(!GitAdapter::new("/nonexistent/repos").health_check().await.is_ok());
    }

    #[test]
    fn test_diff_summary_from_stat() {
        let clean = DiffSummary::from_stat("ctx".to_string(), false, "\n");
        assert!(clean.clean);
        assert_eq!(clean.stat, "No changes");

        let stat = " src/lib.rs | 4 ++--\n 1 file changed, 2 insertions(+), 2 deletions(-)\n";
        let dirty = DiffSummary::from_stat("ctx".to_string(), true, stat);
        assert!(!dirty.clean);
        assert!(dirty.staged);
        assert_eq!(dirty.stat, " src/lib.rs | 4 ++--\n 1 file changed, 2 insertions(+), 2 deletions(-)");
    }

    #[tokio::test]
    async fn test_diff_and_history_without_repos() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = GitAdapter::new(dir.path());
        let err = adapter.diff_summary(None, false).await.unwrap_err();
        assert!(matches!(err, AdapterError::Unavailable { .. }));
        assert!(adapter.diff_summary(Some("ghost"), true).await.is_err());
        assert!(adapter.get_file_history("src/lib.rs", None, 5).await.unwrap().is_empty());
        assert!(adapter.get_file_history("src/lib.rs", Some("ghost"), 5).await.is_err());
        assert!(adapter.get_file_history("  ", None, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_root_without_repos_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let items = GitAdapter::new(dir.path()).search("oauth", 5).await.unwrap();
        assert!(items.is_empty());
    }
}
