//! Binary entry point for ctxfuse.
//!
//! Every command prints JSON to stdout; logs go to stderr.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use ctxfuse::config::FusionConfig;
use ctxfuse::models::{ContextItem, Source};
use ctxfuse::observability::{self, LoggingConfig};
use ctxfuse::{ContextAggregator, Error, GitAdapter, NotesAdapter, RemoteKbAdapter};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

/// ctxfuse - one ranked answer from your notes, git history, and knowledge base.
#[derive(Parser)]
#[command(name = "ctxfuse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "CTXFUSE_CONFIG_PATH")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Search every source and print one fused list.
    Search {
        /// The search query.
        query: String,

        /// Restrict to these sources (notes, git, remote).
        #[arg(short, long, value_delimiter = ',', value_parser = parse_source)]
        source: Vec<Source>,

        /// Maximum number of results.
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show recent activity across sources, newest first.
    Recent {
        /// Look-back window, e.g. `90m`, `24h`, `7d` (bare numbers are hours).
        #[arg(short, long, default_value = "24h", value_parser = parse_window)]
        window: Duration,

        /// Restrict to these sources (notes, git, remote).
        #[arg(short, long, value_delimiter = ',', value_parser = parse_source)]
        source: Vec<Source>,
    },

    /// Show what is being worked on right now.
    Working,

    /// Show recent items mentioning an entity.
    Entity {
        /// Entity name, e.g. `OAuth2` or `src/auth.rs`.
        name: String,

        /// Number of co-occurring entities to list.
        #[arg(short, long, default_value = "5")]
        related: usize,
    },

    /// Read notes, follow backlinks, and list notes by tag.
    Note {
        #[command(subcommand)]
        action: NoteCommand,
    },

    /// Per-file history and diff summaries from git.
    Git {
        #[command(subcommand)]
        action: GitCommand,
    },

    /// Direct lookups against the remote knowledge base.
    Kb {
        #[command(subcommand)]
        action: KbCommand,
    },

    /// Probe every configured source.
    Health,

    /// Print the effective configuration.
    Config,
}

/// Note vault lookups.
#[derive(Subcommand)]
enum NoteCommand {
    /// Print one note with its front matter and backlinks.
    Read {
        /// Vault-relative path; `.md` is optional.
        path: String,
    },

    /// List notes that wikilink to a note.
    Backlinks {
        /// Vault-relative path of the linked note.
        path: String,
    },

    /// List notes carrying a tag, newest first.
    Tag {
        /// Tag name, with or without a leading `#`.
        tag: String,

        /// Maximum number of notes.
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

/// Git lookups.
#[derive(Subcommand)]
enum GitCommand {
    /// Show the commits that touched a file.
    History {
        /// File path, relative to its repository.
        file: String,

        /// Repository directory name under the git root.
        #[arg(short, long)]
        repo: Option<String>,

        /// Number of commits.
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },

    /// Summarize uncommitted changes (`git diff --stat`).
    Diff {
        /// Repository directory name under the git root.
        #[arg(short, long)]
        repo: Option<String>,

        /// Report staged changes instead of the working tree.
        #[arg(long)]
        staged: bool,
    },
}

/// Knowledge-base lookups.
#[derive(Subcommand)]
enum KbCommand {
    /// Fetch one item by id.
    Item {
        /// Item id.
        id: String,
    },

    /// List the namespaces the service knows about.
    Namespaces,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let logging = LoggingConfig::from_settings(Some(&config.logging), cli.verbose);
    if let Err(e) = observability::init(logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Loads configuration: explicit path (flag or `CTXFUSE_CONFIG_PATH`), else
/// the default locations. Env overrides and validation apply either way.
fn load_config(path: Option<&str>) -> Result<FusionConfig, Error> {
    let base = match path.filter(|p| !p.trim().is_empty()) {
        Some(config_path) => FusionConfig::load_from_file(Path::new(config_path))?,
        None => FusionConfig::load_default(),
    };

    let config = base.with_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Runs the selected command.
async fn run_command(command: Commands, config: FusionConfig) -> Result<(), Box<dyn std::error::Error>> {
    let aggregator = || ContextAggregator::from_config(&config);
    match command {
        Commands::Search {
            query,
            source,
            limit,
        } => {
            let sources = source_filter(source);
            let limit = limit.unwrap_or(config.default_limit);
            let items = aggregator()?
                .search_all(&query, sources.as_ref(), limit)
                .await;
            print_json(&items)
        },
        Commands::Recent { window, source } => {
            let sources = source_filter(source);
            let items = aggregator()?
                .get_recent_activity(window, sources.as_ref())
                .await;
            print_json(&items)
        },
        Commands::Working => print_json(&aggregator()?.get_working_context().await),
        Commands::Entity { name, related } => cmd_entity(&aggregator()?, &name, related).await,
        Commands::Note { action } => cmd_note(notes_adapter(&config)?, action).await,
        Commands::Git { action } => cmd_git(git_adapter(&config)?, action).await,
        Commands::Kb { action } => cmd_kb(remote_adapter(&config)?, action).await,
        Commands::Health => {
            let statuses: Vec<Value> = aggregator()?
                .health()
                .await
                .into_iter()
                .map(|(source, status)| json!({ "source": source, "health": status }))
                .collect();
            print_json(&statuses)
        },
        Commands::Config => print_json(&config_json(&config)),
    }
}

/// Entity command: matching items plus co-occurring entities.
async fn cmd_entity(
    aggregator: &ContextAggregator,
    name: &str,
    related: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let items: Vec<ContextItem> = aggregator.get_entity_context(name).await;
    let index = aggregator.entity_index(&items);
    let normalized = ctxfuse::EntityExtractor::normalize(name);
    let related: Vec<Value> = index
        .related_entities(&normalized, related)
        .into_iter()
        .map(|(entity, count)| json!({ "entity": entity, "co_mentions": count }))
        .collect();

    print_json(&json!({
        "entity": normalized,
        "aliases": index.get(&normalized).map(|e| e.aliases.clone()).unwrap_or_default(),
        "items": items,
        "related": related,
    }))
}

async fn cmd_note(adapter: NotesAdapter, action: NoteCommand) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        NoteCommand::Read { path } => match adapter.read_note(&path).await? {
            Some(note) => print_json(&note),
            None => Err(Error::InvalidInput(format!("note not found: {path}")).into()),
        },
        NoteCommand::Backlinks { path } => print_json(&adapter.get_backlinks(&path).await?),
        NoteCommand::Tag { tag, limit } => print_json(&adapter.list_by_tag(&tag, limit).await?),
    }
}

async fn cmd_git(adapter: GitAdapter, action: GitCommand) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        GitCommand::History { file, repo, count } => {
            let commits = adapter
                .get_file_history(&file, repo.as_deref(), count)
                .await?;
            print_json(&commits)
        },
        GitCommand::Diff { repo, staged } => {
            print_json(&adapter.diff_summary(repo.as_deref(), staged).await?)
        },
    }
}

async fn cmd_kb(adapter: RemoteKbAdapter, action: KbCommand) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        KbCommand::Item { id } => match adapter.get_item(&id).await? {
            Some(item) => print_json(&item),
            None => Err(Error::InvalidInput(format!("item not found: {id}")).into()),
        },
        KbCommand::Namespaces => print_json(&adapter.get_namespaces().await?),
    }
}

fn notes_adapter(config: &FusionConfig) -> Result<NotesAdapter, Error> {
    let notes = config.sources.notes.as_ref().ok_or_else(|| not_configured("notes"))?;
    Ok(NotesAdapter::new(&notes.path).with_timeout(config.timeouts.adapter()))
}

fn git_adapter(config: &FusionConfig) -> Result<GitAdapter, Error> {
    let git = config.sources.git.as_ref().ok_or_else(|| not_configured("git"))?;
    Ok(GitAdapter::new(&git.root).with_timeout(config.timeouts.adapter()))
}

fn remote_adapter(config: &FusionConfig) -> Result<RemoteKbAdapter, Error> {
    let remote = config.sources.remote.as_ref().ok_or_else(|| not_configured("remote"))?;
    Ok(RemoteKbAdapter::new(remote.clone()).with_timeout(config.timeouts.adapter()))
}

fn not_configured(source: &str) -> Error {
    Error::Configuration(format!("the {source} source is not configured"))
}

fn source_filter(sources: Vec<Source>) -> Option<BTreeSet<Source>> {
    if sources.is_empty() {
        None
    } else {
        Some(sources.into_iter().collect())
    }
}

fn parse_source(value: &str) -> Result<Source, String> {
    Source::parse(value).ok_or_else(|| {
        format!("unknown source '{value}' (expected notes, git, or remote)")
    })
}

/// Parses `30m`, `48h`, `7d`, or a bare number of hours.
fn parse_window(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let (digits, unit_secs) = match value.char_indices().last() {
        Some((idx, 'm')) => (&value[..idx], 60),
        Some((idx, 'h')) => (&value[..idx], 3_600),
        Some((idx, 'd')) => (&value[..idx], 86_400),
        _ => (value, 3_600),
    };
    let amount: u64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid window '{value}' (expected e.g. 90m, 24h, 7d)"))?;
    if amount == 0 {
        return Err("window must be greater than zero".to_string());
    }
    amount
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("window '{value}' is too large"))
}

fn config_json(config: &FusionConfig) -> Value {
    let weights = &config.relevance.weights;
    let source_weights = &config.relevance.source_weights;
    json!({
        "scoring": {
            "half_life_days": config.relevance.half_life_days,
            "weights": {
                "semantic": weights.semantic,
                "recency": weights.recency,
                "source_quality": weights.source_quality,
                "frequency": weights.frequency,
            },
            "source_weights": {
                "notes": source_weights.notes,
                "version_control": source_weights.version_control,
                "remote": source_weights.remote,
            },
        },
        "fusion": { "rrf_k": config.rrf.k },
        "dedup": {
            "threshold": config.dedup.threshold,
            "shingle_size": config.dedup.shingle_size,
        },
        "diversity": {
            "top_k": config.diversity.top_k,
            "max_source_share": config.diversity.max_source_share,
        },
        "timeouts": {
            "adapter_ms": config.timeouts.adapter_ms,
            "overall_ms": config.timeouts.overall_ms,
        },
        "windows": {
            "working_hours": config.windows.working_hours,
            "entity_days": config.windows.entity_days,
            "recent_limit": config.windows.recent_limit,
        },
        "search": { "default_limit": config.default_limit },
        "sources": {
            "notes": config.sources.notes.as_ref().map(|n| n.path.display().to_string()),
            "git": config.sources.git.as_ref().map(|g| g.root.display().to_string()),
            "remote": config.sources.remote.as_ref().map(|r| json!({
                "url": r.url,
                "score_scale": format!("{:?}", r.score_scale),
                "namespace": r.namespace,
                "max_content_chars": r.max_content_chars,
            })),
        },
    })
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
