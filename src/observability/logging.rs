//! Structured logging configuration.
//!
//! Logs always go to stderr (or a file) so that stdout stays free for the
//! CLI's JSON output.

use crate::config::LoggingSettings;
use std::path::PathBuf;

/// Default filter when nothing else is configured.
const DEFAULT_FILTER: &str = "ctxfuse=warn";

/// Filter used with `--verbose`.
const VERBOSE_FILTER: &str = "ctxfuse=debug";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses `pretty` or `json`, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directive string.
    pub filter: String,
    /// Optional log file; stderr when absent.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: DEFAULT_FILTER.to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds logging configuration from environment variables only.
    #[must_use]
    pub fn from_env(verbose: bool) -> Self {
        Self::from_settings(None, verbose)
    }

    /// Builds logging configuration from config settings with env overrides.
    ///
    /// | Setting | Env override | Default |
    /// |---------|--------------|---------|
    /// | format | `CTXFUSE_LOG_FORMAT` | `pretty` |
    /// | filter | `CTXFUSE_LOG`, then `RUST_LOG` | `ctxfuse=warn` (`ctxfuse=debug` with `--verbose`) |
    /// | file | `CTXFUSE_LOG_FILE` | stderr |
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        let format = settings
            .and_then(|s| s.format.as_deref())
            .and_then(LogFormat::parse)
            .unwrap_or_default();
        let filter = if verbose {
            VERBOSE_FILTER.to_string()
        } else {
            settings
                .and_then(|s| s.filter.clone())
                .unwrap_or_else(|| DEFAULT_FILTER.to_string())
        };
        let file = settings.and_then(|s| s.file.clone());

        let mut config = Self {
            format,
            filter,
            file,
        };
        apply_env_overrides(&mut config);
        config
    }
}

fn apply_env_overrides(config: &mut LoggingConfig) {
    if let Some(format) = std::env::var("CTXFUSE_LOG_FORMAT")
        .ok()
        .as_deref()
        .and_then(LogFormat::parse)
    {
        config.format = format;
    }
    if let Some(filter) = std::env::var("CTXFUSE_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .filter(|f| !f.trim().is_empty())
    {
        config.filter = filter;
    }
    if let Some(file) = std::env::var("CTXFUSE_LOG_FILE")
        .ok()
        .filter(|f| !f.trim().is_empty())
    {
        config.file = Some(PathBuf::from(file));
    }
}
