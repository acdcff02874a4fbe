//! Configuration management.
//!
//! [`FusionConfig`] is an explicit value handed to every service at
//! construction. Nothing reads tunables from globals, so two aggregators with
//! different tuning can answer queries side by side.
//!
//! Values are layered: defaults, then the TOML file, then `CTXFUSE_*`
//! environment overrides. [`FusionConfig::validate`] runs last.

use crate::adapters::ScoreScale;
use crate::services::{DeduplicationConfig, DiversityConfig, RelevanceConfig, RrfConfig};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for ctxfuse.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionConfig {
    /// Relevance scoring tunables.
    pub relevance: RelevanceConfig,
    /// Reciprocal rank fusion tunables.
    pub rrf: RrfConfig,
    /// Cross-source deduplication tunables.
    pub dedup: DeduplicationConfig,
    /// Top-K diversity cap.
    pub diversity: DiversityConfig,
    /// Per-adapter and overall time budgets.
    pub timeouts: TimeoutConfig,
    /// Time windows for the recent-activity compositions.
    pub windows: WindowConfig,
    /// Result limit when the caller does not give one.
    pub default_limit: usize,
    /// Registered sources.
    pub sources: SourcesConfig,
    /// Logging settings, resolved by the observability layer.
    pub logging: LoggingSettings,
}

/// Time budgets for adapter fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Budget for a single adapter call in milliseconds.
    pub adapter_ms: u64,
    /// Budget for the whole fan-out in milliseconds.
    pub overall_ms: u64,
}

impl TimeoutConfig {
    /// Returns the per-adapter budget.
    #[must_use]
    pub const fn adapter(&self) -> Duration {
        Duration::from_millis(self.adapter_ms)
    }

    /// Returns the overall budget.
    #[must_use]
    pub const fn overall(&self) -> Duration {
        Duration::from_millis(self.overall_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            adapter_ms: 2_000,
            overall_ms: 5_000,
        }
    }
}

/// Windows used by the time-based operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    /// Window for working context, in hours.
    pub working_hours: u64,
    /// Window of the corpus searched for entity context, in days.
    pub entity_days: u64,
    /// Maximum items requested from each adapter for time-window queries.
    pub recent_limit: usize,
}

impl WindowConfig {
    /// Returns the working-context window, saturating on absurd values.
    #[must_use]
    pub const fn working(&self) -> Duration {
        Duration::from_secs(self.working_hours.saturating_mul(3_600))
    }

    /// Returns the entity-context window, saturating on absurd values.
    #[must_use]
    pub const fn entity(&self) -> Duration {
        Duration::from_secs(self.entity_days.saturating_mul(86_400))
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            working_hours: 48,
            entity_days: 30,
            recent_limit: 50,
        }
    }
}

/// Sources to register. A `None` section means the source is not used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourcesConfig {
    /// Note vault.
    pub notes: Option<NotesSourceConfig>,
    /// Git repositories.
    pub git: Option<GitSourceConfig>,
    /// Remote knowledge base.
    pub remote: Option<RemoteSourceConfig>,
}

impl SourcesConfig {
    /// Returns the number of configured sources.
    #[must_use]
    pub fn count(&self) -> usize {
        usize::from(self.notes.is_some())
            + usize::from(self.git.is_some())
            + usize::from(self.remote.is_some())
    }
}

/// Note vault location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesSourceConfig {
    /// Vault root directory.
    pub path: PathBuf,
}

/// Git discovery root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSourceConfig {
    /// A repository, or a directory whose immediate children are repositories.
    pub root: PathBuf,
}

/// Remote knowledge-base endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSourceConfig {
    /// Base URL, e.g. `http://localhost:8000`.
    pub url: String,
    /// Scale of the service's native relevance scores.
    pub score_scale: ScoreScale,
    /// Optional namespace filter sent with every search.
    pub namespace: Option<String>,
    /// Content longer than this is truncated.
    pub max_content_chars: usize,
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl RemoteSourceConfig {
    /// Creates a remote source with default scale and truncation.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            score_scale: ScoreScale::default(),
            namespace: None,
            max_content_chars: 500,
            connect_timeout_ms: 1_000,
        }
    }

    /// Sets the score scale.
    #[must_use]
    pub const fn with_score_scale(mut self, scale: ScoreScale) -> Self {
        self.score_scale = scale;
        self
    }
}

/// Raw logging settings; see `observability::LoggingConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// `EnvFilter` directive string.
    pub filter: Option<String>,
    /// Optional log file; stderr otherwise.
    pub file: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Scoring section.
    pub scoring: Option<ConfigFileScoring>,
    /// Fusion section.
    pub fusion: Option<ConfigFileFusion>,
    /// Dedup section.
    pub dedup: Option<ConfigFileDedup>,
    /// Diversity section.
    pub diversity: Option<ConfigFileDiversity>,
    /// Timeouts section.
    pub timeouts: Option<ConfigFileTimeouts>,
    /// Windows section.
    pub windows: Option<ConfigFileWindows>,
    /// Search section.
    pub search: Option<ConfigFileSearch>,
    /// Sources section.
    pub sources: Option<ConfigFileSources>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
}

/// Scoring section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileScoring {
    /// Recency half-life in days.
    pub half_life_days: Option<f64>,
    /// Composite weights.
    pub weights: Option<ConfigFileWeights>,
    /// Per-source quality weights.
    pub source_weights: Option<ConfigFileSourceWeights>,
}

/// Composite weights in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileWeights {
    /// Semantic weight.
    pub semantic: Option<f32>,
    /// Recency weight.
    pub recency: Option<f32>,
    /// Source quality weight.
    pub source_quality: Option<f32>,
    /// Frequency weight.
    pub frequency: Option<f32>,
}

/// Source weights in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileSourceWeights {
    /// Notes weight.
    pub notes: Option<f32>,
    /// Version control weight.
    pub version_control: Option<f32>,
    /// Remote knowledge base weight.
    pub remote: Option<f32>,
}

/// Fusion section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileFusion {
    /// RRF smoothing constant.
    pub rrf_k: Option<f32>,
}

/// Dedup section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileDedup {
    /// Jaccard threshold.
    pub threshold: Option<f32>,
    /// Shingle width in words.
    pub shingle_size: Option<usize>,
}

/// Diversity section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileDiversity {
    /// Window the cap applies to.
    pub top_k: Option<usize>,
    /// Maximum share of the window for one source.
    pub max_source_share: Option<f32>,
}

/// Timeouts section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileTimeouts {
    /// Per-adapter budget.
    pub adapter_ms: Option<u64>,
    /// Overall budget.
    pub overall_ms: Option<u64>,
}

/// Windows section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileWindows {
    /// Working-context window in hours.
    pub working_hours: Option<u64>,
    /// Entity-context window in days.
    pub entity_days: Option<u64>,
    /// Per-adapter limit for window queries.
    pub recent_limit: Option<usize>,
}

/// Search section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileSearch {
    /// Default result limit.
    pub default_limit: Option<usize>,
}

/// Sources section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileSources {
    /// `[sources.notes]`.
    pub notes: Option<ConfigFileNotes>,
    /// `[sources.git]`.
    pub git: Option<ConfigFileGit>,
    /// `[sources.remote]`.
    pub remote: Option<ConfigFileRemote>,
}

/// Notes source in config file.
#[derive(Debug, Deserialize)]
pub struct ConfigFileNotes {
    /// Vault path.
    pub path: String,
}

/// Git source in config file.
#[derive(Debug, Deserialize)]
pub struct ConfigFileGit {
    /// Discovery root.
    pub root: String,
}

/// Remote source in config file.
#[derive(Debug, Deserialize)]
pub struct ConfigFileRemote {
    /// Base URL.
    pub url: String,
    /// `unit`, `cosine`, or `bm25`.
    pub score_scale: Option<String>,
    /// BM25 saturation constant (only with `bm25`).
    pub bm25_saturation: Option<f32>,
    /// Namespace filter.
    pub namespace: Option<String>,
    /// Truncation length.
    pub max_content_chars: Option<usize>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            relevance: RelevanceConfig::default(),
            rrf: RrfConfig::default(),
            dedup: DeduplicationConfig::default(),
            diversity: DiversityConfig::default(),
            timeouts: TimeoutConfig::default(),
            windows: WindowConfig::default(),
            default_limit: 20,
            sources: SourcesConfig::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl FusionConfig {
    /// Creates a new configuration with default values and no sources.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        Self::parse_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for [`ConfigFile`], or
    /// names an unknown score scale.
    pub fn parse_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/ctxfuse/` on macOS)
    /// 2. XDG config dir (`~/.config/ctxfuse/` for Unix compatibility)
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let platform_config = base_dirs.config_dir().join("ctxfuse").join("config.toml");
        if platform_config.exists() {
            match Self::load_from_file(&platform_config) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %platform_config.display(), error = %e, "Ignoring unreadable config file");
                },
            }
        }

        let xdg_config = base_dirs
            .home_dir()
            .join(".config")
            .join("ctxfuse")
            .join("config.toml");
        if xdg_config.exists() {
            match Self::load_from_file(&xdg_config) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %xdg_config.display(), error = %e, "Ignoring unreadable config file");
                },
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `FusionConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(scoring) = file.scoring {
            config.apply_scoring(scoring);
        }
        if let Some(k) = file.fusion.and_then(|f| f.rrf_k) {
            config.rrf.k = k;
        }
        if let Some(dedup) = file.dedup {
            if let Some(v) = dedup.threshold {
                config.dedup.threshold = v;
            }
            if let Some(v) = dedup.shingle_size {
                config.dedup.shingle_size = v;
            }
        }
        if let Some(diversity) = file.diversity {
            if let Some(v) = diversity.top_k {
                config.diversity.top_k = v;
            }
            if let Some(v) = diversity.max_source_share {
                config.diversity.max_source_share = v;
            }
        }
        if let Some(timeouts) = file.timeouts {
            if let Some(v) = timeouts.adapter_ms {
                config.timeouts.adapter_ms = v;
            }
            if let Some(v) = timeouts.overall_ms {
                config.timeouts.overall_ms = v;
            }
        }
        if let Some(windows) = file.windows {
            if let Some(v) = windows.working_hours {
                config.windows.working_hours = v;
            }
            if let Some(v) = windows.entity_days {
                config.windows.entity_days = v;
            }
            if let Some(v) = windows.recent_limit {
                config.windows.recent_limit = v;
            }
        }
        if let Some(v) = file.search.and_then(|s| s.default_limit) {
            config.default_limit = v;
        }
        if let Some(sources) = file.sources {
            config.sources = sources_from_file(sources)?;
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }

        Ok(config)
    }

    fn apply_scoring(&mut self, scoring: ConfigFileScoring) {
        if let Some(v) = scoring.half_life_days {
            self.relevance.half_life_days = v;
        }
        if let Some(weights) = scoring.weights {
            let target = &mut self.relevance.weights;
            if let Some(v) = weights.semantic {
                target.semantic = v;
            }
            if let Some(v) = weights.recency {
                target.recency = v;
            }
            if let Some(v) = weights.source_quality {
                target.source_quality = v;
            }
            if let Some(v) = weights.frequency {
                target.frequency = v;
            }
        }
        if let Some(weights) = scoring.source_weights {
            let target = &mut self.relevance.source_weights;
            if let Some(v) = weights.notes {
                target.notes = v;
            }
            if let Some(v) = weights.version_control {
                target.version_control = v;
            }
            if let Some(v) = weights.remote {
                target.remote = v;
            }
        }
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = env_string("CTXFUSE_NOTES_PATH") {
            self.sources.notes = Some(NotesSourceConfig {
                path: PathBuf::from(path),
            });
        }
        if let Some(root) = env_string("CTXFUSE_GIT_ROOT") {
            self.sources.git = Some(GitSourceConfig {
                root: PathBuf::from(root),
            });
        }
        if let Some(url) = env_string("CTXFUSE_REMOTE_URL") {
            self.sources.remote = Some(match self.sources.remote.take() {
                Some(mut remote) => {
                    remote.url = url;
                    remote
                },
                None => RemoteSourceConfig::new(url),
            });
        }
        if let Some(v) = env_parse::<u64>("CTXFUSE_ADAPTER_TIMEOUT_MS") {
            self.timeouts.adapter_ms = v;
        }
        if let Some(v) = env_parse::<u64>("CTXFUSE_OVERALL_TIMEOUT_MS") {
            self.timeouts.overall_ms = v;
        }
        if let Some(v) = env_parse::<f32>("CTXFUSE_RRF_K") {
            self.rrf.k = v;
        }
        if let Some(v) = env_parse::<f32>("CTXFUSE_DEDUP_THRESHOLD") {
            self.dedup.threshold = v;
        }
        self
    }

    /// Checks every tunable against its documented range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the first offending option.
    pub fn validate(&self) -> Result<()> {
        self.relevance.validate()?;
        self.rrf.validate()?;
        self.dedup.validate()?;
        self.diversity.validate()?;
        if self.timeouts.adapter_ms == 0 || self.timeouts.overall_ms == 0 {
            return Err(Error::Configuration(
                "timeouts.adapter_ms and timeouts.overall_ms must be greater than zero"
                    .to_string(),
            ));
        }
        if self.windows.working_hours == 0 || self.windows.entity_days == 0 {
            return Err(Error::Configuration(
                "windows.working_hours and windows.entity_days must be greater than zero"
                    .to_string(),
            ));
        }
        if self.default_limit == 0 {
            return Err(Error::Configuration(
                "search.default_limit must be greater than zero".to_string(),
            ));
        }
        if let Some(remote) = &self.sources.remote {
            remote.score_scale.validate()?;
        }
        Ok(())
    }

    /// Registers the note vault.
    #[must_use]
    pub fn with_notes(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.notes = Some(NotesSourceConfig { path: path.into() });
        self
    }

    /// Registers the git discovery root.
    #[must_use]
    pub fn with_git(mut self, root: impl Into<PathBuf>) -> Self {
        self.sources.git = Some(GitSourceConfig { root: root.into() });
        self
    }

    /// Registers the remote knowledge base.
    #[must_use]
    pub fn with_remote(mut self, remote: RemoteSourceConfig) -> Self {
        self.sources.remote = Some(remote);
        self
    }

    /// Sets the time budgets.
    #[must_use]
    pub const fn with_timeouts(mut self, adapter_ms: u64, overall_ms: u64) -> Self {
        self.timeouts = TimeoutConfig {
            adapter_ms,
            overall_ms,
        };
        self
    }
}

fn sources_from_file(file: ConfigFileSources) -> Result<SourcesConfig> {
    let remote = match file.remote {
        Some(remote) => {
            let mut config = RemoteSourceConfig::new(remote.url);
            if let Some(scale) = remote.score_scale {
                config.score_scale = ScoreScale::parse(&scale, remote.bm25_saturation)?;
            }
            config.namespace = remote.namespace;
            if let Some(v) = remote.max_content_chars {
                config.max_content_chars = v;
            }
            if let Some(v) = remote.connect_timeout_ms {
                config.connect_timeout_ms = v;
            }
            Some(config)
        },
        None => None,
    };

    Ok(SourcesConfig {
        notes: file.notes.map(|n| NotesSourceConfig {
            path: PathBuf::from(n.path),
        }),
        git: file.git.map(|g| GitSourceConfig {
            root: PathBuf::from(g.root),
        }),
        remote,
    })
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable environment override");
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_huge_windows_saturate() {
        let windows = WindowConfig {
            working_hours: u64::MAX,
            entity_days: u64::MAX / 2,
            recent_limit: 1,
        };
        assert_eq!(windows.working(), Duration::from_secs(u64::MAX));
        assert_eq!(windows.entity(), Duration::from_secs(u64::MAX));
        assert_eq!(WindowConfig::default().entity(), Duration::from_secs(30 * 86_400));
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = FusionConfig::default();
        assert!((config.relevance.half_life_days - 14.0).abs() < f64::EPSILON);
        assert!((config.relevance.weights.semantic - 0.5).abs() < f32::EPSILON);
        assert!((config.relevance.weights.recency - 0.3).abs() < f32::EPSILON);
        assert!((config.relevance.weights.source_quality - 0.2).abs() < f32::EPSILON);
        assert!(config.relevance.weights.frequency.abs() < f32::EPSILON);
        assert!((config.rrf.k - 60.0).abs() < f32::EPSILON);
        assert!((config.dedup.threshold - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.dedup.shingle_size, 3);
        assert_eq!(config.diversity.top_k, 10);
        assert_eq!(config.timeouts.adapter_ms, 2_000);
        assert_eq!(config.timeouts.overall_ms, 5_000);
        assert_eq!(config.default_limit, 20);
        assert_eq!(config.sources.count(), 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_file() {
        let toml = r#"
            [scoring]
            half_life_days = 7.0

            [scoring.weights]
            semantic = 0.6
            frequency = 0.1

            [scoring.source_weights]
            version_control = 0.5

            [fusion]
            rrf_k = 30.0

            [dedup]
            threshold = 0.8

            [diversity]
            top_k = 5
            max_source_share = 0.6

            [timeouts]
            adapter_ms = 500

            [sources.notes]
            path = "/vault"

            [sources.remote]
            url = "http://localhost:8000"
            score_scale = "bm25"
            bm25_saturation = 5.0
            namespace = "work"

            [logging]
            format = "json"
        "#;

        let config = FusionConfig::parse_toml(toml).unwrap();
        assert!((config.relevance.half_life_days - 7.0).abs() < f64::EPSILON);
        assert!((config.relevance.weights.semantic - 0.6).abs() < f32::EPSILON);
        assert!((config.relevance.weights.recency - 0.3).abs() < f32::EPSILON);
        assert!((config.relevance.source_weights.version_control - 0.5).abs() < f32::EPSILON);
        assert!((config.rrf.k - 30.0).abs() < f32::EPSILON);
        assert_eq!(config.diversity.top_k, 5);
        assert_eq!(config.timeouts.adapter_ms, 500);
        assert_eq!(config.timeouts.overall_ms, 5_000);
        assert_eq!(config.sources.count(), 2);
        assert!(config.sources.git.is_none());

        let remote = config.sources.remote.unwrap();
        assert_eq!(remote.namespace.as_deref(), Some("work"));
        assert_eq!(remote.score_scale, ScoreScale::Bm25 { saturation: 5.0 });
        assert_eq!(remote.max_content_chars, 500);
        assert_eq!(config.logging.format.as_deref(), Some("json"));
    }

    #[test]
    fn test_unknown_score_scale_is_rejected() {
        let toml = r#"
            [sources.remote]
            url = "http://localhost:8000"
            score_scale = "percent"
        "#;
        assert!(FusionConfig::parse_toml(toml).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sources.git]\nroot = \"/src\"\n").unwrap();

        let config = FusionConfig::load_from_file(&path).unwrap();
        assert_eq!(
            config.sources.git.map(|g| g.root),
            Some(PathBuf::from("/src"))
        );
    }

    #[test]
    fn test_missing_file_is_operation_failed() {
        let err = FusionConfig::load_from_file(Path::new("/nonexistent/ctxfuse.toml"));
        assert!(matches!(err, Err(Error::OperationFailed { .. })));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = FusionConfig::default();
        config.relevance.weights.semantic = 1.5;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let mut config = FusionConfig::default();
        config.rrf.k = 0.0;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let mut config = FusionConfig::default();
        config.diversity.max_source_share = 0.0;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let config = FusionConfig::default().with_timeouts(0, 5_000);
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }
}
