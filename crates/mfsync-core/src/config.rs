//! MFSync configuration
//!
//! One YAML file with a section per component. Every section has defaults,
//! so a partial file (or none at all) yields a usable [`Config`].
//! [`Config::validate`] reports every problem at once instead of stopping at
//! the first.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for MFSync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub fetch: FetchConfig,
    pub conflicts: ConflictsConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Content synchronization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Trigger a sync of a synced file whenever its attributes are updated.
    pub auto_sync: bool,
    /// Seconds an idle per-file queue is kept before it is reported as idle.
    pub queue_idle_timeout_secs: u64,
    /// Send a user notification when a sync pass fails.
    pub notify_on_failure: bool,
}

/// Remote listing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Items requested per listing call.
    pub batch_size: u32,
}

/// One glob rule mapping file paths to a save strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRuleConfig {
    /// Glob pattern matched against the file's tree path, e.g. `/*/USS/**`.
    pub pattern: String,
    /// Strategy applied when the pattern matches.
    pub strategy: String,
}

/// Conflict handling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictsConfig {
    /// Default strategy: `ask`, `keep_local`, `accept_remote`, or `fail`.
    pub default_strategy: String,
    /// First-match-wins rules evaluated before the default.
    pub rules: Vec<ConflictRuleConfig>,
}

/// Backend for content sync records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Content storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// SQLite database file, used when `backend` is `sqlite`.
    pub database_path: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Reads and parses the YAML file at `path`
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    /// Like [`Config::load`], with defaults for a missing or broken file
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// `$XDG_CONFIG_HOME/mfsync/config.yaml` on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("mfsync")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            queue_idle_timeout_secs: 300,
            notify_on_failure: true,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { batch_size: 100 }
    }
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            default_strategy: "ask".to_string(),
            rules: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let database_path = dirs::data_local_dir()
            .map(|dir| dir.join("mfsync"))
            .unwrap_or_else(|| PathBuf::from(".mfsync"))
            .join("content.db");
        Self {
            backend: StorageBackend::Memory,
            database_path,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// One problem found by [`Config::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted field path, e.g. `fetch.batch_size`
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// `value` must be one of `allowed`
    fn check_choice(field: impl Into<String>, value: &str, allowed: &[&str]) -> Option<Self> {
        (!allowed.contains(&value)).then(|| {
            Self::new(
                field,
                format!("'{value}' is not one of: {}", allowed.join(", ")),
            )
        })
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Accepted values for `conflicts.default_strategy` and rule strategies
pub const VALID_CONFLICT_STRATEGIES: &[&str] = &["ask", "keep_local", "accept_remote", "fail"];

impl Config {
    /// Every problem in this configuration; empty when it is usable
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.sync.queue_idle_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "sync.queue_idle_timeout_secs",
                "must be at least 1",
            ));
        }
        if self.fetch.batch_size == 0 {
            errors.push(ValidationError::new("fetch.batch_size", "must be at least 1"));
        }

        errors.extend(ValidationError::check_choice(
            "conflicts.default_strategy",
            &self.conflicts.default_strategy,
            VALID_CONFLICT_STRATEGIES,
        ));
        for (idx, rule) in self.conflicts.rules.iter().enumerate() {
            if let Err(e) = glob::Pattern::new(&rule.pattern) {
                errors.push(ValidationError::new(
                    format!("conflicts.rules[{idx}].pattern"),
                    format!("bad glob '{}': {e}", rule.pattern),
                ));
            }
            errors.extend(ValidationError::check_choice(
                format!("conflicts.rules[{idx}].strategy"),
                &rule.strategy,
                VALID_CONFLICT_STRATEGIES,
            ));
        }

        if self.storage.backend == StorageBackend::Sqlite
            && self.storage.database_path.as_os_str().is_empty()
        {
            errors.push(ValidationError::new(
                "storage.database_path",
                "the sqlite backend needs a database file",
            ));
        }

        errors.extend(ValidationError::check_choice(
            "logging.level",
            &self.logging.level,
            LOG_LEVELS,
        ));

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Overrides on top of [`Config::default`], mostly for tests and embedders
///
/// # Example
///
/// ```rust,no_run
/// use mfsync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .fetch_batch_size(500)
///     .conflicts_default_strategy("accept_remote")
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_auto_sync(mut self, enabled: bool) -> Self {
        self.config.sync.auto_sync = enabled;
        self
    }

    pub fn sync_queue_idle_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.sync.queue_idle_timeout_secs = seconds;
        self
    }

    pub fn sync_notify_on_failure(mut self, enabled: bool) -> Self {
        self.config.sync.notify_on_failure = enabled;
        self
    }

    // --- fetch ---

    pub fn fetch_batch_size(mut self, n: u32) -> Self {
        self.config.fetch.batch_size = n;
        self
    }

    // --- conflicts ---

    pub fn conflicts_default_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.config.conflicts.default_strategy = strategy.into();
        self
    }

    pub fn conflicts_rule(mut self, pattern: impl Into<String>, strategy: impl Into<String>) -> Self {
        self.config.conflicts.rules.push(ConflictRuleConfig {
            pattern: pattern.into(),
            strategy: strategy.into(),
        });
        self
    }

    // --- storage ---

    pub fn storage_backend(mut self, backend: StorageBackend) -> Self {
        self.config.storage.backend = backend;
        self
    }

    pub fn storage_database_path(mut self, path: PathBuf) -> Self {
        self.config.storage.database_path = path;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    pub fn build(self) -> Config {
        self.config
    }

    /// [`ConfigBuilder::build`] followed by [`Config::validate`]
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let errors = self.config.validate();
        if errors.is_empty() {
            Ok(self.config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
