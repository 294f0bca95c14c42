// crates/objcache/src/config.rs
// ============================================================================
// Module: Cache Configuration
// Description: Configuration loading and validation for the object cache.
// Purpose: Provide strict config parsing with hard limits and defaults.
// Dependencies: objcache-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits,
//! or built in code with [`CacheConfig::new`]. Everything except the cache
//! directory has a default, and [`CacheConfig::validate`] runs before a cache
//! is constructed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use objcache_store_sqlite::SqliteStoreConfig;
use objcache_store_sqlite::SqliteStoreMode;
use objcache_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "objcache.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "OBJCACHE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Suffix appended to the sanitized connection identity.
pub const CACHE_FILE_SUFFIX: &str = ".cache";
/// Maximum length of the sanitized file stem.
const MAX_CACHE_FILE_STEM: usize = 200;
/// Default busy timeout for the store (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Upper bound for the store busy timeout (ms).
const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;
/// Default bound on queued refresh tasks.
const DEFAULT_MAX_PENDING_TASKS: usize = 4_096;
/// Upper bound for the queued refresh task limit.
const MAX_PENDING_TASKS_LIMIT: usize = 1_000_000;
/// Default refresh worker thread name.
const DEFAULT_THREAD_NAME: &str = "objcache-refresh";
/// Maximum worker thread name length.
const MAX_THREAD_NAME_LENGTH: usize = 64;

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Object cache configuration.
///
/// # Invariants
/// - `cache_dir` is non-empty and within path limits after validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    /// Directory holding one store file per connection identity.
    pub cache_dir: PathBuf,
    /// Store pragma settings.
    #[serde(default)]
    pub store: StoreSettings,
    /// Refresh queue settings.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Refresh worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Enqueue the server-wide lists (schemas, variables, engines, charsets,
    /// collations) when a cache is constructed.
    #[serde(default = "default_preload")]
    pub preload: bool,
}

impl CacheConfig {
    /// Creates a configuration with defaults for everything but `cache_dir`.
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            store: StoreSettings::default(),
            queue: QueueConfig::default(),
            worker: WorkerConfig::default(),
            preload: default_preload(),
        }
    }

    /// Loads configuration from disk using the default resolution rules:
    /// explicit path, else `OBJCACHE_CONFIG`, else `objcache.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("cache_dir", &self.cache_dir.to_string_lossy())?;
        self.store.validate()?;
        self.queue.validate()?;
        self.worker.validate()
    }

    /// Returns the store file path for a connection identity.
    #[must_use]
    pub fn cache_file_for(&self, connection_id: &str) -> PathBuf {
        self.cache_dir.join(format!("{}{CACHE_FILE_SUFFIX}", sanitize_connection_id(connection_id)))
    }

    /// Builds the store configuration for a connection identity.
    #[must_use]
    pub fn store_config_for(&self, connection_id: &str) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.cache_file_for(connection_id),
            busy_timeout_ms: self.store.busy_timeout_ms,
            journal_mode: self.store.journal_mode,
            sync_mode: self.store.sync_mode,
        }
    }
}

/// Store pragma settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreSettings {
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreSettings {
    /// Validates store settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "store.busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// Refresh queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of pending refresh tasks.
    #[serde(default = "default_max_pending_tasks")]
    pub max_pending_tasks: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_pending_tasks: default_max_pending_tasks(),
        }
    }
}

impl QueueConfig {
    /// Validates queue settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pending_tasks == 0 {
            return Err(ConfigError::Invalid(
                "queue.max_pending_tasks must be greater than zero".to_string(),
            ));
        }
        if self.max_pending_tasks > MAX_PENDING_TASKS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "queue.max_pending_tasks must be at most {MAX_PENDING_TASKS_LIMIT}"
            )));
        }
        Ok(())
    }
}

/// Refresh worker settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkerConfig {
    /// Name given to the background refresh thread.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name: default_thread_name(),
        }
    }
}

impl WorkerConfig {
    /// Validates worker settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_name.trim().is_empty() {
            return Err(ConfigError::Invalid("worker.thread_name must be non-empty".to_string()));
        }
        if self.thread_name.len() > MAX_THREAD_NAME_LENGTH {
            return Err(ConfigError::Invalid("worker.thread_name exceeds max length".to_string()));
        }
        if self.thread_name.contains('\0') {
            return Err(ConfigError::Invalid(
                "worker.thread_name must not contain NUL bytes".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default preload flag.
const fn default_preload() -> bool {
    true
}

/// Default busy timeout for the store.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Default pending task bound.
const fn default_max_pending_tasks() -> usize {
    DEFAULT_MAX_PENDING_TASKS
}

/// Default worker thread name.
fn default_thread_name() -> String {
    DEFAULT_THREAD_NAME.to_string()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps a connection identity to a safe file stem: `[A-Za-z0-9._-]` is
/// kept, everything else becomes `_`, the stem is capped at 200 bytes, and
/// an empty identity maps to `_`.
#[must_use]
pub fn sanitize_connection_id(connection_id: &str) -> String {
    let mut stem: String = connection_id
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') { ch } else { '_' })
        .collect();
    stem.truncate(MAX_CACHE_FILE_STEM);
    if stem.is_empty() || stem.chars().all(|ch| ch == '.') {
        return "_".to_string();
    }
    stem
}

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
