// crates/objcache-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Object Name Store
// Description: Per-connection autocompletion name tables backed by SQLite.
// Purpose: Persist object name lists and replace them atomically per scope.
// Dependencies: objcache-core, rusqlite, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! This module implements the persistent half of the autocompletion cache.
//! Opening a store discards the previous session's file when possible and
//! recreates the table set; if the file cannot be removed (another cache
//! instance shares the identity) it is reused as-is. Each replace operation
//! runs in one transaction, so a scope is never observed half-written.
//!
//! The store is not internally locked. Callers serialize access (the engine
//! keeps it behind its store lock).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use objcache_core::ObjectCategory;
use objcache_core::ScopeLevel;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::ToSql;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Store layout version recorded in the `meta` table.
pub const STORE_SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Files `SQLite` may leave next to the main database file.
const SIDECAR_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];
/// Table holding columns of views (owned by `views`, not `tables`).
const VIEW_COLUMNS_TABLE: &str = "view_columns";
/// Escape clause shared by every `LIKE` match.
const LIKE_ESCAPE: &str = r"ESCAPE '\'";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode.
    Wal,
    /// Delete journal mode (single-file, default for a disposable cache).
    #[default]
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode.
    Full,
    /// Normal synchronous mode; the cache is rebuildable so durability is
    /// traded for speed.
    #[default]
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for one cache store file.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a configuration with default pragmas for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Cache store errors.
///
/// # Invariants
/// - Messages carry the underlying cause only; no cached names are embedded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheStoreError {
    /// Store file I/O error.
    #[error("cache store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("cache store db error: {0}")]
    Db(String),
    /// Invalid store request or configuration.
    #[error("cache store invalid request: {0}")]
    Invalid(String),
}

/// Maps a `rusqlite` error into a store error.
#[allow(clippy::needless_pass_by_value, reason = "Used as a map_err adapter.")]
fn db_error(err: rusqlite::Error) -> CacheStoreError {
    CacheStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Trigger name together with the table it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriggerEntry {
    /// Owning table.
    pub table: String,
    /// Trigger name.
    pub name: String,
}

/// `SQLite`-backed object name store for one connection identity.
///
/// # Invariants
/// - Table-scoped rows always reference an existing owner row; owner removal
///   cascades.
/// - Every replace runs inside one transaction and rolls back on error.
pub struct SqliteCacheStore {
    /// Open connection to the store file.
    connection: Connection,
    /// Store file location.
    path: PathBuf,
    /// True when this open created the table set.
    initialized: bool,
}

impl SqliteCacheStore {
    /// Opens the store file, recreating it when the previous file can be
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheStoreError`] when the path is invalid or the database
    /// cannot be opened. Table creation failures are logged, not returned.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, CacheStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let fresh = discard_previous_file(&config.path);
        let connection = open_connection(config)?;
        if fresh {
            initialize_schema(&connection);
        } else {
            info!(path = %config.path.display(), "reusing existing autocompletion cache file");
        }
        debug!(path = %config.path.display(), "using autocompletion cache file");
        Ok(Self {
            connection,
            path: config.path.clone(),
            initialized: fresh,
        })
    }

    /// Returns the store file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true when this open created a fresh table set.
    #[must_use]
    pub const fn is_freshly_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns the layout version recorded in the store, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CacheStoreError`] when the `meta` table cannot be read.
    pub fn schema_version(&self) -> Result<Option<i64>, CacheStoreError> {
        let value: Option<String> = self
            .connection
            .query_row("SELECT value FROM meta WHERE name = 'schema_version'", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(db_error)?;
        Ok(value.and_then(|value| value.parse().ok()))
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Returns names of `category` starting with `prefix`, ordered by name.
    ///
    /// Empty `schema` or `table` arguments match any scope. Matching follows
    /// `SQLite` `LIKE` rules (ASCII case-insensitive) with `%`, `_` and `\`
    /// in the arguments taken literally. A name owned by several scopes is
    /// returned once per owner.
    ///
    /// # Errors
    ///
    /// Returns [`CacheStoreError`] when the query fails (for example when the
    /// category's table was never created).
    pub fn match_names(
        &self,
        category: ObjectCategory,
        schema: &str,
        table: &str,
        prefix: &str,
    ) -> Result<Vec<String>, CacheStoreError> {
        let name_pattern = format!("{}%", escape_like(prefix));
        let schema_pattern = scope_pattern(schema);
        let table_pattern = scope_pattern(table);
        let source = category.table_name();
        match category.scope_level() {
            ScopeLevel::Unscoped => {
                let sql = format!(
                    "SELECT name FROM {source} WHERE name <> '' AND name LIKE ?1 {LIKE_ESCAPE} \
                     ORDER BY name"
                );
                self.query_names(&sql, &[&name_pattern])
            }
            ScopeLevel::Schema => {
                let sql = format!(
                    "SELECT name FROM {source} WHERE schema_id LIKE ?1 {LIKE_ESCAPE} AND name \
                     LIKE ?2 {LIKE_ESCAPE} ORDER BY name"
                );
                self.query_names(&sql, &[&schema_pattern, &name_pattern])
            }
            ScopeLevel::Table => {
                let filter = format!(
                    "WHERE schema_id LIKE ?1 {LIKE_ESCAPE} AND table_id LIKE ?2 {LIKE_ESCAPE} \
                     AND name LIKE ?3 {LIKE_ESCAPE}"
                );
                let sql = if category == ObjectCategory::Columns {
                    format!(
                        "SELECT name FROM {source} {filter} UNION ALL SELECT name FROM \
                         {VIEW_COLUMNS_TABLE} {filter} ORDER BY name"
                    )
                } else {
                    format!("SELECT name FROM {source} {filter} ORDER BY name")
                };
                self.query_names(&sql, &[&schema_pattern, &table_pattern, &name_pattern])
            }
        }
    }

    /// Returns the `last_refresh` stamp of `schema`, `None` when the schema
    /// has no row. Schema lookup is case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`CacheStoreError`] when the query fails.
    pub fn schema_last_refresh(&self, schema: &str) -> Result<Option<i64>, CacheStoreError> {
        let sql = format!("SELECT last_refresh FROM schemas WHERE name LIKE ?1 {LIKE_ESCAPE} LIMIT 1");
        let value: Option<Option<i64>> = self
            .connection
            .query_row(&sql, params![escape_like(schema)], |row| row.get(0))
            .optional()
            .map_err(db_error)?;
        Ok(value.map(|stamp| stamp.unwrap_or(0)))
    }

    /// Returns true when `schema` has a non-zero `last_refresh`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheStoreError`] when the query fails.
    pub fn is_schema_warm(&self, schema: &str) -> Result<bool, CacheStoreError> {
        Ok(self.schema_last_refresh(schema)?.is_some_and(|stamp| stamp != 0))
    }

    /// Returns true when `category` holds at least one row in the given scope.
    ///
    /// `schema` and `table` are exact matches; `None` leaves that scope
    /// column unconstrained. For columns, view columns are included.
    ///
    /// # Errors
    ///
    /// Returns [`CacheStoreError`] when the scope does not fit the category
    /// or the query fails.
    pub fn has_rows(
        &self,
        category: ObjectCategory,
        schema: Option<&str>,
        table: Option<&str>,
    ) -> Result<bool, CacheStoreError> {
        let level = category.scope_level();
        if level == ScopeLevel::Unscoped && (schema.is_some() || table.is_some()) {
            return Err(CacheStoreError::Invalid(format!("{category} rows have no scope")));
        }
        if level == ScopeLevel::Schema && table.is_some() {
            return Err(CacheStoreError::Invalid(format!("{category} rows have no table scope")));
        }
        let mut sources = vec![category.table_name()];
        if category == ObjectCategory::Columns {
            sources.push(VIEW_COLUMNS_TABLE);
        }
        for source in sources {
            let found: bool = match (schema, table) {
                (None, None) => self
                    .connection
                    .query_row(&format!("SELECT EXISTS(SELECT 1 FROM {source})"), [], |row| {
                        row.get(0)
                    }),
                (Some(schema), None) => self.connection.query_row(
                    &format!("SELECT EXISTS(SELECT 1 FROM {source} WHERE schema_id = ?1)"),
                    params![schema],
                    |row| row.get(0),
                ),
                (None, Some(table)) => self.connection.query_row(
                    &format!("SELECT EXISTS(SELECT 1 FROM {source} WHERE table_id = ?1)"),
                    params![table],
                    |row| row.get(0),
                ),
                (Some(schema), Some(table)) => self.connection.query_row(
                    &format!(
                        "SELECT EXISTS(SELECT 1 FROM {source} WHERE schema_id = ?1 AND table_id \
                         = ?2)"
                    ),
                    params![schema, table],
                    |row| row.get(0),
                ),
            }
            .map_err(db_error)?;
            if found {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Replaces every name of an unscoped category.
    ///
    /// # Errors
    ///
    /// Returns [`CacheStoreError`] when `category` is not unscoped (schemas
    /// go through [`SqliteCacheStore::replace_schema_names`]) or the write
    /// fails; prior rows are kept on failure.
    pub fn replace_names(
        &mut self,
        category: ObjectCategory,
        names: &[String],
    ) -> Result<(), CacheStoreError> {
        if category == ObjectCategory::Schemas {
            return Err(CacheStoreError::Invalid(
                "schema names must be replaced with replace_schema_names".to_string(),
            ));
        }
        ensure_scope(category, ScopeLevel::Unscoped)?;
        let source = category.table_name();
        let tx = self.connection.transaction().map_err(db_error)?;
        tx.execute(&format!("DELETE FROM {source}"), []).map_err(db_error)?;
        {
            let mut insert = tx
                .prepare(&format!("INSERT OR IGNORE INTO {source} (name) VALUES (?1)"))
                .map_err(db_error)?;
            for name in names {
                insert.execute(params![name]).map_err(db_error)?;
            }
        }
        tx.commit().map_err(db_error)
    }

    /// Replaces the schema list, keeping the `last_refresh` stamp of every
    /// schema that survives and stamping new schemas with zero. An empty list
    /// stores a single empty-named row so the list still reads as fetched.
    ///
    /// # Errors
    ///
    /// Returns [`CacheStoreError`] when the write fails; prior rows are kept.
    pub fn replace_schema_names(&mut self, names: &[String]) -> Result<(), CacheStoreError> {
        let tx = self.connection.transaction().map_err(db_error)?;
        let previous: HashMap<String, i64> = {
            let mut select = tx
                .prepare("SELECT name, last_refresh FROM schemas WHERE name <> ''")
                .map_err(db_error)?;
            let rows = select
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?.unwrap_or(0)))
                })
                .map_err(db_error)?;
            rows.collect::<Result<_, _>>().map_err(db_error)?
        };
        tx.execute("DELETE FROM schemas", []).map_err(db_error)?;
        if names.is_empty() {
            tx.execute("INSERT INTO schemas (name, last_refresh) VALUES ('', 0)", [])
                .map_err(db_error)?;
        } else {
            let mut insert = tx
                .prepare("INSERT OR IGNORE INTO schemas (name, last_refresh) VALUES (?1, ?2)")
                .map_err(db_error)?;
            for name in names {
                let stamp = previous.get(name).copied().unwrap_or(0);
                insert.execute(params![name, stamp]).map_err(db_error)?;
            }
        }
        tx.commit().map_err(db_error)
    }

    /// Replaces the names of a schema-scoped category for one schema.
    ///
    /// For tables and views only vanished names are deleted, so columns and
    /// triggers of surviving owners are kept while those of dropped owners
    /// cascade away.
    ///
    /// # Errors
    ///
    /// Returns [`CacheStoreError`] when `category` is not schema-scoped or the
    /// write fails; prior rows are kept on failure.
    pub fn replace_schema_objects(
        &mut self,
        category: ObjectCategory,
        schema: &str,
        names: &[String],
    ) -> Result<(), CacheStoreError> {
        ensure_scope(category, ScopeLevel::Schema)?;
        let tx = self.connection.transaction().map_err(db_error)?;
        write_schema_objects(&tx, category, schema, names)?;
        tx.commit().map_err(db_error)
    }

    /// Replaces the base tables of `schema` and, when `refreshed_at` is set,
    /// stamps the schema's `last_refresh` in the same transaction. A missing
    /// schema row is added only when the schema list has already been
    /// stored, so a stamp never makes the list itself look fetched.
    ///
    /// # Errors
    ///
    /// Returns [`CacheStoreError`] when the write fails; prior rows are kept.
    pub fn replace_tables(
        &mut self,
        schema: &str,
        names: &[String],
        refreshed_at: Option<i64>,
    ) -> Result<(), CacheStoreError> {
        let tx = self.connection.transaction().map_err(db_error)?;
        write_schema_objects(&tx, ObjectCategory::Tables, schema, names)?;
        if let Some(stamp) = refreshed_at {
            let updated = tx
                .execute("UPDATE schemas SET last_refresh = ?2 WHERE name = ?1", params![
                    schema, stamp
                ])
                .map_err(db_error)?;
            if updated == 0 {
                // Only add the row once the schema list has been fetched.
                tx.execute(
                    "INSERT INTO schemas (name, last_refresh) SELECT ?1, ?2 WHERE EXISTS (SELECT \
                     1 FROM schemas)",
                    params![schema, stamp],
                )
                .map_err(db_error)?;
            }
        }
        tx.commit().map_err(db_error)
    }

    /// Replaces the columns of one table or view.
    ///
    /// Returns `false` without writing when the owner is neither a cached
    /// table nor a cached view.
    ///
    /// # Errors
    ///
    /// Returns [`CacheStoreError`] when the write fails; prior rows are kept.
    pub fn replace_columns(
        &mut self,
        schema: &str,
        table: &str,
        names: &[String],
    ) -> Result<bool, CacheStoreError> {
        let tx = self.connection.transaction().map_err(db_error)?;
        let target = if owner_exists(&tx, ObjectCategory::Tables.table_name(), schema, table)? {
            ObjectCategory::Columns.table_name()
        } else if owner_exists(&tx, ObjectCategory::Views.table_name(), schema, table)? {
            VIEW_COLUMNS_TABLE
        } else {
            debug!(schema, table, "column owner not cached; skipping column write");
            return Ok(false);
        };
        for source in [ObjectCategory::Columns.table_name(), VIEW_COLUMNS_TABLE] {
            tx.execute(
                &format!("DELETE FROM {source} WHERE schema_id = ?1 AND table_id = ?2"),
                params![schema, table],
            )
            .map_err(db_error)?;
        }
        {
            let mut insert = tx
                .prepare(&format!(
                    "INSERT OR IGNORE INTO {target} (schema_id, table_id, name) VALUES (?1, ?2, \
                     ?3)"
                ))
                .map_err(db_error)?;
            for name in names {
                insert.execute(params![schema, table, name]).map_err(db_error)?;
            }
        }
        tx.commit().map_err(db_error)?;
        Ok(true)
    }

    /// Replaces triggers of `schema`, limited to one owning table when
    /// `table` is set. Entries whose table is not a cached base table (or
    /// not the requested table) are skipped. Returns the number stored.
    ///
    /// # Errors
    ///
    /// Returns [`CacheStoreError`] when the write fails; prior rows are kept.
    pub fn replace_triggers(
        &mut self,
        schema: &str,
        table: Option<&str>,
        entries: &[TriggerEntry],
    ) -> Result<usize, CacheStoreError> {
        let source = ObjectCategory::Triggers.table_name();
        let tx = self.connection.transaction().map_err(db_error)?;
        match table {
            Some(table) => tx.execute(
                &format!("DELETE FROM {source} WHERE schema_id = ?1 AND table_id = ?2"),
                params![schema, table],
            ),
            None => {
                tx.execute(&format!("DELETE FROM {source} WHERE schema_id = ?1"), params![schema])
            }
        }
        .map_err(db_error)?;
        let mut stored = 0_usize;
        {
            let mut insert = tx
                .prepare(&format!(
                    "INSERT OR IGNORE INTO {source} (schema_id, table_id, name) VALUES (?1, ?2, \
                     ?3)"
                ))
                .map_err(db_error)?;
            for entry in entries {
                if table.is_some_and(|table| table != entry.table) {
                    continue;
                }
                if !owner_exists(&tx, ObjectCategory::Tables.table_name(), schema, &entry.table)?
                {
                    debug!(schema, table = %entry.table, trigger = %entry.name, "trigger owner not cached");
                    continue;
                }
                stored += insert.execute(params![schema, entry.table, entry.name]).map_err(db_error)?;
            }
        }
        tx.commit().map_err(db_error)?;
        Ok(stored)
    }

    /// Runs a single-column name query.
    fn query_names(&self, sql: &str, args: &[&dyn ToSql]) -> Result<Vec<String>, CacheStoreError> {
        let mut statement = self.connection.prepare_cached(sql).map_err(db_error)?;
        let rows = statement.query_map(args, |row| row.get::<_, String>(0)).map_err(db_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_error)
    }
}

// ============================================================================
// SECTION: Write Helpers
// ============================================================================

/// Writes one schema's names of a schema-scoped category inside `tx`.
fn write_schema_objects(
    tx: &Connection,
    category: ObjectCategory,
    schema: &str,
    names: &[String],
) -> Result<(), CacheStoreError> {
    let source = category.table_name();
    if matches!(category, ObjectCategory::Tables | ObjectCategory::Views) {
        let keep: HashSet<&str> = names.iter().map(String::as_str).collect();
        let existing: Vec<String> = {
            let mut select = tx
                .prepare(&format!("SELECT name FROM {source} WHERE schema_id = ?1"))
                .map_err(db_error)?;
            let rows = select.query_map(params![schema], |row| row.get(0)).map_err(db_error)?;
            rows.collect::<Result<_, _>>().map_err(db_error)?
        };
        let mut delete = tx
            .prepare(&format!("DELETE FROM {source} WHERE schema_id = ?1 AND name = ?2"))
            .map_err(db_error)?;
        for name in existing.iter().filter(|name| !keep.contains(name.as_str())) {
            delete.execute(params![schema, name]).map_err(db_error)?;
        }
    } else {
        tx.execute(&format!("DELETE FROM {source} WHERE schema_id = ?1"), params![schema])
            .map_err(db_error)?;
    }
    let mut insert = tx
        .prepare(&format!("INSERT OR IGNORE INTO {source} (schema_id, name) VALUES (?1, ?2)"))
        .map_err(db_error)?;
    for name in names {
        insert.execute(params![schema, name]).map_err(db_error)?;
    }
    Ok(())
}

/// Returns true when `owner_table` holds the (schema, name) pair.
fn owner_exists(
    connection: &Connection,
    owner_table: &str,
    schema: &str,
    name: &str,
) -> Result<bool, CacheStoreError> {
    connection
        .query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {owner_table} WHERE schema_id = ?1 AND name = ?2)"),
            params![schema, name],
            |row| row.get(0),
        )
        .map_err(db_error)
}

/// Rejects categories that do not have the expected scope granularity.
fn ensure_scope(category: ObjectCategory, expected: ScopeLevel) -> Result<(), CacheStoreError> {
    if category.scope_level() == expected {
        Ok(())
    } else {
        Err(CacheStoreError::Invalid(format!("{category} is not stored at this scope")))
    }
}

// ============================================================================
// SECTION: Pattern Helpers
// ============================================================================

/// Escapes `LIKE` wildcards (`%`, `_`) and the escape character itself so
/// `value` matches literally under `ESCAPE '\'`.
#[must_use]
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Returns the `LIKE` pattern for a scope argument; empty matches any scope.
fn scope_pattern(value: &str) -> String {
    if value.is_empty() { "%".to_string() } else { escape_like(value) }
}

// ============================================================================
// SECTION: File Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), CacheStoreError> {
    let Some(parent) = path.parent() else {
        return Err(CacheStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(parent).map_err(|err| CacheStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), CacheStoreError> {
    if path.as_os_str().is_empty() {
        return Err(CacheStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(CacheStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(CacheStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(CacheStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Removes the previous session's store file. Returns true when the store
/// must be initialized (file removed or absent) and false when an existing
/// file has to be reused.
fn discard_previous_file(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => {
            for suffix in SIDECAR_SUFFIXES {
                let sidecar = sidecar_path(path, suffix);
                if let Err(err) = fs::remove_file(&sidecar)
                    && err.kind() != ErrorKind::NotFound
                {
                    debug!(path = %sidecar.display(), error = %err, "could not remove store sidecar");
                }
            }
            true
        }
        Err(err) if err.kind() == ErrorKind::NotFound => true,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cache file in use; reusing it");
            false
        }
    }
}

/// Returns `path` with `suffix` appended to the file name.
fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Opens an `SQLite` connection and applies the store pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, CacheStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies the pragmas used by the cache store.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), CacheStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_error)?;
    connection.execute_batch("PRAGMA temp_store = MEMORY;").map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_error)?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms)).map_err(db_error)?;
    Ok(())
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Returns the creation statement for every store table, owners first.
fn table_definitions() -> Vec<(&'static str, String)> {
    let mut definitions = vec![(
        "meta",
        "CREATE TABLE IF NOT EXISTS meta (name TEXT PRIMARY KEY, value TEXT)".to_string(),
    )];
    for category in ObjectCategory::ALL {
        let name = category.table_name();
        let sql = match (category, category.scope_level()) {
            (ObjectCategory::Schemas, _) => "CREATE TABLE IF NOT EXISTS schemas (name TEXT PRIMARY \
                                             KEY, last_refresh INTEGER DEFAULT 0)"
                .to_string(),
            (_, ScopeLevel::Unscoped) => {
                format!("CREATE TABLE IF NOT EXISTS {name} (name TEXT PRIMARY KEY)")
            }
            (_, ScopeLevel::Schema) => format!(
                "CREATE TABLE IF NOT EXISTS {name} (schema_id TEXT NOT NULL, name TEXT NOT NULL, \
                 PRIMARY KEY (schema_id, name))"
            ),
            (_, ScopeLevel::Table) => owned_table_definition(name, "tables"),
        };
        definitions.push((name, sql));
    }
    definitions.push((VIEW_COLUMNS_TABLE, owned_table_definition(VIEW_COLUMNS_TABLE, "views")));
    definitions
}

/// Builds a table-scoped table whose rows cascade with their owner.
fn owned_table_definition(name: &str, owner: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {name} (schema_id TEXT NOT NULL, table_id TEXT NOT NULL, name \
         TEXT NOT NULL, PRIMARY KEY (schema_id, table_id, name), FOREIGN KEY (schema_id, \
         table_id) REFERENCES {owner} (schema_id, name) ON DELETE CASCADE)"
    )
}

/// Creates the table set. Each statement stands alone: a failure is logged
/// and the remaining tables are still created.
fn initialize_schema(connection: &Connection) {
    info!("initializing autocompletion cache store");
    for (name, sql) in table_definitions() {
        if let Err(err) = connection.execute_batch(&sql) {
            error!(table = name, error = %err, "error creating cache table");
        }
    }
    if let Err(err) = connection.execute(
        "INSERT OR REPLACE INTO meta (name, value) VALUES ('schema_version', ?1)",
        params![STORE_SCHEMA_VERSION.to_string()],
    ) {
        error!(error = %err, "error recording cache store version");
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
