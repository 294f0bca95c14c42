// crates/objcache/src/fetchers.rs
// ============================================================================
// Module: Metadata Fetchers
// Description: Per-category retrieval of live object names.
// Purpose: Turn one refresh task into a store write plus follow-up tasks.
// Dependencies: objcache-core, objcache-store-sqlite, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`fetch`] runs the metadata statements for one [`RefreshTask`] over a
//! connection borrowed from the [`ConnectionProvider`] and returns a
//! [`FetchOutcome`]: the names to store and the child tasks the result
//! implies (every discovered table asks for its columns and triggers, every
//! view for its columns). The connection guard is released when `fetch`
//! returns, before anything is written to the store.
//!
//! The cancel flag is checked before every row; a cancelled fetch returns
//! `Ok(None)` and must not be written.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use objcache_core::ConnectionError;
use objcache_core::ConnectionProvider;
use objcache_core::MetadataConnection;
use objcache_core::MetadataRow;
use objcache_core::ObjectCategory;
use objcache_core::RefreshTask;
use objcache_store_sqlite::CacheStoreError;
use objcache_store_sqlite::SqliteCacheStore;
use objcache_store_sqlite::TriggerEntry;
use thiserror::Error;
use tracing::debug;

use crate::sql::quote_identifier;
use crate::sql::quote_like_exact;
use crate::sql::quote_literal;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Marker prepended to system variable names.
pub const VARIABLE_PREFIX: &str = "@@";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while refreshing one category.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The live connection failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// The store rejected the refreshed names.
    #[error(transparent)]
    Store(#[from] CacheStoreError),
}

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Names retrieved for one refresh, shaped for the matching store write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshPayload {
    /// Server-wide names of an unscoped category.
    Names {
        /// Category being replaced.
        category: ObjectCategory,
        /// Retrieved names.
        names: Vec<String>,
    },
    /// The schema list.
    SchemaNames(Vec<String>),
    /// Base tables of a schema; `refreshed_at` marks the schema warm.
    Tables {
        /// Owning schema.
        schema: String,
        /// Retrieved table names.
        names: Vec<String>,
        /// Warm stamp (unix seconds), absent for unknown schemas.
        refreshed_at: Option<i64>,
    },
    /// Other schema-scoped names (views, routines, events).
    SchemaObjects {
        /// Category being replaced.
        category: ObjectCategory,
        /// Owning schema.
        schema: String,
        /// Retrieved names.
        names: Vec<String>,
    },
    /// Columns of one table or view.
    Columns {
        /// Owning schema.
        schema: String,
        /// Owning table or view.
        table: String,
        /// Retrieved column names.
        names: Vec<String>,
    },
    /// Triggers of one table, or of the whole schema when `table` is `None`.
    Triggers {
        /// Owning schema.
        schema: String,
        /// Owning table filter.
        table: Option<String>,
        /// Retrieved triggers.
        entries: Vec<TriggerEntry>,
    },
}

impl RefreshPayload {
    /// Returns the number of retrieved names.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Names {
                names, ..
            }
            | Self::SchemaNames(names)
            | Self::Tables {
                names, ..
            }
            | Self::SchemaObjects {
                names, ..
            }
            | Self::Columns {
                names, ..
            } => names.len(),
            Self::Triggers {
                entries, ..
            } => entries.len(),
        }
    }

    /// Returns true when nothing was retrieved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the payload's scope in the store in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CacheStoreError`] when the write fails; the scope keeps its
    /// previous names.
    pub fn write(&self, store: &mut SqliteCacheStore) -> Result<(), CacheStoreError> {
        match self {
            Self::Names {
                category,
                names,
            } => store.replace_names(*category, names),
            Self::SchemaNames(names) => store.replace_schema_names(names),
            Self::Tables {
                schema,
                names,
                refreshed_at,
            } => store.replace_tables(schema, names, *refreshed_at),
            Self::SchemaObjects {
                category,
                schema,
                names,
            } => store.replace_schema_objects(*category, schema, names),
            Self::Columns {
                schema,
                table,
                names,
            } => {
                if !store.replace_columns(schema, table, names)? {
                    debug!(schema = %schema, table = %table, "columns dropped; owner not cached");
                }
                Ok(())
            }
            Self::Triggers {
                schema,
                table,
                entries,
            } => {
                let stored = store.replace_triggers(schema, table.as_deref(), entries)?;
                debug!(schema = %schema, stored, retrieved = entries.len(), "triggers stored");
                Ok(())
            }
        }
    }
}

/// Result of one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Names to store.
    pub payload: RefreshPayload,
    /// Tasks implied by the retrieved names.
    pub follow_ups: Vec<RefreshTask>,
}

impl FetchOutcome {
    /// Creates an outcome without follow-up work.
    #[must_use]
    pub const fn new(payload: RefreshPayload) -> Self {
        Self {
            payload,
            follow_ups: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Retrieves the live names `task` refreshes.
///
/// Returns `Ok(None)` when `cancel` was raised before the result set was
/// fully read.
///
/// # Errors
///
/// Returns [`FetchError`] when no connection can be acquired or a statement
/// fails.
pub fn fetch(
    task: &RefreshTask,
    provider: &dyn ConnectionProvider,
    cancel: &AtomicBool,
) -> Result<Option<FetchOutcome>, FetchError> {
    if is_cancelled(cancel) {
        return Ok(None);
    }
    let mut guard = provider.acquire()?;
    let connection = guard.as_mut();
    let outcome = match task {
        RefreshTask::Schemas => read_names(connection, "SHOW DATABASES", 0, cancel)?
            .map(|names| FetchOutcome::new(RefreshPayload::SchemaNames(names))),
        RefreshTask::Variables => {
            read_names(connection, "SHOW GLOBAL VARIABLES", 0, cancel)?.map(|names| {
                let names = names.into_iter().map(|name| format!("{VARIABLE_PREFIX}{name}")).collect();
                server_names(ObjectCategory::Variables, names)
            })
        }
        RefreshTask::Engines => read_names(connection, "SHOW ENGINES", 0, cancel)?
            .map(|names| server_names(ObjectCategory::Engines, names)),
        RefreshTask::Udfs => read_names(connection, "SELECT NAME FROM mysql.func", 0, cancel)?
            .map(|names| server_names(ObjectCategory::Udfs, names)),
        RefreshTask::Charsets => read_names(connection, "SHOW CHARSET", 0, cancel)?
            .map(|names| server_names(ObjectCategory::Charsets, names)),
        RefreshTask::Collations => read_names(connection, "SHOW COLLATION", 0, cancel)?
            .map(|names| server_names(ObjectCategory::Collations, names)),
        RefreshTask::Tablespaces => read_names(
            connection,
            "SELECT DISTINCT TABLESPACE_NAME FROM information_schema.FILES",
            0,
            cancel,
        )?
        .map(|names| server_names(ObjectCategory::Tablespaces, names)),
        RefreshTask::LogfileGroups => read_names(
            connection,
            "SELECT DISTINCT LOGFILE_GROUP_NAME FROM information_schema.FILES",
            0,
            cancel,
        )?
        .map(|names| server_names(ObjectCategory::LogfileGroups, names)),
        RefreshTask::Tables {
            schema,
        } => fetch_tables(connection, schema, false, cancel)?,
        RefreshTask::Views {
            schema,
        } => fetch_tables(connection, schema, true, cancel)?,
        RefreshTask::Procedures {
            schema,
        } => {
            let sql = format!("SHOW PROCEDURE STATUS WHERE Db = {}", quote_literal(schema));
            read_names(connection, &sql, 1, cancel)?
                .map(|names| schema_names(ObjectCategory::Procedures, schema, names))
        }
        RefreshTask::Functions {
            schema,
        } => {
            let sql = format!("SHOW FUNCTION STATUS WHERE Db = {}", quote_literal(schema));
            read_names(connection, &sql, 1, cancel)?
                .map(|names| schema_names(ObjectCategory::Functions, schema, names))
        }
        RefreshTask::Events {
            schema,
        } => {
            let sql = format!(
                "SELECT EVENT_NAME FROM information_schema.EVENTS WHERE EVENT_SCHEMA = {}",
                quote_literal(schema)
            );
            read_names(connection, &sql, 0, cancel)?
                .map(|names| schema_names(ObjectCategory::Events, schema, names))
        }
        RefreshTask::Columns {
            schema,
            table,
        } => {
            let sql =
                format!("SHOW COLUMNS FROM {}.{}", quote_identifier(schema), quote_identifier(table));
            read_names(connection, &sql, 0, cancel)?.map(|names| {
                FetchOutcome::new(RefreshPayload::Columns {
                    schema: schema.clone(),
                    table: table.clone(),
                    names,
                })
            })
        }
        RefreshTask::Triggers {
            schema,
            table,
        } => fetch_triggers(connection, schema, table, cancel)?,
    };
    drop(guard);
    if let Some(outcome) = &outcome {
        debug!(task = %task, retrieved = outcome.payload.len(), follow_ups = outcome.follow_ups.len(), "fetch complete");
    }
    Ok(outcome)
}

// ============================================================================
// SECTION: Category Fetchers
// ============================================================================

/// Retrieves base tables (or views) of a schema and their child tasks.
fn fetch_tables(
    connection: &mut (dyn MetadataConnection + '_),
    schema: &str,
    views: bool,
    cancel: &AtomicBool,
) -> Result<Option<FetchOutcome>, FetchError> {
    let Some(exists) = schema_exists(connection, schema, cancel)? else {
        return Ok(None);
    };
    if !exists {
        debug!(schema, "schema not found on server; clearing cached objects");
        return Ok(Some(FetchOutcome::new(table_payload(schema, Vec::new(), views, None))));
    }
    let sql = format!("SHOW FULL TABLES FROM {}", quote_identifier(schema));
    let rows = read_rows(connection, &sql, cancel, |row| {
        let name = row.get(0).filter(|name| !name.is_empty())?;
        let is_view = row.get(1).is_some_and(|kind| kind.eq_ignore_ascii_case("VIEW"));
        (is_view == views).then(|| name.to_string())
    })?;
    let Some(names) = rows else {
        return Ok(None);
    };
    let mut follow_ups = Vec::with_capacity(names.len() * 2);
    for table in &names {
        follow_ups.push(RefreshTask::Columns {
            schema: schema.to_string(),
            table: table.clone(),
        });
        if !views {
            follow_ups.push(RefreshTask::Triggers {
                schema: schema.to_string(),
                table: table.clone(),
            });
        }
    }
    let refreshed_at = (!views).then(unix_seconds);
    Ok(Some(FetchOutcome {
        payload: table_payload(schema, names, views, refreshed_at),
        follow_ups,
    }))
}

/// Retrieves triggers of one table, or of every table when `table` is empty.
fn fetch_triggers(
    connection: &mut (dyn MetadataConnection + '_),
    schema: &str,
    table: &str,
    cancel: &AtomicBool,
) -> Result<Option<FetchOutcome>, FetchError> {
    let mut sql = format!("SHOW TRIGGERS FROM {}", quote_identifier(schema));
    if !table.is_empty() {
        sql.push_str(&format!(" WHERE `Table` = {}", quote_literal(table)));
    }
    let rows = read_rows(connection, &sql, cancel, |row| {
        let name = row.get(0).filter(|name| !name.is_empty())?;
        let owner = row.get(2).filter(|owner| !owner.is_empty()).unwrap_or(table);
        Some(TriggerEntry {
            table: owner.to_string(),
            name: name.to_string(),
        })
    })?;
    Ok(rows.map(|entries| {
        FetchOutcome::new(RefreshPayload::Triggers {
            schema: schema.to_string(),
            table: (!table.is_empty()).then(|| table.to_string()),
            entries,
        })
    }))
}

/// Checks whether the server knows `schema`; `None` when cancelled.
fn schema_exists(
    connection: &mut (dyn MetadataConnection + '_),
    schema: &str,
    cancel: &AtomicBool,
) -> Result<Option<bool>, FetchError> {
    let sql = format!("SHOW SCHEMAS LIKE {}", quote_like_exact(schema));
    let rows = read_rows(connection, &sql, cancel, |row| row.get(0).map(str::to_string))?;
    Ok(rows.map(|names| !names.is_empty()))
}

// ============================================================================
// SECTION: Row Helpers
// ============================================================================

/// Reads non-empty names from one column of a statement's result.
fn read_names(
    connection: &mut (dyn MetadataConnection + '_),
    sql: &str,
    column: usize,
    cancel: &AtomicBool,
) -> Result<Option<Vec<String>>, FetchError> {
    read_rows(connection, sql, cancel, |row| {
        row.get(column).filter(|name| !name.is_empty()).map(str::to_string)
    })
}

/// Runs `sql` and maps each row, checking `cancel` before every row.
/// Returns `None` when cancelled.
fn read_rows<T, F>(
    connection: &mut (dyn MetadataConnection + '_),
    sql: &str,
    cancel: &AtomicBool,
    mut extract: F,
) -> Result<Option<Vec<T>>, FetchError>
where
    F: FnMut(&MetadataRow) -> Option<T>,
{
    let mut rows = connection.execute_query(sql)?;
    let mut values = Vec::new();
    loop {
        if is_cancelled(cancel) {
            debug!(statement = sql, read = values.len(), "fetch abandoned");
            return Ok(None);
        }
        let Some(row) = rows.next_row()? else {
            break;
        };
        if let Some(value) = extract(&row) {
            values.push(value);
        }
    }
    Ok(Some(values))
}

/// Returns true once cancellation was requested.
fn is_cancelled(cancel: &AtomicBool) -> bool {
    cancel.load(Ordering::Acquire)
}

/// Wraps server-wide names.
const fn server_names(category: ObjectCategory, names: Vec<String>) -> FetchOutcome {
    FetchOutcome::new(RefreshPayload::Names {
        category,
        names,
    })
}

/// Wraps schema-scoped names.
fn schema_names(category: ObjectCategory, schema: &str, names: Vec<String>) -> FetchOutcome {
    FetchOutcome::new(RefreshPayload::SchemaObjects {
        category,
        schema: schema.to_string(),
        names,
    })
}

/// Builds the payload for a tables or views fetch.
fn table_payload(
    schema: &str,
    names: Vec<String>,
    views: bool,
    refreshed_at: Option<i64>,
) -> RefreshPayload {
    if views {
        RefreshPayload::SchemaObjects {
            category: ObjectCategory::Views,
            schema: schema.to_string(),
            names,
        }
    } else {
        RefreshPayload::Tables {
            schema: schema.to_string(),
            names,
            refreshed_at,
        }
    }
}

/// Current time in unix seconds, never zero.
fn unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(1, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
        .max(1)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
