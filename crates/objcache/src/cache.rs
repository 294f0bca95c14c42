// crates/objcache/src/cache.rs
// ============================================================================
// Module: Autocompletion Cache
// Description: Query façade over the object name store.
// Purpose: Answer prefix lookups from the local store and schedule refreshes.
// Dependencies: objcache-core, objcache-store-sqlite, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`AutoCompleteCache`] is the API the editor calls while the user types.
//! Lookups read the local store under the store lock and never touch the
//! live connection; a lookup in a schema that was never loaded queues that
//! schema's refresh and returns what is cached right now (possibly nothing).
//! Errors never reach the caller of a lookup: they are logged and an empty
//! result is returned.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use objcache_core::ConnectionProvider;
use objcache_core::ObjectCategory;
use objcache_core::ProgressFeedback;
use objcache_core::RefreshTask;
use objcache_store_sqlite::CacheStoreError;
use objcache_store_sqlite::SqliteCacheStore;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::CacheConfig;
use crate::config::ConfigError;
use crate::queue::TaskQueue;
use crate::scheduler;
use crate::scheduler::CacheState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Server-wide lists queued when a cache is constructed with preload.
const PRELOAD_TASKS: [RefreshTask; 5] = [
    RefreshTask::Schemas,
    RefreshTask::Variables,
    RefreshTask::Engines,
    RefreshTask::Charsets,
    RefreshTask::Collations,
];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Cache construction errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The store could not be opened.
    #[error(transparent)]
    Store(#[from] CacheStoreError),
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Autocompletion cache bound to one live connection.
///
/// # Invariants
/// - After [`AutoCompleteCache::shutdown`] returns, no background thread
///   touches the store and every lookup returns an empty result.
pub struct AutoCompleteCache {
    /// State shared with the refresh worker.
    state: Arc<CacheState>,
    /// Store file location.
    cache_file: PathBuf,
}

impl AutoCompleteCache {
    /// Opens (recreating when possible) the store for `connection_id` and,
    /// when configured, queues the server-wide lists.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the configuration is invalid or the store
    /// cannot be opened.
    pub fn new(
        connection_id: &str,
        provider: Arc<dyn ConnectionProvider>,
        feedback: Option<ProgressFeedback>,
        config: &CacheConfig,
    ) -> Result<Self, CacheError> {
        config.validate()?;
        let store = SqliteCacheStore::open(&config.store_config_for(connection_id))?;
        let cache_file = store.path().to_path_buf();
        let state = Arc::new(CacheState::new(
            store,
            TaskQueue::new(config.queue.max_pending_tasks),
            provider,
            feedback,
            config.worker.thread_name.clone(),
        ));
        info!(connection = connection_id, path = %cache_file.display(), "autocompletion cache ready");
        let cache = Self {
            state,
            cache_file,
        };
        if config.preload {
            for task in PRELOAD_TASKS {
                cache.add_pending_refresh(task);
            }
        }
        Ok(cache)
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    /// Returns schema names starting with `prefix`.
    #[must_use]
    pub fn get_matching_schema_names(&self, prefix: &str) -> Vec<String> {
        self.matching(ObjectCategory::Schemas, "", "", prefix)
    }

    /// Returns base table names of `schema` (any schema when empty) starting
    /// with `prefix`.
    #[must_use]
    pub fn get_matching_table_names(&self, schema: &str, prefix: &str) -> Vec<String> {
        self.refresh_schema_cache_if_needed(schema);
        self.matching(ObjectCategory::Tables, schema, "", prefix)
    }

    /// Returns view names of `schema` starting with `prefix`.
    #[must_use]
    pub fn get_matching_view_names(&self, schema: &str, prefix: &str) -> Vec<String> {
        self.refresh_schema_cache_if_needed(schema);
        self.matching(ObjectCategory::Views, schema, "", prefix)
    }

    /// Returns column names of `table` (table or view) starting with
    /// `prefix`; empty scope arguments match any schema or table.
    #[must_use]
    pub fn get_matching_column_names(&self, schema: &str, table: &str, prefix: &str) -> Vec<String> {
        self.refresh_schema_cache_if_needed(schema);
        self.matching(ObjectCategory::Columns, schema, table, prefix)
    }

    /// Returns stored procedure names of `schema` starting with `prefix`.
    #[must_use]
    pub fn get_matching_procedure_names(&self, schema: &str, prefix: &str) -> Vec<String> {
        self.refresh_schema_cache_if_needed(schema);
        self.matching(ObjectCategory::Procedures, schema, "", prefix)
    }

    /// Returns stored function names of `schema` starting with `prefix`.
    #[must_use]
    pub fn get_matching_function_names(&self, schema: &str, prefix: &str) -> Vec<String> {
        self.refresh_schema_cache_if_needed(schema);
        self.matching(ObjectCategory::Functions, schema, "", prefix)
    }

    /// Returns trigger names of `table` starting with `prefix`.
    #[must_use]
    pub fn get_matching_trigger_names(
        &self,
        schema: &str,
        table: &str,
        prefix: &str,
    ) -> Vec<String> {
        self.refresh_schema_cache_if_needed(schema);
        self.matching(ObjectCategory::Triggers, schema, table, prefix)
    }

    /// Returns event names of `schema` starting with `prefix`.
    #[must_use]
    pub fn get_matching_events(&self, schema: &str, prefix: &str) -> Vec<String> {
        self.matching(ObjectCategory::Events, schema, "", prefix)
    }

    /// Returns user-defined function names starting with `prefix`.
    #[must_use]
    pub fn get_matching_udf_names(&self, prefix: &str) -> Vec<String> {
        self.matching(ObjectCategory::Udfs, "", "", prefix)
    }

    /// Returns system variable names (with `@@`) starting with `prefix`.
    #[must_use]
    pub fn get_matching_variables(&self, prefix: &str) -> Vec<String> {
        self.matching(ObjectCategory::Variables, "", "", prefix)
    }

    /// Returns storage engine names starting with `prefix`.
    #[must_use]
    pub fn get_matching_engines(&self, prefix: &str) -> Vec<String> {
        self.matching(ObjectCategory::Engines, "", "", prefix)
    }

    /// Returns character set names starting with `prefix`.
    #[must_use]
    pub fn get_matching_charsets(&self, prefix: &str) -> Vec<String> {
        self.matching(ObjectCategory::Charsets, "", "", prefix)
    }

    /// Returns collation names starting with `prefix`.
    #[must_use]
    pub fn get_matching_collations(&self, prefix: &str) -> Vec<String> {
        self.matching(ObjectCategory::Collations, "", "", prefix)
    }

    /// Returns logfile group names starting with `prefix`; every call also
    /// queues a refresh of the list.
    #[must_use]
    pub fn get_matching_logfile_groups(&self, prefix: &str) -> Vec<String> {
        self.refresh_logfile_groups();
        self.matching(ObjectCategory::LogfileGroups, "", "", prefix)
    }

    /// Returns tablespace names starting with `prefix`; every call also
    /// queues a refresh of the list.
    #[must_use]
    pub fn get_matching_tablespaces(&self, prefix: &str) -> Vec<String> {
        self.refresh_tablespaces();
        self.matching(ObjectCategory::Tablespaces, "", "", prefix)
    }

    /// Runs one prefix lookup under the store lock.
    fn matching(
        &self,
        category: ObjectCategory,
        schema: &str,
        table: &str,
        prefix: &str,
    ) -> Vec<String> {
        let store = self.state.lock_store();
        if self.state.is_shut_down() {
            return Vec::new();
        }
        store.match_names(category, schema, table, prefix).unwrap_or_else(|err| {
            warn!(category = %category, error = %err, "autocompletion lookup failed");
            Vec::new()
        })
    }

    // ------------------------------------------------------------------------
    // Refresh triggers
    // ------------------------------------------------------------------------

    /// Queues the local objects of `schema` when it has never been loaded.
    /// Returns true when refresh tasks were queued.
    pub fn refresh_schema_cache_if_needed(&self, schema: &str) -> bool {
        if schema.is_empty() {
            return false;
        }
        let warm = {
            let store = self.state.lock_store();
            if self.state.is_shut_down() {
                return false;
            }
            match store.is_schema_warm(schema) {
                Ok(warm) => warm,
                Err(err) => {
                    warn!(schema, error = %err, "schema refresh check failed");
                    return false;
                }
            }
        };
        if warm {
            return false;
        }
        debug!(schema, "schema not loaded; queueing refresh");
        let schema = schema.to_string();
        self.add_pending_refresh(RefreshTask::Tables {
            schema: schema.clone(),
        });
        self.add_pending_refresh(RefreshTask::Views {
            schema: schema.clone(),
        });
        self.add_pending_refresh(RefreshTask::Procedures {
            schema: schema.clone(),
        });
        self.add_pending_refresh(RefreshTask::Functions {
            schema: schema.clone(),
        });
        self.add_pending_refresh(RefreshTask::Events {
            schema,
        });
        true
    }

    /// Queues a refresh of the schema list.
    pub fn refresh_schema_list(&self) {
        self.add_pending_refresh(RefreshTask::Schemas);
    }

    /// Queues a refresh of the base tables of `schema`.
    pub fn refresh_tables(&self, schema: &str) {
        self.add_scoped(schema, |schema| RefreshTask::Tables {
            schema,
        });
    }

    /// Queues a refresh of the views of `schema`.
    pub fn refresh_views(&self, schema: &str) {
        self.add_scoped(schema, |schema| RefreshTask::Views {
            schema,
        });
    }

    /// Queues a refresh of the stored procedures of `schema`.
    pub fn refresh_procedures(&self, schema: &str) {
        self.add_scoped(schema, |schema| RefreshTask::Procedures {
            schema,
        });
    }

    /// Queues a refresh of the stored functions of `schema`.
    pub fn refresh_functions(&self, schema: &str) {
        self.add_scoped(schema, |schema| RefreshTask::Functions {
            schema,
        });
    }

    /// Queues a refresh of the events of `schema`.
    pub fn refresh_events(&self, schema: &str) {
        self.add_scoped(schema, |schema| RefreshTask::Events {
            schema,
        });
    }

    /// Queues a refresh of the columns of one table or view.
    pub fn refresh_columns(&self, schema: &str, table: &str) {
        if table.is_empty() {
            debug!(schema, "column refresh without table ignored");
            return;
        }
        self.add_scoped(schema, |schema| RefreshTask::Columns {
            schema,
            table: table.to_string(),
        });
    }

    /// Queues a refresh of the triggers of `table`, or of every table in the
    /// schema when `table` is empty.
    pub fn refresh_triggers(&self, schema: &str, table: &str) {
        self.add_scoped(schema, |schema| RefreshTask::Triggers {
            schema,
            table: table.to_string(),
        });
    }

    /// Queues a refresh of user-defined functions.
    pub fn refresh_udfs(&self) {
        self.add_pending_refresh(RefreshTask::Udfs);
    }

    /// Queues a refresh of tablespaces.
    pub fn refresh_tablespaces(&self) {
        self.add_pending_refresh(RefreshTask::Tablespaces);
    }

    /// Queues a refresh of logfile groups.
    pub fn refresh_logfile_groups(&self) {
        self.add_pending_refresh(RefreshTask::LogfileGroups);
    }

    /// Queues a refresh of system variables.
    pub fn refresh_variables(&self) {
        self.add_pending_refresh(RefreshTask::Variables);
    }

    /// Queues a refresh of storage engines.
    pub fn refresh_engines(&self) {
        self.add_pending_refresh(RefreshTask::Engines);
    }

    /// Queues a refresh of character sets.
    pub fn refresh_charsets(&self) {
        self.add_pending_refresh(RefreshTask::Charsets);
    }

    /// Queues a refresh of collations.
    pub fn refresh_collations(&self) {
        self.add_pending_refresh(RefreshTask::Collations);
    }

    /// Queues `task` unless an equivalent task is pending, starting the
    /// worker when none is running.
    pub fn add_pending_refresh(&self, task: RefreshTask) {
        scheduler::add_pending_refresh(&self.state, task);
    }

    /// Queues a schema-scoped task; an empty schema is ignored.
    fn add_scoped<F>(&self, schema: &str, build: F)
    where
        F: FnOnce(String) -> RefreshTask,
    {
        if schema.is_empty() {
            debug!("scoped refresh without schema ignored");
            return;
        }
        self.add_pending_refresh(build(schema.to_string()));
    }

    // ------------------------------------------------------------------------
    // Fetch-done predicates
    // ------------------------------------------------------------------------

    /// Returns true once the schema list has been stored (even if empty).
    #[must_use]
    pub fn is_schema_list_fetch_done(&self) -> bool {
        self.probe("schema list", |store| store.has_rows(ObjectCategory::Schemas, None, None))
    }

    /// Returns true once the tables of `schema` have been stored.
    #[must_use]
    pub fn is_schema_tables_fetch_done(&self, schema: &str) -> bool {
        self.probe("schema tables", |store| {
            Ok(store.is_schema_warm(schema)?
                || store.has_rows(ObjectCategory::Tables, Some(schema), None)?)
        })
    }

    /// Returns true once columns of `table` have been stored.
    #[must_use]
    pub fn is_schema_table_columns_fetch_done(&self, schema: &str, table: &str) -> bool {
        self.probe("table columns", |store| {
            store.has_rows(ObjectCategory::Columns, Some(schema), Some(table))
        })
    }

    /// Returns true once functions of `schema` have been stored.
    #[must_use]
    pub fn is_schema_functions_fetch_done(&self, schema: &str) -> bool {
        self.probe("schema functions", |store| {
            store.has_rows(ObjectCategory::Functions, Some(schema), None)
        })
    }

    /// Returns true once procedures of `schema` have been stored.
    #[must_use]
    pub fn is_schema_procedure_fetch_done(&self, schema: &str) -> bool {
        self.probe("schema procedures", |store| {
            store.has_rows(ObjectCategory::Procedures, Some(schema), None)
        })
    }

    /// Evaluates a store predicate under the store lock; false on error or
    /// after shutdown.
    fn probe<F>(&self, what: &str, check: F) -> bool
    where
        F: FnOnce(&SqliteCacheStore) -> Result<bool, CacheStoreError>,
    {
        let store = self.state.lock_store();
        if self.state.is_shut_down() {
            return false;
        }
        check(&store).unwrap_or_else(|err| {
            warn!(check = what, error = %err, "fetch-done check failed");
            false
        })
    }

    // ------------------------------------------------------------------------
    // Lifecycle and diagnostics
    // ------------------------------------------------------------------------

    /// Stops background work: clears pending tasks and the progress
    /// callback, makes lookups return empty results, and blocks until the
    /// worker has exited. Safe to call more than once.
    pub fn shutdown(&self) {
        scheduler::shutdown(&self.state);
    }

    /// Returns true once [`AutoCompleteCache::shutdown`] has begun.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.state.is_shut_down()
    }

    /// Returns true while a refresh worker holds the worker permit.
    #[must_use]
    pub fn is_worker_active(&self) -> bool {
        self.state.is_worker_active()
    }

    /// Returns a copy of the pending refresh tasks in execution order.
    #[must_use]
    pub fn pending_tasks(&self) -> Vec<RefreshTask> {
        scheduler::pending_tasks(&self.state)
    }

    /// Returns the store file path.
    #[must_use]
    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }
}

impl Drop for AutoCompleteCache {
    fn drop(&mut self) {
        if !self.state.is_shut_down() {
            warn!(path = %self.cache_file.display(), "autocompletion cache dropped without shutdown");
            self.shutdown();
        }
    }
}
