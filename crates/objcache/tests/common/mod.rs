// crates/objcache/tests/common/mod.rs
// ============================================================================
// Module: Engine Test Support
// Description: Scripted live server and polling helpers for engine tests.
// Purpose: Drive the refresh engine without a real database server.
// ============================================================================

//! Shared helpers for engine integration tests.
//!
//! [`FakeServer`] answers the metadata statements the fetchers issue from an
//! in-memory [`Catalog`], records every statement, and can slow rows down,
//! hold connection acquisition behind a gate, or fail statements on demand.

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Helpers are shared across test binaries and not all are used by each."
)]

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use objcache::AutoCompleteCache;
use objcache::CacheConfig;
use objcache_core::ConnectionError;
use objcache_core::ConnectionProvider;
use objcache_core::MetadataConnection;
use objcache_core::MetadataRow;
use objcache_core::ProgressFeedback;
use objcache_core::ResultRows;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Objects of one schema on the fake server.
#[derive(Debug, Clone, Default)]
pub struct SchemaDef {
    pub tables: BTreeMap<String, Vec<String>>,
    pub views: BTreeMap<String, Vec<String>>,
    pub procedures: Vec<String>,
    pub functions: Vec<String>,
    pub events: Vec<String>,
    /// (table, trigger) pairs.
    pub triggers: Vec<(String, String)>,
}

impl SchemaDef {
    pub fn table(mut self, name: &str, columns: &[&str]) -> Self {
        self.tables.insert(name.to_string(), strings(columns));
        self
    }

    pub fn view(mut self, name: &str, columns: &[&str]) -> Self {
        self.views.insert(name.to_string(), strings(columns));
        self
    }

    pub fn trigger(mut self, table: &str, name: &str) -> Self {
        self.triggers.push((table.to_string(), name.to_string()));
        self
    }

    pub fn procedures(mut self, names: &[&str]) -> Self {
        self.procedures = strings(names);
        self
    }

    pub fn functions(mut self, names: &[&str]) -> Self {
        self.functions = strings(names);
        self
    }

    pub fn events(mut self, names: &[&str]) -> Self {
        self.events = strings(names);
        self
    }
}

/// Everything the fake server knows.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub schemas: BTreeMap<String, SchemaDef>,
    pub variables: Vec<String>,
    pub engines: Vec<String>,
    pub charsets: Vec<String>,
    pub collations: Vec<String>,
    pub udfs: Vec<String>,
    pub tablespaces: Vec<String>,
    pub logfile_groups: Vec<String>,
}

impl Catalog {
    /// Small catalog with one `sales` schema and the server-wide lists.
    pub fn sample() -> Self {
        let sales = SchemaDef::default()
            .table("orders", &["id", "customer_id", "total"])
            .table("order_items", &["order_id", "sku"])
            .table("customers", &["id", "name"])
            .view("big_orders", &["id", "total_eur"])
            .trigger("orders", "orders_bi")
            .trigger("customers", "customers_bu")
            .procedures(&["archive_orders"])
            .functions(&["order_total"])
            .events(&["nightly_rollup", ""]);
        let mut schemas = BTreeMap::new();
        schemas.insert("sales".to_string(), sales);
        schemas.insert("hr".to_string(), SchemaDef::default().table("staff", &["id"]));
        Self {
            schemas,
            variables: strings(&["autocommit", "max_connections", "sql_mode"]),
            engines: strings(&["InnoDB", "MyISAM", "MEMORY"]),
            charsets: strings(&["latin1", "utf8mb4"]),
            collations: strings(&["utf8mb4_0900_ai_ci", "utf8mb4_bin"]),
            udfs: strings(&["lib_mysqludf_json"]),
            tablespaces: strings(&["ts_data", ""]),
            logfile_groups: strings(&["lg_1"]),
        }
    }
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

// ============================================================================
// SECTION: Fake Server
// ============================================================================

/// Scripted live server implementing the connection interfaces.
#[derive(Default)]
pub struct FakeServer {
    catalog: Mutex<Catalog>,
    log: Mutex<Vec<String>>,
    row_delay: Mutex<Duration>,
    gate_closed: Mutex<bool>,
    gate: Condvar,
    failing: Mutex<Vec<String>>,
    unavailable: Mutex<bool>,
    scripted: Mutex<BTreeMap<String, Vec<MetadataRow>>>,
    connection: Mutex<()>,
}

impl FakeServer {
    pub fn new(catalog: Catalog) -> Arc<Self> {
        Arc::new(Self {
            catalog: Mutex::new(catalog),
            ..Self::default()
        })
    }

    /// Statements executed so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Number of executed statements equal to `sql`.
    pub fn count(&self, sql: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|query| *query == sql).count()
    }

    pub fn set_row_delay(&self, delay: Duration) {
        *self.row_delay.lock().unwrap() = delay;
    }

    /// Blocks every `acquire` until [`FakeServer::open_gate`].
    pub fn close_gate(&self) {
        *self.gate_closed.lock().unwrap() = true;
    }

    pub fn open_gate(&self) {
        *self.gate_closed.lock().unwrap() = false;
        self.gate.notify_all();
    }

    /// Fails every statement containing `fragment`.
    pub fn fail_statements_containing(&self, fragment: &str) {
        self.failing.lock().unwrap().push(fragment.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    /// Answers `sql` with exactly `rows` instead of the catalog.
    pub fn script_rows(&self, sql: &str, rows: Vec<MetadataRow>) {
        self.scripted.lock().unwrap().insert(sql.to_string(), rows);
    }

    pub fn edit_catalog(&self, edit: impl FnOnce(&mut Catalog)) {
        edit(&mut self.catalog.lock().unwrap());
    }

    fn wait_for_gate(&self) {
        let mut closed = self.gate_closed.lock().unwrap();
        while *closed {
            closed = self.gate.wait(closed).unwrap();
        }
    }

    fn answer(&self, sql: &str) -> Result<Vec<MetadataRow>, ConnectionError> {
        if self.failing.lock().unwrap().iter().any(|fragment| sql.contains(fragment.as_str())) {
            return Err(ConnectionError::Query(format!("injected failure: {sql}")));
        }
        if let Some(rows) = self.scripted.lock().unwrap().get(sql) {
            return Ok(rows.clone());
        }
        let catalog = self.catalog.lock().unwrap();
        let single = |values: &[String]| -> Vec<MetadataRow> {
            values.iter().map(|value| MetadataRow::from_values([value.clone()])).collect()
        };
        match sql {
            "SHOW DATABASES" => {
                return Ok(catalog.schemas.keys().map(|name| MetadataRow::from_values([name.clone()])).collect());
            }
            "SHOW GLOBAL VARIABLES" => {
                return Ok(catalog
                    .variables
                    .iter()
                    .map(|name| MetadataRow::from_values([name.clone(), "value".to_string()]))
                    .collect());
            }
            "SHOW ENGINES" => return Ok(single(&catalog.engines)),
            "SHOW CHARSET" => return Ok(single(&catalog.charsets)),
            "SHOW COLLATION" => return Ok(single(&catalog.collations)),
            "SELECT NAME FROM mysql.func" => return Ok(single(&catalog.udfs)),
            "SELECT DISTINCT TABLESPACE_NAME FROM information_schema.FILES" => {
                return Ok(single(&catalog.tablespaces));
            }
            "SELECT DISTINCT LOGFILE_GROUP_NAME FROM information_schema.FILES" => {
                return Ok(single(&catalog.logfile_groups));
            }
            _ => {}
        }
        if let Some(rest) = sql.strip_prefix("SHOW SCHEMAS LIKE ") {
            let (pattern, _) = parse_literal(rest);
            let wanted = unescape_like(&pattern);
            return Ok(catalog
                .schemas
                .keys()
                .filter(|name| **name == wanted)
                .map(|name| MetadataRow::from_values([name.clone()]))
                .collect());
        }
        if let Some(rest) = sql.strip_prefix("SHOW FULL TABLES FROM ") {
            let (schema, _) = parse_identifier(rest);
            let def = lookup_schema(&catalog, &schema)?;
            let tables = def.tables.keys().map(|name| MetadataRow::from_values([name.as_str(), "BASE TABLE"]));
            let views = def.views.keys().map(|name| MetadataRow::from_values([name.as_str(), "VIEW"]));
            return Ok(tables.chain(views).collect());
        }
        if let Some(rest) = sql.strip_prefix("SHOW PROCEDURE STATUS WHERE Db = ") {
            let (schema, _) = parse_literal(rest);
            let def = lookup_schema(&catalog, &schema)?;
            return Ok(routine_rows(&schema, &def.procedures));
        }
        if let Some(rest) = sql.strip_prefix("SHOW FUNCTION STATUS WHERE Db = ") {
            let (schema, _) = parse_literal(rest);
            let def = lookup_schema(&catalog, &schema)?;
            return Ok(routine_rows(&schema, &def.functions));
        }
        if let Some(rest) =
            sql.strip_prefix("SELECT EVENT_NAME FROM information_schema.EVENTS WHERE EVENT_SCHEMA = ")
        {
            let (schema, _) = parse_literal(rest);
            return Ok(catalog.schemas.get(&schema).map(|def| single(&def.events)).unwrap_or_default());
        }
        if let Some(rest) = sql.strip_prefix("SHOW COLUMNS FROM ") {
            let (schema, rest) = parse_identifier(rest);
            let (table, _) = parse_identifier(rest.strip_prefix('.').unwrap());
            let def = lookup_schema(&catalog, &schema)?;
            let columns = def
                .tables
                .get(&table)
                .or_else(|| def.views.get(&table))
                .ok_or_else(|| ConnectionError::Query(format!("Table '{schema}.{table}' doesn't exist")))?;
            return Ok(single(columns));
        }
        if let Some(rest) = sql.strip_prefix("SHOW TRIGGERS FROM ") {
            let (schema, rest) = parse_identifier(rest);
            let filter = rest.strip_prefix(" WHERE `Table` = ").map(|literal| parse_literal(literal).0);
            let def = lookup_schema(&catalog, &schema)?;
            return Ok(def
                .triggers
                .iter()
                .filter(|(table, _)| filter.as_ref().is_none_or(|wanted| wanted == table))
                .map(|(table, name)| MetadataRow::from_values([name.as_str(), "INSERT", table.as_str()]))
                .collect());
        }
        Err(ConnectionError::Query(format!("unsupported statement: {sql}")))
    }
}

impl ConnectionProvider for FakeServer {
    fn acquire(&self) -> Result<Box<dyn MetadataConnection + '_>, ConnectionError> {
        self.wait_for_gate();
        if *self.unavailable.lock().unwrap() {
            return Err(ConnectionError::Unavailable("server offline".to_string()));
        }
        let guard = self.connection.lock().unwrap();
        Ok(Box::new(FakeConnection {
            server: self,
            _guard: guard,
        }))
    }
}

/// Exclusive handle on the fake server's single connection.
struct FakeConnection<'a> {
    server: &'a FakeServer,
    _guard: MutexGuard<'a, ()>,
}

impl MetadataConnection for FakeConnection<'_> {
    fn execute_query(&mut self, sql: &str) -> Result<Box<dyn ResultRows + '_>, ConnectionError> {
        self.server.log.lock().unwrap().push(sql.to_string());
        let rows = self.server.answer(sql)?;
        Ok(Box::new(FakeRows {
            rows: rows.into(),
            delay: *self.server.row_delay.lock().unwrap(),
        }))
    }
}

/// Buffered result rows with an optional per-row delay.
struct FakeRows {
    rows: VecDeque<MetadataRow>,
    delay: Duration,
}

impl ResultRows for FakeRows {
    fn next_row(&mut self) -> Result<Option<MetadataRow>, ConnectionError> {
        if !self.delay.is_zero() && !self.rows.is_empty() {
            thread::sleep(self.delay);
        }
        Ok(self.rows.pop_front())
    }
}

fn lookup_schema<'a>(catalog: &'a Catalog, schema: &str) -> Result<&'a SchemaDef, ConnectionError> {
    catalog
        .schemas
        .get(schema)
        .ok_or_else(|| ConnectionError::Query(format!("Unknown database '{schema}'")))
}

fn routine_rows(schema: &str, names: &[String]) -> Vec<MetadataRow> {
    names.iter().map(|name| MetadataRow::from_values([schema, name.as_str()])).collect()
}

/// Parses a leading backtick identifier; returns it and the remaining text.
fn parse_identifier(text: &str) -> (String, &str) {
    let body = text.strip_prefix('`').expect("identifier must be quoted");
    let mut value = String::new();
    let mut chars = body.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if ch == '`' {
            if chars.peek().is_some_and(|(_, next)| *next == '`') {
                chars.next();
                value.push('`');
            } else {
                return (value, &body[idx + 1 ..]);
            }
        } else {
            value.push(ch);
        }
    }
    panic!("unterminated identifier in {text}");
}

/// Parses a leading single-quoted literal; returns it and the remaining text.
fn parse_literal(text: &str) -> (String, &str) {
    let body = text.strip_prefix('\'').expect("literal must be quoted");
    let mut value = String::new();
    let mut chars = body.char_indices();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '\\' => {
                let (_, escaped) = chars.next().expect("dangling escape");
                value.push(match escaped {
                    'n' => '\n',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
            }
            '\'' => return (value, &body[idx + 1 ..]),
            _ => value.push(ch),
        }
    }
    panic!("unterminated literal in {text}");
}

/// Removes `LIKE` escapes from an exact-match pattern.
fn unescape_like(pattern: &str) -> String {
    let mut value = String::new();
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                value.push(next);
            }
        } else {
            value.push(ch);
        }
    }
    value
}

// ============================================================================
// SECTION: Cache Helpers
// ============================================================================

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Configuration rooted at `dir` without startup preload.
pub fn quiet_config(dir: &Path) -> CacheConfig {
    let mut config = CacheConfig::new(dir);
    config.preload = false;
    config
}

pub fn open_cache(
    server: &Arc<FakeServer>,
    config: &CacheConfig,
    feedback: Option<ProgressFeedback>,
) -> AutoCompleteCache {
    init_tracing();
    let provider: Arc<dyn ConnectionProvider> = server.clone();
    AutoCompleteCache::new("test-conn", provider, feedback, config).expect("cache opens")
}

/// Polls `condition` until it holds or a generous deadline passes.
pub fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

/// Waits until the worker has drained every pending task.
pub fn wait_idle(cache: &AutoCompleteCache) {
    wait_for("refresh worker to go idle", || {
        !cache.is_worker_active() && cache.pending_tasks().is_empty()
    });
}
