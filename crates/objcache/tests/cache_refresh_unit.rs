// crates/objcache/tests/cache_refresh_unit.rs
// ============================================================================
// Module: Cache Refresh Unit Tests
// Description: End-to-end refresh behavior against a scripted server.
// Purpose: Validate lazy refresh, deduplication, cascades, and lookups.
// ============================================================================

//! ## Overview
//! Drives [`objcache::AutoCompleteCache`] against the fake server:
//! - Prefix lookups after a cache-miss refresh
//! - Warm-once behavior and schema stamp preservation
//! - Queue coalescing and the queue bound while the worker is busy
//! - Cascading column/trigger refreshes and view columns
//! - Fetch failures leaving the worker alive
//! - Progress callback start/finish notifications

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::sync::Arc;
use std::sync::Mutex;

use common::Catalog;
use common::FakeServer;
use common::SchemaDef;
use common::open_cache;
use common::quiet_config;
use common::strings;
use common::wait_for;
use common::wait_idle;
use objcache::RefreshTask;
use objcache_core::MetadataRow;
use objcache_core::ProgressFeedback;
use rusqlite::Connection;
use tempfile::TempDir;

const SALES_TABLES: &str = "SHOW FULL TABLES FROM `sales`";

// ============================================================================
// SECTION: Lookups
// ============================================================================

#[test]
fn table_lookup_miss_refreshes_then_matches_prefix() {
    let temp = TempDir::new().unwrap();
    let server = FakeServer::new(Catalog::sample());
    let cache = open_cache(&server, &quiet_config(temp.path()), None);
    cache.refresh_schema_list();
    wait_idle(&cache);

    let _ = cache.get_matching_table_names("sales", "ord");
    wait_idle(&cache);

    assert_eq!(cache.get_matching_table_names("sales", "ord"), strings(&["order_items", "orders"]));
    assert_eq!(
        cache.get_matching_table_names("sales", ""),
        strings(&["customers", "order_items", "orders"])
    );
    assert!(cache.get_matching_table_names("sales", "zzz").is_empty());
    assert_eq!(cache.get_matching_view_names("sales", ""), strings(&["big_orders"]));
    cache.shutdown();
}

#[test]
fn schema_objects_cascade_into_columns_and_triggers() {
    let temp = TempDir::new().unwrap();
    let server = FakeServer::new(Catalog::sample());
    let cache = open_cache(&server, &quiet_config(temp.path()), None);
    cache.refresh_schema_list();
    wait_idle(&cache);
    assert!(cache.refresh_schema_cache_if_needed("sales"));
    wait_idle(&cache);

    assert_eq!(
        cache.get_matching_column_names("sales", "orders", ""),
        strings(&["customer_id", "id", "total"])
    );
    assert_eq!(cache.get_matching_column_names("sales", "big_orders", "total"), strings(&["total_eur"]));
    assert_eq!(cache.get_matching_column_names("sales", "", "total"), strings(&["total", "total_eur"]));
    assert_eq!(cache.get_matching_trigger_names("sales", "orders", ""), strings(&["orders_bi"]));
    assert_eq!(
        cache.get_matching_trigger_names("sales", "", ""),
        strings(&["customers_bu", "orders_bi"])
    );
    assert_eq!(cache.get_matching_procedure_names("sales", ""), strings(&["archive_orders"]));
    assert_eq!(cache.get_matching_function_names("sales", "order"), strings(&["order_total"]));
    assert_eq!(cache.get_matching_events("sales", ""), strings(&["nightly_rollup"]));

    assert!(cache.is_schema_tables_fetch_done("sales"));
    assert!(cache.is_schema_table_columns_fetch_done("sales", "orders"));
    assert!(cache.is_schema_table_columns_fetch_done("sales", "big_orders"));
    assert!(cache.is_schema_functions_fetch_done("sales"));
    assert!(cache.is_schema_procedure_fetch_done("sales"));
    assert!(!cache.is_schema_tables_fetch_done("hr"));
    cache.shutdown();
}

#[test]
fn server_wide_lists_are_stored() {
    let temp = TempDir::new().unwrap();
    let server = FakeServer::new(Catalog::sample());
    let cache = open_cache(&server, &quiet_config(temp.path()), None);
    cache.refresh_variables();
    cache.refresh_engines();
    cache.refresh_charsets();
    cache.refresh_collations();
    cache.refresh_udfs();
    wait_idle(&cache);

    assert_eq!(cache.get_matching_variables("@@max"), strings(&["@@max_connections"]));
    assert_eq!(cache.get_matching_variables("auto"), Vec::<String>::new());
    assert_eq!(cache.get_matching_engines("inno"), strings(&["InnoDB"]));
    assert_eq!(cache.get_matching_charsets(""), strings(&["latin1", "utf8mb4"]));
    assert_eq!(cache.get_matching_collations("utf8mb4_b"), strings(&["utf8mb4_bin"]));
    assert_eq!(cache.get_matching_udf_names("lib"), strings(&["lib_mysqludf_json"]));
    cache.shutdown();
}

#[test]
fn tablespaces_and_logfile_groups_refresh_on_every_lookup() {
    let temp = TempDir::new().unwrap();
    let server = FakeServer::new(Catalog::sample());
    let cache = open_cache(&server, &quiet_config(temp.path()), None);

    let _ = cache.get_matching_tablespaces("");
    let _ = cache.get_matching_logfile_groups("");
    wait_idle(&cache);
    assert_eq!(cache.get_matching_tablespaces(""), strings(&["ts_data"]));
    assert_eq!(cache.get_matching_logfile_groups(""), strings(&["lg_1"]));
    wait_idle(&cache);

    let tablespace_query = "SELECT DISTINCT TABLESPACE_NAME FROM information_schema.FILES";
    assert_eq!(server.count(tablespace_query), 2);
    cache.shutdown();
}

#[test]
fn preload_queues_server_wide_lists_in_order() {
    let temp = TempDir::new().unwrap();
    let server = FakeServer::new(Catalog::sample());
    let mut config = quiet_config(temp.path());
    config.preload = true;
    let cache = open_cache(&server, &config, None);
    wait_idle(&cache);

    assert_eq!(
        server.queries(),
        strings(&[
            "SHOW DATABASES",
            "SHOW GLOBAL VARIABLES",
            "SHOW ENGINES",
            "SHOW CHARSET",
            "SHOW COLLATION"
        ])
    );
    assert!(cache.is_schema_list_fetch_done());
    assert_eq!(cache.get_matching_schema_names(""), strings(&["hr", "sales"]));
    cache.shutdown();
}

// ============================================================================
// SECTION: Warm Schemas
// ============================================================================

#[test]
fn warm_schema_is_not_refreshed_again() {
    let temp = TempDir::new().unwrap();
    let server = FakeServer::new(Catalog::sample());
    let cache = open_cache(&server, &quiet_config(temp.path()), None);
    cache.refresh_schema_list();
    wait_idle(&cache);

    let _ = cache.get_matching_table_names("sales", "");
    wait_idle(&cache);
    // One statement for tables, one for views.
    assert_eq!(server.count(SALES_TABLES), 2);

    for _ in 0 .. 3 {
        let _ = cache.get_matching_table_names("sales", "");
        let _ = cache.get_matching_procedure_names("sales", "");
        assert!(!cache.refresh_schema_cache_if_needed("sales"));
        assert!(cache.pending_tasks().is_empty());
    }
    wait_idle(&cache);
    assert_eq!(server.count(SALES_TABLES), 2);
    cache.shutdown();
}

#[test]
fn schema_list_refresh_keeps_warm_stamps() {
    let temp = TempDir::new().unwrap();
    let server = FakeServer::new(Catalog::sample());
    let cache = open_cache(&server, &quiet_config(temp.path()), None);
    cache.refresh_schema_list();
    wait_idle(&cache);
    cache.refresh_schema_cache_if_needed("sales");
    wait_idle(&cache);

    server.edit_catalog(|catalog| {
        catalog.schemas.insert("newdb".to_string(), SchemaDef::default());
    });
    cache.refresh_schema_list();
    wait_idle(&cache);

    assert_eq!(cache.get_matching_schema_names(""), strings(&["hr", "newdb", "sales"]));
    assert!(!cache.refresh_schema_cache_if_needed("sales"));
    assert!(cache.refresh_schema_cache_if_needed("newdb"));
    cache.shutdown();
}

#[test]
fn empty_server_still_reports_schema_list_done() {
    let temp = TempDir::new().unwrap();
    let server = FakeServer::new(Catalog::default());
    let cache = open_cache(&server, &quiet_config(temp.path()), None);
    assert!(!cache.is_schema_list_fetch_done());
    cache.refresh_schema_list();
    wait_idle(&cache);

    assert!(cache.is_schema_list_fetch_done());
    assert!(cache.get_matching_schema_names("").is_empty());
    cache.shutdown();
}

#[test]
fn unknown_schema_is_not_listed() {
    let temp = TempDir::new().unwrap();
    let server = FakeServer::new(Catalog::sample());
    let cache = open_cache(&server, &quiet_config(temp.path()), None);
    cache.refresh_tables("ghost");
    wait_idle(&cache);

    assert_eq!(server.count("SHOW SCHEMAS LIKE 'ghost'"), 1);
    assert_eq!(server.count("SHOW FULL TABLES FROM `ghost`"), 0);
    assert!(cache.get_matching_table_names("ghost", "").is_empty());
    cache.shutdown();
}

// ============================================================================
// SECTION: Queue
// ============================================================================

#[test]
fn duplicate_requests_coalesce_while_worker_is_busy() {
    let temp = TempDir::new().unwrap();
    let server = FakeServer::new(Catalog::sample());
    server.close_gate();
    let cache = open_cache(&server, &quiet_config(temp.path()), None);
    cache.refresh_schema_list();
    wait_for("worker to take the schema task", || cache.pending_tasks().is_empty());

    for _ in 0 .. 3 {
        cache.refresh_tables("sales");
        cache.refresh_columns("sales", "orders");
        cache.refresh_udfs();
    }
    cache.refresh_columns("sales", "customers");

    assert_eq!(cache.pending_tasks(), vec![
        RefreshTask::Tables {
            schema: "sales".to_string(),
        },
        RefreshTask::Columns {
            schema: "sales".to_string(),
            table: "orders".to_string(),
        },
        RefreshTask::Udfs,
        RefreshTask::Columns {
            schema: "sales".to_string(),
            table: "customers".to_string(),
        },
    ]);
    assert!(cache.is_worker_active());

    server.open_gate();
    wait_idle(&cache);
    assert_eq!(server.count(SALES_TABLES), 1);
    cache.shutdown();
}

#[test]
fn full_queue_drops_new_work() {
    let temp = TempDir::new().unwrap();
    let server = FakeServer::new(Catalog::sample());
    server.close_gate();
    let mut config = quiet_config(temp.path());
    config.queue.max_pending_tasks = 2;
    let cache = open_cache(&server, &config, None);
    cache.refresh_schema_list();
    wait_for("worker to take the schema task", || cache.pending_tasks().is_empty());

    cache.refresh_tables("a");
    cache.refresh_tables("b");
    cache.refresh_tables("c");
    assert_eq!(cache.pending_tasks().len(), 2);

    server.open_gate();
    wait_idle(&cache);
    cache.refresh_tables("c");
    wait_idle(&cache);
    assert_eq!(server.count("SHOW SCHEMAS LIKE 'c'"), 1);
    cache.shutdown();
}

#[test]
fn full_queue_still_takes_cascaded_column_and_trigger_tasks() {
    let temp = TempDir::new().unwrap();
    let server = FakeServer::new(Catalog::sample());
    server.close_gate();
    let mut config = quiet_config(temp.path());
    config.queue.max_pending_tasks = 2;
    let cache = open_cache(&server, &config, None);
    cache.refresh_schema_list();
    wait_for("worker to take the schema task", || cache.pending_tasks().is_empty());

    cache.refresh_tables("sales");
    cache.refresh_engines();
    assert_eq!(cache.pending_tasks().len(), 2);

    server.open_gate();
    wait_idle(&cache);

    assert!(cache.is_schema_tables_fetch_done("sales"));
    assert!(!cache.refresh_schema_cache_if_needed("sales"));
    wait_idle(&cache);
    assert_eq!(server.count("SHOW COLUMNS FROM `sales`.`orders`"), 1);
    assert_eq!(
        cache.get_matching_column_names("sales", "orders", ""),
        strings(&["customer_id", "id", "total"])
    );
    assert_eq!(cache.get_matching_column_names("sales", "customers", ""), strings(&["id", "name"]));
    assert_eq!(cache.get_matching_trigger_names("sales", "orders", ""), strings(&["orders_bi"]));
    assert_eq!(cache.get_matching_engines(""), strings(&["InnoDB", "MEMORY", "MyISAM"]));
    cache.shutdown();
}

#[test]
fn scoped_refresh_without_schema_is_ignored() {
    let temp = TempDir::new().unwrap();
    let server = FakeServer::new(Catalog::sample());
    let cache = open_cache(&server, &quiet_config(temp.path()), None);
    cache.refresh_tables("");
    cache.refresh_columns("sales", "");
    assert!(!cache.refresh_schema_cache_if_needed(""));
    assert!(cache.pending_tasks().is_empty());
    assert!(!cache.is_worker_active());
    cache.shutdown();
}

// ============================================================================
// SECTION: Failures
// ============================================================================

#[test]
fn failed_fetch_does_not_stop_the_worker() {
    let temp = TempDir::new().unwrap();
    let server = FakeServer::new(Catalog::sample());
    server.fail_statements_containing("SHOW ENGINES");
    let cache = open_cache(&server, &quiet_config(temp.path()), None);
    cache.refresh_engines();
    cache.refresh_charsets();
    wait_idle(&cache);

    assert!(cache.get_matching_engines("").is_empty());
    assert_eq!(cache.get_matching_charsets(""), strings(&["latin1", "utf8mb4"]));

    server.clear_failures();
    cache.refresh_engines();
    wait_idle(&cache);
    assert_eq!(cache.get_matching_engines(""), strings(&["InnoDB", "MEMORY", "MyISAM"]));
    cache.shutdown();
}

#[test]
fn failed_refresh_keeps_previous_names() {
    let temp = TempDir::new().unwrap();
    let server = FakeServer::new(Catalog::sample());
    let cache = open_cache(&server, &quiet_config(temp.path()), None);
    cache.refresh_collations();
    wait_idle(&cache);

    server.set_unavailable(true);
    cache.refresh_collations();
    wait_idle(&cache);
    assert_eq!(cache.get_matching_collations(""), strings(&["utf8mb4_0900_ai_ci", "utf8mb4_bin"]));
    cache.shutdown();
}

#[test]
fn rejected_store_write_keeps_names_and_worker_moves_on() {
    let temp = TempDir::new().unwrap();
    let server = FakeServer::new(Catalog::sample());
    let cache = open_cache(&server, &quiet_config(temp.path()), None);
    cache.refresh_variables();
    wait_idle(&cache);
    let before = strings(&["@@autocommit", "@@max_connections", "@@sql_mode"]);
    assert_eq!(cache.get_matching_variables(""), before);

    Connection::open(cache.cache_file())
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER reject_boom BEFORE INSERT ON variables WHEN NEW.name = '@@boom' \
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();
    server.edit_catalog(|catalog| catalog.variables.push("boom".to_string()));
    cache.refresh_variables();
    cache.refresh_engines();
    wait_idle(&cache);

    assert_eq!(server.count("SHOW GLOBAL VARIABLES"), 2);
    assert_eq!(cache.get_matching_variables(""), before);
    assert_eq!(cache.get_matching_engines(""), strings(&["InnoDB", "MEMORY", "MyISAM"]));
    cache.shutdown();
}

#[test]
fn null_and_empty_names_are_skipped() {
    let temp = TempDir::new().unwrap();
    let server = FakeServer::new(Catalog::sample());
    server.script_rows("SHOW ENGINES", vec![
        MetadataRow::new(vec![None]),
        MetadataRow::new(vec![Some("InnoDB".to_string()), None]),
        MetadataRow::new(vec![Some(String::new())]),
        MetadataRow::new(Vec::new()),
    ]);
    server.script_rows(
        "SELECT EVENT_NAME FROM information_schema.EVENTS WHERE EVENT_SCHEMA = 'sales'",
        vec![MetadataRow::new(vec![None]), MetadataRow::new(vec![Some("purge_logs".to_string())])],
    );
    let cache = open_cache(&server, &quiet_config(temp.path()), None);
    cache.refresh_engines();
    cache.refresh_events("sales");
    wait_idle(&cache);

    assert_eq!(cache.get_matching_engines(""), strings(&["InnoDB"]));
    assert_eq!(cache.get_matching_events("sales", ""), strings(&["purge_logs"]));
    cache.shutdown();
}

// ============================================================================
// SECTION: Progress Feedback
// ============================================================================

#[test]
fn feedback_reports_start_and_finish() {
    let temp = TempDir::new().unwrap();
    let server = FakeServer::new(Catalog::sample());
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let feedback: ProgressFeedback = Arc::new(move |working| sink.lock().unwrap().push(working));
    let cache = open_cache(&server, &quiet_config(temp.path()), Some(feedback));

    cache.refresh_udfs();
    wait_for("finish notification", || events.lock().unwrap().len() == 2);
    assert_eq!(*events.lock().unwrap(), vec![true, false]);

    cache.refresh_engines();
    wait_for("second cycle", || events.lock().unwrap().len() == 4);
    assert_eq!(*events.lock().unwrap(), vec![true, false, true, false]);
    cache.shutdown();
}
