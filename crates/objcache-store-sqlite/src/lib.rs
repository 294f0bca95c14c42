// crates/objcache-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Object Name Store
// Description: Persistent autocompletion name store backed by SQLite.
// Purpose: Hold per-connection object name lists between refreshes.
// Dependencies: objcache-core, rusqlite, tracing
// ============================================================================

//! ## Overview
//! This crate provides the persistent store behind the autocompletion cache:
//! one `SQLite` file per connection identity with a normalized table for each
//! [`objcache_core::ObjectCategory`]. Every refresh replaces one scope inside
//! a single transaction so readers see either the old or the new name set.
//! The store is best-effort: creation failures are logged and the store keeps
//! working with whatever tables exist.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::CacheStoreError;
pub use store::STORE_SCHEMA_VERSION;
pub use store::SqliteCacheStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
pub use store::TriggerEntry;
pub use store::escape_like;
