// crates/objcache/src/lib.rs
// ============================================================================
// Module: Object Name Cache Engine
// Description: Background-refreshed autocompletion cache for SQL editors.
// Purpose: Expose the cache façade, its configuration, and refresh plumbing.
// Dependencies: objcache-core, objcache-store-sqlite, serde, toml, tracing
// ============================================================================

//! ## Overview
//! The engine ties the persistent name store to a live connection. Editor
//! lookups are answered from the store without waiting on the server; cache
//! misses queue deduplicated refresh tasks that a single background worker
//! drains through the per-category fetchers.
//!
//! ```text
//! get_matching_* -> store lookup (+ queue refresh on miss)
//!                -> worker -> fetcher -> store replace (+ follow-up tasks)
//! ```

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cache;
pub mod config;
pub mod fetchers;
pub mod queue;
mod scheduler;
pub mod sql;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cache::AutoCompleteCache;
pub use cache::CacheError;
pub use config::CacheConfig;
pub use config::ConfigError;
pub use config::QueueConfig;
pub use config::StoreSettings;
pub use config::WorkerConfig;
pub use config::sanitize_connection_id;
pub use fetchers::FetchError;
pub use fetchers::FetchOutcome;
pub use fetchers::RefreshPayload;
pub use fetchers::fetch;
pub use objcache_core::ObjectCategory;
pub use objcache_core::RefreshTask;
pub use queue::EnqueueOutcome;
pub use queue::TaskQueue;
