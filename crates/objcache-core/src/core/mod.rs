// crates/objcache-core/src/core/mod.rs
// ============================================================================
// Module: Object Name Cache Core Types
// Description: Cache categories and refresh task descriptions.
// Purpose: Provide stable types shared by the store and the refresh engine.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Core types name the cached object categories and the units of background
//! refresh work. Both are plain values; ownership of any state lives in the
//! store and engine crates.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod category;
pub mod task;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use category::ObjectCategory;
pub use category::ScopeLevel;
pub use task::RefreshTask;
