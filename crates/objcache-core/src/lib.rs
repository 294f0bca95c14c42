// crates/objcache-core/src/lib.rs
// ============================================================================
// Module: Object Name Cache Core Library
// Description: Public API surface for the object name cache core.
// Purpose: Expose cache categories, refresh tasks, and collaborator interfaces.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The core crate defines the vocabulary shared by the persistent store and
//! the refresh engine: which object categories are cached, how refresh work
//! is described, and the interfaces through which the live database
//! connection is consumed. It performs no I/O of its own.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::ConnectionError;
pub use interfaces::ConnectionProvider;
pub use interfaces::MetadataConnection;
pub use interfaces::MetadataRow;
pub use interfaces::ProgressFeedback;
pub use interfaces::ResultRows;
