// crates/objcache-core/src/interfaces/mod.rs
// ============================================================================
// Module: Object Name Cache Interfaces
// Description: Collaborator interfaces for the live database connection.
// Purpose: Define how the cache consumes a shared server connection.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! The cache never owns the live connection. A [`ConnectionProvider`] hands
//! out a scoped guard with exclusive use of one connection for the guard's
//! lifetime; dropping the guard releases the caller's lock. Statements issued
//! through [`MetadataConnection`] are read-only metadata queries and their
//! rows are consumed one at a time through [`ResultRows`] so a fetch can stop
//! early.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Live connection errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// No connection could be acquired.
    #[error("connection unavailable: {0}")]
    Unavailable(String),
    /// The server rejected or failed a statement.
    #[error("metadata query failed: {0}")]
    Query(String),
}

// ============================================================================
// SECTION: Rows
// ============================================================================

/// One row of a metadata result set with positional access.
///
/// # Invariants
/// - `None` entries represent SQL `NULL`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataRow {
    /// Column values in result order.
    columns: Vec<Option<String>>,
}

impl MetadataRow {
    /// Creates a row from nullable column values.
    #[must_use]
    pub const fn new(columns: Vec<Option<String>>) -> Self {
        Self {
            columns,
        }
    }

    /// Creates a row whose columns are all non-null.
    #[must_use]
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: values.into_iter().map(|value| Some(value.into())).collect(),
        }
    }

    /// Returns the value at a zero-based column index, `None` when the column
    /// is missing or `NULL`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.columns.get(index).and_then(Option::as_deref)
    }

    /// Returns the number of columns.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true when the row has no columns.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Forward-only cursor over a metadata result set.
pub trait ResultRows {
    /// Advances to the next row, returning `None` once exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] when the server fails mid-stream.
    fn next_row(&mut self) -> Result<Option<MetadataRow>, ConnectionError>;
}

// ============================================================================
// SECTION: Connection
// ============================================================================

/// Exclusive handle on one live connection.
///
/// Dropping the handle releases whatever lock the provider took to hand it
/// out.
pub trait MetadataConnection {
    /// Executes a read-only statement and returns its rows.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] when the statement cannot be executed.
    fn execute_query(&mut self, sql: &str) -> Result<Box<dyn ResultRows + '_>, ConnectionError>;
}

/// Source of exclusive live connections shared with the rest of the client.
pub trait ConnectionProvider: Send + Sync {
    /// Locks one live connection for the lifetime of the returned handle.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] when no connection is available.
    fn acquire(&self) -> Result<Box<dyn MetadataConnection + '_>, ConnectionError>;
}

// ============================================================================
// SECTION: Feedback
// ============================================================================

/// Progress callback: `true` when background work starts, `false` when the
/// worker drains its queue and exits.
pub type ProgressFeedback = Arc<dyn Fn(bool) + Send + Sync>;
