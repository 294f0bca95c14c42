// crates/objcache-core/src/core/category.rs
// ============================================================================
// Module: Object Categories
// Description: The object kinds held by the autocompletion cache.
// Purpose: Map each category to its storage table and scope granularity.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every cached object kind has its own table in the persistent store and is
//! scoped at one of three granularities: unscoped (server-wide names),
//! schema-scoped, or table-scoped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Scope Level
// ============================================================================

/// Granularity at which a category's rows are keyed.
///
/// # Invariants
/// - `Unscoped` rows are unique per name.
/// - `Schema` rows are unique per (schema, name).
/// - `Table` rows are unique per (schema, table, name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeLevel {
    /// Keyed by name only.
    Unscoped,
    /// Keyed by schema and name.
    Schema,
    /// Keyed by schema, owning table, and name.
    Table,
}

// ============================================================================
// SECTION: Categories
// ============================================================================

/// A cached object category.
///
/// # Invariants
/// - [`ObjectCategory::table_name`] values are fixed SQL identifiers and are
///   safe to splice into store statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectCategory {
    /// Schema (database) names.
    Schemas,
    /// Base tables of a schema.
    Tables,
    /// Views of a schema.
    Views,
    /// Columns of a table or view.
    Columns,
    /// Triggers of a table.
    Triggers,
    /// Stored functions of a schema.
    Functions,
    /// Stored procedures of a schema.
    Procedures,
    /// Scheduled events of a schema.
    Events,
    /// User-defined functions.
    Udfs,
    /// Character sets.
    Charsets,
    /// Collations.
    Collations,
    /// System variables (stored with the `@@` prefix).
    Variables,
    /// Storage engines.
    Engines,
    /// Tablespaces.
    Tablespaces,
    /// Logfile groups.
    LogfileGroups,
}

impl ObjectCategory {
    /// All categories in storage creation order.
    pub const ALL: [Self; 15] = [
        Self::Schemas,
        Self::Variables,
        Self::Engines,
        Self::Tablespaces,
        Self::LogfileGroups,
        Self::Udfs,
        Self::Charsets,
        Self::Collations,
        Self::Tables,
        Self::Views,
        Self::Functions,
        Self::Procedures,
        Self::Events,
        Self::Columns,
        Self::Triggers,
    ];

    /// Returns the store table holding this category.
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Schemas => "schemas",
            Self::Tables => "tables",
            Self::Views => "views",
            Self::Columns => "columns",
            Self::Triggers => "triggers",
            Self::Functions => "functions",
            Self::Procedures => "procedures",
            Self::Events => "events",
            Self::Udfs => "udfs",
            Self::Charsets => "charsets",
            Self::Collations => "collations",
            Self::Variables => "variables",
            Self::Engines => "engines",
            Self::Tablespaces => "tablespaces",
            Self::LogfileGroups => "logfile_groups",
        }
    }

    /// Returns the scope granularity of this category.
    #[must_use]
    pub const fn scope_level(self) -> ScopeLevel {
        match self {
            Self::Schemas
            | Self::Udfs
            | Self::Charsets
            | Self::Collations
            | Self::Variables
            | Self::Engines
            | Self::Tablespaces
            | Self::LogfileGroups => ScopeLevel::Unscoped,
            Self::Tables | Self::Views | Self::Functions | Self::Procedures | Self::Events => {
                ScopeLevel::Schema
            }
            Self::Columns | Self::Triggers => ScopeLevel::Table,
        }
    }
}

impl fmt::Display for ObjectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}
