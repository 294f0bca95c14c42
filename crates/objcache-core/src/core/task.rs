// crates/objcache-core/src/core/task.rs
// ============================================================================
// Module: Refresh Tasks
// Description: Units of pending background refresh work.
// Purpose: Describe one category refresh with exactly the scope it needs.
// Dependencies: crate::core::category, serde
// ============================================================================

//! ## Overview
//! A [`RefreshTask`] names one category refresh and carries only the scope
//! fields that kind of refresh uses. Queue deduplication relies on
//! [`RefreshTask::is_equivalent`], which compares tasks of the same kind at
//! that kind's scope granularity.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::category::ObjectCategory;

// ============================================================================
// SECTION: Refresh Task
// ============================================================================

/// One pending unit of background refresh work.
///
/// # Invariants
/// - Schema-scoped variants carry the schema they refresh.
/// - Table-scoped variants carry the schema and owning table; an empty
///   `table` on [`RefreshTask::Triggers`] means "every table of the schema".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefreshTask {
    /// Refresh the schema list.
    Schemas,
    /// Refresh system variable names.
    Variables,
    /// Refresh storage engine names.
    Engines,
    /// Refresh user-defined function names.
    Udfs,
    /// Refresh character set names.
    Charsets,
    /// Refresh collation names.
    Collations,
    /// Refresh tablespace names.
    Tablespaces,
    /// Refresh logfile group names.
    LogfileGroups,
    /// Refresh the base tables of a schema.
    Tables {
        /// Target schema.
        schema: String,
    },
    /// Refresh the views of a schema.
    Views {
        /// Target schema.
        schema: String,
    },
    /// Refresh the stored procedures of a schema.
    Procedures {
        /// Target schema.
        schema: String,
    },
    /// Refresh the stored functions of a schema.
    Functions {
        /// Target schema.
        schema: String,
    },
    /// Refresh the events of a schema.
    Events {
        /// Target schema.
        schema: String,
    },
    /// Refresh the columns of a table or view.
    Columns {
        /// Owning schema.
        schema: String,
        /// Owning table or view.
        table: String,
    },
    /// Refresh the triggers of a table.
    Triggers {
        /// Owning schema.
        schema: String,
        /// Owning table.
        table: String,
    },
}

impl RefreshTask {
    /// Returns the category this task refreshes.
    #[must_use]
    pub const fn category(&self) -> ObjectCategory {
        match self {
            Self::Schemas => ObjectCategory::Schemas,
            Self::Variables => ObjectCategory::Variables,
            Self::Engines => ObjectCategory::Engines,
            Self::Udfs => ObjectCategory::Udfs,
            Self::Charsets => ObjectCategory::Charsets,
            Self::Collations => ObjectCategory::Collations,
            Self::Tablespaces => ObjectCategory::Tablespaces,
            Self::LogfileGroups => ObjectCategory::LogfileGroups,
            Self::Tables {
                ..
            } => ObjectCategory::Tables,
            Self::Views {
                ..
            } => ObjectCategory::Views,
            Self::Procedures {
                ..
            } => ObjectCategory::Procedures,
            Self::Functions {
                ..
            } => ObjectCategory::Functions,
            Self::Events {
                ..
            } => ObjectCategory::Events,
            Self::Columns {
                ..
            } => ObjectCategory::Columns,
            Self::Triggers {
                ..
            } => ObjectCategory::Triggers,
        }
    }

    /// Returns the schema this task is scoped to, if any.
    #[must_use]
    pub fn schema(&self) -> Option<&str> {
        match self {
            Self::Tables {
                schema,
            }
            | Self::Views {
                schema,
            }
            | Self::Procedures {
                schema,
            }
            | Self::Functions {
                schema,
            }
            | Self::Events {
                schema,
            }
            | Self::Columns {
                schema, ..
            }
            | Self::Triggers {
                schema, ..
            } => Some(schema),
            _ => None,
        }
    }

    /// Returns true when `other` describes the same refresh at this kind's
    /// scope granularity, so queueing both would duplicate work.
    #[must_use]
    pub fn is_equivalent(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Schemas, Self::Schemas)
            | (Self::Variables, Self::Variables)
            | (Self::Engines, Self::Engines)
            | (Self::Udfs, Self::Udfs)
            | (Self::Charsets, Self::Charsets)
            | (Self::Collations, Self::Collations)
            | (Self::Tablespaces, Self::Tablespaces)
            | (Self::LogfileGroups, Self::LogfileGroups) => true,
            (
                Self::Tables {
                    schema: left,
                },
                Self::Tables {
                    schema: right,
                },
            )
            | (
                Self::Views {
                    schema: left,
                },
                Self::Views {
                    schema: right,
                },
            )
            | (
                Self::Procedures {
                    schema: left,
                },
                Self::Procedures {
                    schema: right,
                },
            )
            | (
                Self::Functions {
                    schema: left,
                },
                Self::Functions {
                    schema: right,
                },
            )
            | (
                Self::Events {
                    schema: left,
                },
                Self::Events {
                    schema: right,
                },
            ) => left == right,
            (
                Self::Columns {
                    schema: left_schema,
                    table: left_table,
                },
                Self::Columns {
                    schema: right_schema,
                    table: right_table,
                },
            )
            | (
                Self::Triggers {
                    schema: left_schema,
                    table: left_table,
                },
                Self::Triggers {
                    schema: right_schema,
                    table: right_table,
                },
            ) => left_schema == right_schema && left_table == right_table,
            _ => false,
        }
    }
}

impl fmt::Display for RefreshTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Columns {
                schema,
                table,
            }
            | Self::Triggers {
                schema,
                table,
            } => write!(f, "{}({schema}.{table})", self.category()),
            _ => match self.schema() {
                Some(schema) => write!(f, "{}({schema})", self.category()),
                None => write!(f, "{}", self.category()),
            },
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
