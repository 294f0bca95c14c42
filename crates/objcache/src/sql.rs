// crates/objcache/src/sql.rs
// ============================================================================
// Module: Metadata Statement Quoting
// Description: Quoting helpers for statements sent to the live server.
// Purpose: Embed schema and table names safely in metadata statements.
// Dependencies: objcache-store-sqlite
// ============================================================================

//! ## Overview
//! Metadata statements (`SHOW ...`) cannot take bound parameters, so names
//! are embedded as text. Identifiers are backtick-quoted with embedded
//! backticks doubled; literals are single-quoted with backslashes and
//! quotes escaped. Patterns passed to `LIKE` are first escaped so they match
//! literally.

// ============================================================================
// SECTION: Imports
// ============================================================================

use objcache_store_sqlite::escape_like;

// ============================================================================
// SECTION: Quoting
// ============================================================================

/// Quotes an identifier with backticks.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quotes a string literal with single quotes.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\0' => quoted.push_str("\\0"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            _ => quoted.push(ch),
        }
    }
    quoted.push('\'');
    quoted
}

/// Quotes a literal `LIKE` pattern that matches `value` exactly.
#[must_use]
pub fn quote_like_exact(value: &str) -> String {
    quote_literal(&escape_like(value))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
