//! Identifier validation for generated SQL.
//!
//! Metadata queries bind table and schema names as parameters. The few
//! statements that must interpolate a name (`USE`, table previews) go through
//! [`validate_identifier`] first.

use crate::error::{EngineError, EngineResult};

/// Maximum identifier length accepted (MySQL and PostgreSQL both cap at 64/63).
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Check an identifier against the `[A-Za-z0-9_]+` allow-list.
pub fn validate_identifier(name: &str) -> EngineResult<&str> {
    let valid = !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LEN
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');

    if valid {
        Ok(name)
    } else {
        Err(EngineError::invalid_identifier(name))
    }
}

/// Validate and wrap an identifier in MySQL backticks.
pub fn quote_mysql(name: &str) -> EngineResult<String> {
    validate_identifier(name).map(|n| format!("`{}`", n))
}

/// Validate and wrap an identifier in PostgreSQL double quotes.
pub fn quote_postgres(name: &str) -> EngineResult<String> {
    validate_identifier(name).map(|n| format!("\"{}\"", n))
}
