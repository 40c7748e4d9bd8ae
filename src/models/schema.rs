//! Schema-related data models.
//!
//! This module defines the engine-neutral shapes produced by schema
//! introspection: tables, columns and foreign-key relationships.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Table or collection entry returned by `list_tables`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableSummary {
    pub name: String,
    /// Best-effort estimate from engine statistics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approximate_row_count: Option<u64>,
}

impl TableSummary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            approximate_row_count: None,
        }
    }

    /// Set the estimated row count.
    pub fn with_row_count(mut self, row_count: u64) -> Self {
        self.approximate_row_count = Some(row_count);
        self
    }
}

/// Normalized column description.
///
/// `declared_type` is a lossy simplification used for display and diagrams;
/// `raw_type` keeps the engine's full type string for structural views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDescriptor {
    pub name: String,
    pub declared_type: String,
    pub raw_type: String,
    pub nullable: bool,
    #[serde(default)]
    pub is_primary_key: bool,
}

impl ColumnDescriptor {
    /// Create a column whose simplified and raw types are identical.
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>, nullable: bool) -> Self {
        let declared_type = declared_type.into();
        Self {
            name: name.into(),
            raw_type: declared_type.clone(),
            declared_type,
            nullable,
            is_primary_key: false,
        }
    }

    pub fn with_raw_type(mut self, raw_type: impl Into<String>) -> Self {
        self.raw_type = raw_type.into();
        self
    }

    pub fn with_primary_key(mut self, is_pk: bool) -> Self {
        self.is_primary_key = is_pk;
        self
    }
}

/// A table with its ordered columns, as fed to the diagram serializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approximate_row_count: Option<u64>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.into(),
            columns,
            approximate_row_count: None,
        }
    }

    pub fn with_row_count(mut self, row_count: Option<u64>) -> Self {
        self.approximate_row_count = row_count;
        self
    }
}

/// One column-level foreign key edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Relationship {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

impl Relationship {
    pub fn new(
        from_table: impl Into<String>,
        from_column: impl Into<String>,
        to_table: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        Self {
            from_table: from_table.into(),
            from_column: from_column.into(),
            to_table: to_table.into(),
            to_column: to_column.into(),
        }
    }
}
