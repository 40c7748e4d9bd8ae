//! Mermaid `erDiagram` serializer.
//!
//! A pure function of its input: no I/O, byte-identical output for identical
//! tables and relationships.

use super::sanitize::sanitize;
use crate::db::normalize::simplify_type;
use crate::models::{Relationship, TableDescriptor};
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt::Write;

/// Document emitted for a database without tables.
pub const EMPTY_DIAGRAM: &str = "erDiagram\n    NO_TABLES {\n        string message\n    }\n";

/// Connector for every edge, whatever the column-level cardinality.
pub const EDGE_CONNECTOR: &str = "||--o{";

pub const EDGE_LABEL: &str = "references";

const BLOCK_INDENT: &str = "    ";
const FIELD_INDENT: &str = "        ";

/// Two distinct identifiers that sanitize to the same token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct SanitizationCollision {
    /// Owning table for column collisions; absent for table names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub sanitized: String,
    pub first: String,
    pub second: String,
}

impl std::fmt::Display for SanitizationCollision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.table {
            Some(table) => write!(
                f,
                "columns '{}' and '{}' of table '{}' both render as '{}'",
                self.first, self.second, table, self.sanitized
            ),
            None => write!(
                f,
                "tables '{}' and '{}' both render as '{}'",
                self.first, self.second, self.sanitized
            ),
        }
    }
}

/// Rendered diagram plus anything the reader should know about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct DiagramDocument {
    /// Mermaid source text
    pub source: String,
    /// Identifier collisions found while sanitizing; rendering still completes
    pub diagnostics: Vec<SanitizationCollision>,
}

impl DiagramDocument {
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

impl std::fmt::Display for DiagramDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Remembers which source identifier claimed each sanitized token.
struct CollisionTracker<'a> {
    table: Option<&'a str>,
    claimed: HashMap<String, &'a str>,
}

impl<'a> CollisionTracker<'a> {
    fn new(table: Option<&'a str>) -> Self {
        Self {
            table,
            claimed: HashMap::new(),
        }
    }

    fn claim(
        &mut self,
        source: &'a str,
        diagnostics: &mut Vec<SanitizationCollision>,
    ) -> String {
        let token = sanitize(source);
        match self.claimed.get(token.as_str()) {
            Some(first) if *first != source => diagnostics.push(SanitizationCollision {
                table: self.table.map(str::to_string),
                sanitized: token.clone(),
                first: first.to_string(),
                second: source.to_string(),
            }),
            Some(_) => {}
            None => {
                self.claimed.insert(token.clone(), source);
            }
        }
        token
    }
}

/// Render tables and relationships as a Mermaid entity-relationship diagram.
///
/// Tables and columns keep input order. Relationships collapse to one edge per
/// sanitized (from, to) table pair, in first-seen order.
pub fn render(tables: &[TableDescriptor], relationships: &[Relationship]) -> DiagramDocument {
    if tables.is_empty() {
        return DiagramDocument {
            source: EMPTY_DIAGRAM.to_string(),
            diagnostics: Vec::new(),
        };
    }

    let mut source = String::from("erDiagram\n");
    let mut diagnostics = Vec::new();
    let mut table_names = CollisionTracker::new(None);

    for table in tables {
        let name = table_names.claim(&table.name, &mut diagnostics);
        let _ = writeln!(source, "{}{} {{", BLOCK_INDENT, name);

        let mut columns = CollisionTracker::new(Some(table.name.as_str()));
        for column in &table.columns {
            let column_name = columns.claim(&column.name, &mut diagnostics);
            let _ = writeln!(
                source,
                "{}{} {}",
                FIELD_INDENT,
                sanitize(&simplify_type(&column.declared_type)),
                column_name
            );
        }
        let _ = writeln!(source, "{}}}", BLOCK_INDENT);
    }

    let mut edges = HashSet::new();
    for rel in relationships {
        let from = sanitize(&rel.from_table);
        let to = sanitize(&rel.to_table);
        if edges.insert((from.clone(), to.clone())) {
            let _ = writeln!(
                source,
                "{}{} {} {} : \"{}\"",
                BLOCK_INDENT, from, EDGE_CONNECTOR, to, EDGE_LABEL
            );
        }
    }

    DiagramDocument {
        source,
        diagnostics,
    }
}
