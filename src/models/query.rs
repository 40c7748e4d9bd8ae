//! Query-related data models.
//!
//! A [`QueryPayload`] is what `execute` receives: a verbatim SQL string for the
//! relational engines, or a structured [`DocumentOperation`] for MongoDB.
//! Payloads are untrusted regardless of where they came from (a user, an
//! imported script or a language model) and get no special treatment.

use crate::error::{EngineError, EngineResult};
use crate::models::EngineKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Default maximum number of rows returned by a single execute.
pub const DEFAULT_ROW_LIMIT: usize = 1000;

/// Maximum allowed row limit.
pub const MAX_ROW_LIMIT: usize = 10000;

/// Default number of rows returned by a table preview.
pub const DEFAULT_PREVIEW_LIMIT: usize = 100;

/// The fixed set of document-engine operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum DocumentOperationKind {
    #[serde(rename = "find")]
    Find,
    #[serde(rename = "aggregate")]
    Aggregate,
    #[serde(rename = "insertOne")]
    InsertOne,
}

impl DocumentOperationKind {
    /// Parse an operation name. Names are matched exactly; anything outside
    /// the fixed set is rejected rather than mapped to a neighbour.
    pub fn parse(name: &str) -> EngineResult<Self> {
        match name {
            "find" => Ok(Self::Find),
            "aggregate" => Ok(Self::Aggregate),
            "insertOne" => Ok(Self::InsertOne),
            other => Err(EngineError::unsupported(
                other,
                "document operations are limited to find, aggregate and insertOne",
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Find => "find",
            Self::Aggregate => "aggregate",
            Self::InsertOne => "insertOne",
        }
    }
}

impl std::fmt::Display for DocumentOperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured operation descriptor for the document engine.
///
/// Accepted JSON shape:
///
/// ```text
/// {"collection": "users", "operation": "find", "filter": {...}, "projection": {...},
///  "sort": {...}, "limit": 10}
/// {"collection": "orders", "operation": "aggregate", "pipeline": [...]}
/// {"collection": "users", "operation": "insertOne", "document": {...}}
/// ```
///
/// Parameters may also be nested under a `params` object. `query` is accepted
/// as an alias of `filter`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentOperation {
    pub collection: String,
    pub operation: DocumentOperationKind,
    pub params: Map<String, JsonValue>,
}

impl DocumentOperation {
    /// Parse a descriptor from JSON text.
    pub fn from_text(text: &str) -> EngineResult<Self> {
        let value: JsonValue = serde_json::from_str(text.trim()).map_err(|e| {
            EngineError::invalid_input(format!(
                "Document operations must be a JSON object with 'collection' and 'operation': {}",
                e
            ))
        })?;
        Self::from_value(value)
    }

    /// Parse a descriptor from a JSON value.
    pub fn from_value(value: JsonValue) -> EngineResult<Self> {
        let JsonValue::Object(mut map) = value else {
            return Err(EngineError::invalid_input(
                "Document operations must be a JSON object with 'collection' and 'operation'",
            ));
        };

        let operation = match map.remove("operation") {
            Some(JsonValue::String(name)) => DocumentOperationKind::parse(&name)?,
            _ => {
                return Err(EngineError::invalid_input(
                    "Document operation is missing the 'operation' name",
                ));
            }
        };

        let collection = match map.remove("collection") {
            Some(JsonValue::String(name)) if !name.trim().is_empty() => name,
            _ => {
                return Err(EngineError::invalid_input(
                    "Document operation is missing the target 'collection'",
                ));
            }
        };

        let mut params = match map.remove("params") {
            Some(JsonValue::Object(nested)) => nested,
            Some(JsonValue::Null) | None => Map::new(),
            Some(_) => return Err(EngineError::invalid_input("'params' must be an object")),
        };
        params.extend(map);

        let op = Self {
            collection,
            operation,
            params,
        };
        op.validate()?;
        Ok(op)
    }

    fn validate(&self) -> EngineResult<()> {
        match self.operation {
            DocumentOperationKind::Find => {
                if let Some(filter) = self.filter() {
                    if !filter.is_object() {
                        return Err(EngineError::invalid_input("find 'filter' must be an object"));
                    }
                }
                if let Some(limit) = self.params.get("limit") {
                    if limit.as_u64().is_none() {
                        return Err(EngineError::invalid_input(
                            "find 'limit' must be a non-negative integer",
                        ));
                    }
                }
                Ok(())
            }
            DocumentOperationKind::Aggregate => match self.params.get("pipeline") {
                Some(JsonValue::Array(_)) => Ok(()),
                _ => Err(EngineError::invalid_input(
                    "aggregate requires a 'pipeline' array",
                )),
            },
            DocumentOperationKind::InsertOne => match self.params.get("document") {
                Some(JsonValue::Object(_)) => Ok(()),
                _ => Err(EngineError::invalid_input(
                    "insertOne requires a 'document' object",
                )),
            },
        }
    }

    pub fn filter(&self) -> Option<&JsonValue> {
        self.params
            .get("filter")
            .or_else(|| self.params.get("query"))
    }

    pub fn param(&self, key: &str) -> Option<&JsonValue> {
        self.params.get(key)
    }

    pub fn limit(&self) -> Option<u64> {
        self.params.get("limit").and_then(JsonValue::as_u64)
    }
}

/// Payload handed to `execute`.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPayload {
    /// Dialect-specific SQL, executed verbatim.
    Sql(String),
    Document(DocumentOperation),
}

impl QueryPayload {
    /// Interpret a raw request value for the given engine.
    ///
    /// Relational engines take a SQL string. The document engine takes either a
    /// descriptor object or a string containing one.
    pub fn for_engine(engine: EngineKind, raw: JsonValue) -> EngineResult<Self> {
        match (engine.is_relational(), raw) {
            (true, JsonValue::String(sql)) => Self::sql(sql),
            (true, _) => Err(EngineError::invalid_input(format!(
                "{} expects the query as a SQL string",
                engine
            ))),
            (false, JsonValue::String(text)) => {
                DocumentOperation::from_text(&text).map(Self::Document)
            }
            (false, value) => DocumentOperation::from_value(value).map(Self::Document),
        }
    }

    /// Interpret the full text of an imported script.
    pub fn from_script(engine: EngineKind, script: &str) -> EngineResult<Self> {
        Self::for_engine(engine, JsonValue::String(script.to_string()))
    }

    fn sql(sql: String) -> EngineResult<Self> {
        if sql.trim().is_empty() {
            return Err(EngineError::invalid_input("Query cannot be empty"));
        }
        Ok(Self::Sql(sql))
    }

    /// Short label for logging, never the payload itself.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sql(_) => "sql",
            Self::Document(op) => op.operation.as_str(),
        }
    }
}

/// Result of an execute or preview call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct QueryResult {
    /// Records in engine order, each a map from column/field name to value
    pub rows: Vec<Map<String, JsonValue>>,
    pub row_count: usize,
    /// Rows affected by write statements, when the engine reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    /// True if the row limit cut the result short
    pub truncated: bool,
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn new(rows: Vec<Map<String, JsonValue>>) -> Self {
        Self {
            row_count: rows.len(),
            rows,
            ..Default::default()
        }
    }

    pub fn with_rows_affected(mut self, rows_affected: Option<u64>) -> Self {
        self.rows_affected = rows_affected;
        self
    }

    pub fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    pub fn with_execution_time(mut self, execution_time_ms: u64) -> Self {
        self.execution_time_ms = execution_time_ms;
        self
    }
}
