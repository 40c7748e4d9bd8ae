//! Query execution tool.
//!
//! This module implements the `execute` tool. The payload is untrusted and
//! runs verbatim: a SQL string for MySQL/PostgreSQL, an operation descriptor
//! for MongoDB. Payloads produced by a language model get no special trust.

use crate::db::ConnectionRegistry;
use crate::error::EngineResult;
use crate::models::{QueryResult, SessionId};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

/// Input for the execute tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteInput {
    /// SQL string (MySQL/PostgreSQL) or a document operation such as
    /// {"collection": "users", "operation": "find", "filter": {"age": {"$gt": 30}}}.
    /// MongoDB operations: find, aggregate, insertOne.
    #[serde(alias = "sql")]
    pub query: JsonValue,
    /// Database to run against. Defaults to the session's database.
    #[serde(default)]
    pub database: Option<String>,
    /// Session id from connect. If set, the call fails when the gateway has
    /// since been reconnected instead of running against the new session.
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ExecuteInput {
    pub fn expected_session(&self) -> EngineResult<Option<SessionId>> {
        self.session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .transpose()
    }
}

/// Output from the execute tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExecuteOutput {
    /// Session the statement ran against
    pub session_id: SessionId,
    #[serde(flatten)]
    pub result: QueryResult,
}

pub struct QueryToolHandler {
    registry: Arc<ConnectionRegistry>,
}

impl QueryToolHandler {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub async fn execute(&self, input: ExecuteInput) -> EngineResult<ExecuteOutput> {
        let expected = input.expected_session()?;
        let lease = self.registry.lease(expected).await?;
        let result = lease.execute(input.query, input.database.as_deref()).await?;

        info!(
            session_id = %lease.id(),
            rows = result.row_count,
            rows_affected = ?result.rows_affected,
            truncated = result.truncated,
            execution_time_ms = result.execution_time_ms,
            "Query executed"
        );

        Ok(ExecuteOutput {
            session_id: lease.id(),
            result,
        })
    }
}
