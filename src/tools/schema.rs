//! Schema introspection tools.
//!
//! This module implements the `list_databases`, `list_tables`,
//! `describe_table` and `preview_table` tools.

use crate::db::ConnectionRegistry;
use crate::error::EngineResult;
use crate::models::{ColumnDescriptor, EngineKind, QueryResult, TableSummary};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Output for the list_databases tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListDatabasesOutput {
    pub databases: Vec<String>,
    pub count: usize,
}

/// Input for the list_tables tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Database to list. Defaults to the session's database.
    #[serde(default)]
    pub database: Option<String>,
}

/// Output from the list_tables tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTablesOutput {
    /// Tables (MySQL, PostgreSQL) or collections (MongoDB)
    pub tables: Vec<TableSummary>,
    pub count: usize,
}

/// Input for the describe_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    /// Name of the table or collection to describe
    #[serde(alias = "table_name")]
    pub table: String,
    #[serde(default)]
    pub database: Option<String>,
}

/// Output from the describe_table tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DescribeTableOutput {
    pub table: String,
    pub columns: Vec<ColumnDescriptor>,
    /// Column names that form the primary key
    pub primary_key: Vec<String>,
    /// Set for MongoDB: columns come from one sampled document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Input for the preview_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PreviewTableInput {
    #[serde(alias = "table_name")]
    pub table: String,
    #[serde(default)]
    pub database: Option<String>,
    /// Rows to return (default 100, capped by the row limit)
    #[serde(default)]
    pub limit: Option<usize>,
}

pub struct SchemaToolHandler {
    registry: Arc<ConnectionRegistry>,
}

impl SchemaToolHandler {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub async fn list_databases(&self) -> EngineResult<ListDatabasesOutput> {
        let databases = self.registry.list_databases().await?;
        let count = databases.len();
        info!(count, "Listed databases");
        Ok(ListDatabasesOutput { databases, count })
    }

    pub async fn list_tables(&self, input: ListTablesInput) -> EngineResult<ListTablesOutput> {
        let tables = self.registry.list_tables(input.database.as_deref()).await?;
        let count = tables.len();
        info!(database = ?input.database, count, "Listed tables");
        Ok(ListTablesOutput { tables, count })
    }

    pub async fn describe_table(
        &self,
        input: DescribeTableInput,
    ) -> EngineResult<DescribeTableOutput> {
        let lease = self.registry.lease(None).await?;
        let columns = lease
            .describe_table(input.database.as_deref(), &input.table)
            .await?;

        info!(
            table = %input.table,
            columns = columns.len(),
            "Described table"
        );

        let note = (lease.engine() == EngineKind::MongoDb).then(|| {
            "Inferred from one sampled document; other documents may have different fields"
                .to_string()
        });

        Ok(DescribeTableOutput {
            primary_key: columns
                .iter()
                .filter(|c| c.is_primary_key)
                .map(|c| c.name.clone())
                .collect(),
            table: input.table,
            columns,
            note,
        })
    }

    pub async fn preview_table(&self, input: PreviewTableInput) -> EngineResult<QueryResult> {
        let result = self
            .registry
            .preview_table(input.database.as_deref(), &input.table, input.limit)
            .await?;
        info!(
            table = %input.table,
            rows = result.row_count,
            truncated = result.truncated,
            "Previewed table"
        );
        Ok(result)
    }
}
