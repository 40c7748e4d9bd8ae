//! ERD pipeline: introspect under one session lease, then render.

use super::render::{DiagramDocument, render};
use crate::config::DEFAULT_INTROSPECTION_CONCURRENCY;
use crate::db::registry::SessionLease;
use crate::db::relationships::{not_applicable_reason, relationships_for_tables};
use crate::error::{EngineError, EngineResult};
use crate::models::{EngineKind, TableDescriptor};
use futures_util::{FutureExt, StreamExt, TryStreamExt, stream};
use schemars::JsonSchema;
use serde::Serialize;
use std::time::Instant;
use tracing::info;

/// Result of an ERD request.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ErdOutcome {
    Rendered {
        diagram: DiagramDocument,
        table_count: usize,
        relationship_count: usize,
    },
    /// Expected for engines without declared foreign keys.
    NotApplicable { engine: EngineKind, reason: String },
}

/// Builds diagrams with bounded, order-preserving introspection fan-out.
#[derive(Debug, Clone, Copy)]
pub struct ErdBuilder {
    concurrency: usize,
}

impl Default for ErdBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_INTROSPECTION_CONCURRENCY)
    }
}

impl ErdBuilder {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Describe every table of `database`, collect its foreign keys and render.
    ///
    /// The document engine short-circuits to `NotApplicable` without issuing
    /// any query.
    pub async fn build(
        self,
        lease: &SessionLease,
        database: Option<&str>,
    ) -> EngineResult<ErdOutcome> {
        if !lease.engine().is_relational() {
            return Ok(ErdOutcome::NotApplicable {
                engine: lease.engine(),
                reason: not_applicable_reason(lease.engine()),
            });
        }

        let start = Instant::now();
        let summaries = lease.list_tables(database).await?;
        let names: Vec<String> = summaries.iter().map(|t| t.name.clone()).collect();

        let concurrency = self.concurrency;
        let owned_lease = lease.clone();
        let owned_database = database.map(str::to_string);
        let tables: Vec<TableDescriptor> = stream::iter(summaries)
            .map(move |summary| {
                let lease = owned_lease.clone();
                let database = owned_database.clone();
                async move {
                    let columns = lease
                        .describe_table(database.as_deref(), &summary.name)
                        .await?;
                    Ok::<_, EngineError>(
                        TableDescriptor::new(summary.name, columns)
                            .with_row_count(summary.approximate_row_count),
                    )
                }
                .boxed()
            })
            .buffered(concurrency)
            .try_collect()
            .await?;

        let relationships = relationships_for_tables(lease, database, &names, concurrency).await?;
        let diagram = render(&tables, &relationships);

        info!(
            session_id = %lease.id(),
            database = ?database,
            tables = tables.len(),
            relationships = relationships.len(),
            collisions = diagram.diagnostics.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Generated ERD"
        );

        Ok(ErdOutcome::Rendered {
            table_count: tables.len(),
            relationship_count: relationships.len(),
            diagram,
        })
    }
}
