//! Foreign-key extraction across a whole database.

use crate::db::registry::SessionLease;
use crate::error::EngineResult;
use crate::models::{EngineKind, Relationship};
use futures_util::{FutureExt, StreamExt, TryStreamExt, stream};
use std::collections::HashSet;
use tracing::debug;

/// Outcome of relationship extraction.
///
/// `NotApplicable` is an expected result for engines without declared foreign
/// keys, not a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationshipSet {
    Extracted(Vec<Relationship>),
    NotApplicable { engine: EngineKind, reason: String },
}

impl RelationshipSet {
    pub fn not_applicable(engine: EngineKind) -> Self {
        Self::NotApplicable {
            engine,
            reason: not_applicable_reason(engine),
        }
    }
}

pub fn not_applicable_reason(engine: EngineKind) -> String {
    format!(
        "{} collections do not declare foreign keys; relationships cannot be extracted",
        engine
    )
}

/// List every table of `database` and collect its foreign keys.
pub async fn extract_relationships(
    lease: &SessionLease,
    database: Option<&str>,
    concurrency: usize,
) -> EngineResult<RelationshipSet> {
    if !lease.engine().is_relational() {
        return Ok(RelationshipSet::not_applicable(lease.engine()));
    }

    let tables: Vec<String> = lease
        .list_tables(database)
        .await?
        .into_iter()
        .map(|t| t.name)
        .collect();
    let relationships = relationships_for_tables(lease, database, &tables, concurrency).await?;
    Ok(RelationshipSet::Extracted(relationships))
}

/// One foreign-key query per table, at most `concurrency` in flight.
///
/// Results keep table order; exact duplicates are dropped. Each per-table
/// future owns its inputs, so the stream borrows nothing from the caller.
pub async fn relationships_for_tables(
    lease: &SessionLease,
    database: Option<&str>,
    tables: &[String],
    concurrency: usize,
) -> EngineResult<Vec<Relationship>> {
    let owned_lease = lease.clone();
    let owned_database = database.map(str::to_string);
    let per_table: Vec<Vec<Relationship>> = stream::iter(tables.to_vec())
        .map(move |table| {
            let lease = owned_lease.clone();
            let database = owned_database.clone();
            async move {
                lease
                    .table_relationships(database.as_deref(), &table)
                    .await
            }
            .boxed()
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    let mut seen = HashSet::new();
    let relationships: Vec<Relationship> = per_table
        .into_iter()
        .flatten()
        .filter(|rel| seen.insert(rel.clone()))
        .collect();

    debug!(
        tables = tables.len(),
        relationships = relationships.len(),
        "Extracted relationships"
    );
    Ok(relationships)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_applicable_names_engine() {
        match RelationshipSet::not_applicable(EngineKind::MongoDb) {
            RelationshipSet::NotApplicable { engine, reason } => {
                assert_eq!(engine, EngineKind::MongoDb);
                assert!(reason.contains("MongoDB"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
