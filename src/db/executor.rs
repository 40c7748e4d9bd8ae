//! Statement execution shared by the relational adapters.
//!
//! Statements run through `Executor::fetch_many`, so a payload containing
//! several statements (an imported script) yields interleaved result sets and
//! completion counts. [`drain`] folds that stream into a [`QueryResult`]:
//! - rows are capped at the row limit (the stream is dropped at limit + 1)
//! - affected-row counts are summed
//! - the whole drain runs under the query timeout

use crate::db::rows::RowToJson;
use crate::error::{EngineError, EngineResult};
use crate::models::QueryResult;
use futures_util::{Stream, TryStreamExt};
use sqlx::Either;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Limits applied to a single execution.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionLimits {
    pub row_limit: usize,
    pub query_timeout: Duration,
}

impl ExecutionLimits {
    pub fn new(row_limit: usize, query_timeout: Duration) -> Self {
        Self {
            row_limit: row_limit.max(1),
            query_timeout,
        }
    }

    /// Same timeout, tighter row cap (never looser than the configured limit).
    pub fn with_row_cap(self, cap: usize) -> Self {
        Self::new(cap.min(self.row_limit), self.query_timeout)
    }
}

/// Run a metadata query under the query timeout.
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, fut: F) -> EngineResult<T>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result.map_err(EngineError::from),
        Err(_) => Err(EngineError::timeout(operation, limit.as_secs())),
    }
}

/// Drain a `fetch_many` stream whose completion items were mapped to their
/// affected-row count with `map_left`.
pub async fn drain<R, S>(stream: S, limits: ExecutionLimits) -> EngineResult<QueryResult>
where
    R: RowToJson,
    S: Stream<Item = Result<Either<u64, R>, sqlx::Error>>,
{
    let start = Instant::now();

    let collect = async {
        let mut stream = std::pin::pin!(stream);
        let mut rows = Vec::new();
        let mut rows_affected: Option<u64> = None;
        let mut truncated = false;

        while let Some(item) = stream.try_next().await? {
            match item {
                Either::Left(affected) => {
                    *rows_affected.get_or_insert(0) += affected;
                }
                Either::Right(row) => {
                    if rows.len() >= limits.row_limit {
                        truncated = true;
                        break;
                    }
                    rows.push(row.to_json_map());
                }
            }
        }
        Ok::<_, EngineError>((rows, rows_affected, truncated))
    };

    let (rows, rows_affected, truncated) = match timeout(limits.query_timeout, collect).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(EngineError::timeout(
                "query execution",
                limits.query_timeout.as_secs(),
            ));
        }
    };

    if truncated {
        warn!(limit = limits.row_limit, "Query result truncated");
    }

    // A pure SELECT reports a zero count for its result set; only surface the
    // count when the statement produced no rows or actually changed something.
    let rows_affected = rows_affected.filter(|n| *n > 0 || rows.is_empty());
    let execution_time_ms = start.elapsed().as_millis() as u64;
    debug!(
        rows = rows.len(),
        rows_affected = ?rows_affected,
        execution_time_ms,
        "Statement completed"
    );

    Ok(QueryResult::new(rows)
        .with_rows_affected(rows_affected)
        .with_truncated(truncated)
        .with_execution_time(execution_time_ms))
}
