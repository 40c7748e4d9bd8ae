//! MongoDB adapter.
//!
//! Holds a single driver `Client` (the driver pools internally). Collections
//! stand in for tables; describing one samples a single document.

use crate::config::AdapterSettings;
use crate::db::adapter::{EngineAdapter, connection_error};
use crate::db::normalize::infer_document_columns;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    ColumnDescriptor, DocumentOperation, DocumentOperationKind, EngineConfig, EngineKind,
    QueryPayload, QueryResult, TableSummary,
};
use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures_util::TryStreamExt;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Cursor};
use serde_json::{Map, Value as JsonValue};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// MongoDB engine adapter.
pub struct MongoAdapter {
    settings: AdapterSettings,
    client: Option<Client>,
    default_database: Option<String>,
    server_version: Option<String>,
    closed: AtomicBool,
}

impl MongoAdapter {
    pub fn new(settings: AdapterSettings) -> Self {
        Self {
            settings,
            client: None,
            default_database: None,
            server_version: None,
            closed: AtomicBool::new(false),
        }
    }

    fn client(&self) -> EngineResult<&Client> {
        match &self.client {
            Some(client) if !self.closed.load(Ordering::Acquire) => Ok(client),
            _ => Err(EngineError::NotConnected),
        }
    }

    /// Database for this call: the argument, else the session default.
    fn target<'a>(&'a self, database: Option<&'a str>) -> EngineResult<&'a str> {
        database
            .map(str::trim)
            .filter(|db| !db.is_empty())
            .or(self.default_database.as_deref())
            .ok_or_else(|| {
                EngineError::invalid_input(
                    "No database selected: pass a database name or connect with one",
                )
            })
    }

    fn collection(&self, database: Option<&str>, name: &str) -> EngineResult<Collection<Document>> {
        let client = self.client()?;
        let database = self.target(database)?;
        Ok(client.database(database).collection::<Document>(name))
    }

    /// Run a driver call under the query timeout.
    async fn bounded<T, F>(&self, operation: &str, fut: F) -> EngineResult<T>
    where
        F: Future<Output = mongodb::error::Result<T>>,
    {
        let limit = self.settings.query_timeout;
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => Err(EngineError::timeout(operation, limit.as_secs())),
        }
    }

    async fn run_find(
        &self,
        collection: Collection<Document>,
        op: &DocumentOperation,
    ) -> EngineResult<QueryResult> {
        let cap = find_cap(op.limit(), self.settings.row_limit);

        let filter = match op.filter() {
            Some(value) => to_document(value, "filter")?,
            None => Document::new(),
        };

        let mut find = collection.find(filter).limit(cap as i64 + 1);
        if let Some(projection) = op.param("projection") {
            find = find.projection(to_document(projection, "projection")?);
        }
        if let Some(sort) = op.param("sort") {
            find = find.sort(to_document(sort, "sort")?);
        }

        let cursor = self.bounded("find", async { find.await }).await?;
        self.drain_cursor(cursor, cap).await
    }

    async fn run_aggregate(
        &self,
        collection: Collection<Document>,
        op: &DocumentOperation,
    ) -> EngineResult<QueryResult> {
        let stages = match op.param("pipeline") {
            Some(JsonValue::Array(stages)) => stages
                .iter()
                .map(|stage| to_document(stage, "pipeline stage"))
                .collect::<EngineResult<Vec<_>>>()?,
            _ => {
                return Err(EngineError::invalid_input(
                    "aggregate requires a 'pipeline' array",
                ));
            }
        };

        let cursor = self
            .bounded("aggregate", async { collection.aggregate(stages).await })
            .await?;
        self.drain_cursor(cursor, self.settings.row_limit).await
    }

    async fn run_insert_one(
        &self,
        collection: Collection<Document>,
        op: &DocumentOperation,
    ) -> EngineResult<QueryResult> {
        let document = match op.param("document") {
            Some(value) => to_document(value, "document")?,
            None => {
                return Err(EngineError::invalid_input(
                    "insertOne requires a 'document' object",
                ));
            }
        };

        let inserted = self
            .bounded("insertOne", async { collection.insert_one(document).await })
            .await?;

        let mut row = Map::new();
        row.insert(
            "insertedId".to_string(),
            inserted.inserted_id.into_relaxed_extjson(),
        );
        Ok(QueryResult::new(vec![row]).with_rows_affected(Some(1)))
    }

    /// Collect up to `cap` documents; a further document marks truncation.
    async fn drain_cursor(
        &self,
        mut cursor: Cursor<Document>,
        cap: usize,
    ) -> EngineResult<QueryResult> {
        let collect = async {
            let mut rows = Vec::new();
            let mut truncated = false;
            while let Some(document) = cursor.try_next().await? {
                if rows.len() >= cap {
                    truncated = true;
                    break;
                }
                rows.push(document_to_row(document));
            }
            Ok::<_, mongodb::error::Error>((rows, truncated))
        };

        let (rows, truncated) = self.bounded("read cursor", collect).await?;
        if truncated {
            warn!(limit = cap, "Query result truncated");
        }
        Ok(QueryResult::new(rows).with_truncated(truncated))
    }
}

/// Documents to return for a find: a missing or zero limit means the row limit.
fn find_cap(limit: Option<u64>, row_limit: usize) -> usize {
    let cap = match limit {
        Some(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX).min(row_limit),
        _ => row_limit,
    };
    cap.max(1)
}

/// Best-effort row count, `None` on failure or once `deadline` has passed.
async fn count_before<F>(
    deadline: tokio::time::Instant,
    collection: &str,
    count: F,
) -> Option<u64>
where
    F: Future<Output = mongodb::error::Result<u64>>,
{
    match tokio::time::timeout_at(deadline, count).await {
        Ok(Ok(count)) => Some(count),
        Ok(Err(e)) => {
            debug!(collection = %collection, error = %e, "Row count unavailable");
            None
        }
        Err(_) => {
            debug!(collection = %collection, "Row count timed out");
            None
        }
    }
}

/// Convert a JSON object into a BSON document (extended JSON is honored).
fn to_document(value: &JsonValue, what: &str) -> EngineResult<Document> {
    match Bson::try_from(value.clone()) {
        Ok(Bson::Document(document)) => Ok(document),
        Ok(_) => Err(EngineError::invalid_input(format!(
            "'{}' must be a JSON object",
            what
        ))),
        Err(e) => Err(EngineError::invalid_input(format!(
            "Invalid '{}': {}",
            what, e
        ))),
    }
}

fn document_to_row(document: Document) -> Map<String, JsonValue> {
    document
        .into_iter()
        .map(|(key, value)| (key, value.into_relaxed_extjson()))
        .collect()
}

#[async_trait]
impl EngineAdapter for MongoAdapter {
    fn kind(&self) -> EngineKind {
        EngineKind::MongoDb
    }

    async fn connect(&mut self, config: &EngineConfig) -> EngineResult<()> {
        self.close().await;
        self.client = None;

        info!(target_url = %config.masked_connection_url(), "Connecting to MongoDB");
        let url = config.connection_url()?;
        let mut options = ClientOptions::parse(&url)
            .await
            .map_err(|e| connection_error(EngineKind::MongoDb, e))?;

        let pool = &self.settings.pool;
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
        options.connect_timeout = Some(self.settings.connect_timeout);
        options.server_selection_timeout = Some(self.settings.connect_timeout);
        options.max_pool_size = Some(pool.max_connections_or_default());
        options.min_pool_size = Some(pool.min_connections_or_default());
        options.max_idle_time = Some(Duration::from_secs(pool.idle_timeout_or_default()));

        let default_database = config
            .default_database()
            .map(str::to_string)
            .or_else(|| options.default_database.clone());

        let client = Client::with_options(options)
            .map_err(|e| connection_error(EngineKind::MongoDb, e))?;

        let admin = client.database("admin");
        if let Err(e) = admin.run_command(doc! { "ping": 1 }).await {
            client.shutdown().await;
            return Err(connection_error(EngineKind::MongoDb, e));
        }

        let version = match admin.run_command(doc! { "buildInfo": 1 }).await {
            Ok(info) => info.get_str("version").ok().map(str::to_string),
            Err(e) => {
                debug!(error = %e, "buildInfo unavailable");
                None
            }
        };

        debug!(version = ?version, database = ?default_database, "Connected to MongoDB");
        self.server_version = version;
        self.default_database = default_database;
        self.client = Some(client);
        self.closed.store(false, Ordering::Release);
        Ok(())
    }

    fn server_version(&self) -> Option<String> {
        self.server_version.clone()
    }

    async fn list_databases(&self) -> EngineResult<Vec<String>> {
        let client = self.client()?;
        let mut names = self
            .bounded("list databases", async { client.list_database_names().await })
            .await?;
        names.sort();
        Ok(names)
    }

    async fn list_tables(&self, database: Option<&str>) -> EngineResult<Vec<TableSummary>> {
        let client = self.client()?;
        let db = client.database(self.target(database)?);
        let mut names = self
            .bounded("list collections", async { db.list_collection_names().await })
            .await?;
        names.sort();

        // one deadline shared by all counts
        let deadline = tokio::time::Instant::now() + self.settings.query_timeout;
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let collection = db.collection::<Document>(&name);
            let count = count_before(deadline, &name, async {
                collection.estimated_document_count().await
            })
            .await;
            tables.push(match count {
                Some(count) => TableSummary::new(name).with_row_count(count),
                None => TableSummary::new(name),
            });
        }
        Ok(tables)
    }

    async fn describe_table(
        &self,
        database: Option<&str>,
        table: &str,
    ) -> EngineResult<Vec<ColumnDescriptor>> {
        let collection = self.collection(database, table)?;
        let sample = self
            .bounded("sample document", async { collection.find_one(doc! {}).await })
            .await?;

        Ok(sample
            .map(|document| infer_document_columns(&document))
            .unwrap_or_default())
    }

    async fn execute(
        &self,
        payload: &QueryPayload,
        database: Option<&str>,
    ) -> EngineResult<QueryResult> {
        let QueryPayload::Document(op) = payload else {
            return Err(EngineError::invalid_input(
                "MongoDB expects a document operation: {\"collection\": ..., \"operation\": \"find\" | \"aggregate\" | \"insertOne\"}",
            ));
        };

        let start = Instant::now();
        let collection = self.collection(database, &op.collection)?;
        debug!(collection = %op.collection, operation = %op.operation, "Running document operation");

        let result = match op.operation {
            DocumentOperationKind::Find => self.run_find(collection, op).await?,
            DocumentOperationKind::Aggregate => self.run_aggregate(collection, op).await?,
            DocumentOperationKind::InsertOne => self.run_insert_one(collection, op).await?,
        };
        Ok(result.with_execution_time(start.elapsed().as_millis() as u64))
    }

    async fn preview_table(
        &self,
        database: Option<&str>,
        table: &str,
        limit: usize,
    ) -> EngineResult<QueryResult> {
        let start = Instant::now();
        let collection = self.collection(database, table)?;
        let cap = limit.min(self.settings.row_limit).max(1);
        let cursor = self
            .bounded("preview", async {
                collection.find(doc! {}).limit(cap as i64 + 1).await
            })
            .await?;
        let result = self.drain_cursor(cursor, cap).await?;
        Ok(result.with_execution_time(start.elapsed().as_millis() as u64))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(client) = &self.client {
            info!("Closing MongoDB client");
            client.clone().shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_operations_before_connect_are_not_connected() {
        let adapter = MongoAdapter::new(AdapterSettings::default());
        let err = adapter.list_databases().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConnected);
        let err = adapter.describe_table(Some("shop"), "users").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn test_relationships_not_declared() {
        let adapter = MongoAdapter::new(AdapterSettings::default());
        let err = adapter
            .table_relationships(Some("shop"), "users")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    }

    #[tokio::test]
    async fn test_execute_rejects_sql_payload() {
        let adapter = MongoAdapter::new(AdapterSettings::default());
        let payload = QueryPayload::Sql("SELECT 1".to_string());
        let err = adapter.execute(&payload, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_find_cap_zero_means_row_limit() {
        assert_eq!(find_cap(Some(0), 1000), 1000);
        assert_eq!(find_cap(None, 1000), 1000);
        assert_eq!(find_cap(Some(5), 1000), 5);
        assert_eq!(find_cap(Some(5000), 1000), 1000);
        assert_eq!(find_cap(Some(3), 0), 1);
    }

    #[tokio::test]
    async fn test_count_before_gives_up_at_deadline() {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(20);
        let stalled = count_before(deadline, "events", std::future::pending()).await;
        assert_eq!(stalled, None);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        let counted = count_before(deadline, "users", async { Ok(7) }).await;
        assert_eq!(counted, Some(7));
    }

    #[test]
    fn test_to_document_requires_object() {
        assert!(to_document(&json!({"age": {"$gt": 3}}), "filter").is_ok());
        let err = to_document(&json!([1, 2]), "filter").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_to_document_honors_extended_json() {
        let document =
            to_document(&json!({"_id": {"$oid": "507f1f77bcf86cd799439011"}}), "filter").unwrap();
        assert!(matches!(document.get("_id"), Some(Bson::ObjectId(_))));
    }

    #[test]
    fn test_document_to_row_uses_relaxed_json() {
        let row = document_to_row(doc! { "name": "ada", "age": 36_i32, "tags": ["x"] });
        assert_eq!(row["name"], json!("ada"));
        assert_eq!(row["age"], json!(36));
        assert_eq!(row["tags"], json!(["x"]));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let adapter = MongoAdapter::new(AdapterSettings::default());
        adapter.close().await;
        adapter.close().await;
    }
}
