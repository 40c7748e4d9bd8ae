//! In-memory adapter used by the integration tests.
//!
//! Records every call in a shared event log so tests can assert on ordering
//! (for example that an old session is closed only after an in-flight
//! execute finished).

#![allow(dead_code)]

use async_trait::async_trait;
use db_gateway::db::{AdapterFactory, ConnectionRegistry, EngineAdapter};
use db_gateway::error::{EngineError, EngineResult};
use db_gateway::models::{
    ColumnDescriptor, EngineConfig, EngineKind, QueryPayload, QueryResult, Relationship,
    TableSummary,
};
use serde_json::{Map, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Canned schema and behavior shared by every adapter the factory creates.
#[derive(Default)]
pub struct MockBehavior {
    pub tables: Vec<(String, Vec<ColumnDescriptor>)>,
    pub relationships: HashMap<String, Vec<Relationship>>,
    /// Per-table delay for describe/relationship calls
    pub delays: HashMap<String, Duration>,
    pub execute_delay: Duration,
    pub connect_delay: Duration,
    pub refuse_connect: bool,
}

#[derive(Default)]
pub struct MockLog {
    events: Mutex<Vec<String>>,
    adapters: AtomicUsize,
}

impl MockLog {
    pub fn push(&self, event: impl Into<String>) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.into());
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

pub struct MockAdapter {
    id: usize,
    kind: EngineKind,
    behavior: Arc<MockBehavior>,
    log: Arc<MockLog>,
    connected: bool,
}

impl MockAdapter {
    async fn pause(&self, table: &str) {
        if let Some(delay) = self.behavior.delays.get(table) {
            tokio::time::sleep(*delay).await;
        }
    }

    fn require_connected(&self) -> EngineResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(EngineError::NotConnected)
        }
    }
}

#[async_trait]
impl EngineAdapter for MockAdapter {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn connect(&mut self, _config: &EngineConfig) -> EngineResult<()> {
        self.log.push(format!("connect:{}", self.id));
        if !self.behavior.connect_delay.is_zero() {
            tokio::time::sleep(self.behavior.connect_delay).await;
        }
        if self.behavior.refuse_connect {
            return Err(EngineError::connection_refused(
                "Access denied for user 'app'",
                "Verify the username and password",
            ));
        }
        self.connected = true;
        Ok(())
    }

    fn server_version(&self) -> Option<String> {
        Some("mock-1.0".to_string())
    }

    async fn list_databases(&self) -> EngineResult<Vec<String>> {
        self.require_connected()?;
        self.log.push(format!("list_databases:{}", self.id));
        Ok(vec!["shop".to_string()])
    }

    async fn list_tables(&self, _database: Option<&str>) -> EngineResult<Vec<TableSummary>> {
        self.require_connected()?;
        self.log.push(format!("list_tables:{}", self.id));
        Ok(self
            .behavior
            .tables
            .iter()
            .map(|(name, _)| TableSummary::new(name.clone()).with_row_count(1))
            .collect())
    }

    async fn describe_table(
        &self,
        _database: Option<&str>,
        table: &str,
    ) -> EngineResult<Vec<ColumnDescriptor>> {
        self.require_connected()?;
        self.pause(table).await;
        self.log.push(format!("describe:{}", table));
        self.behavior
            .tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, columns)| columns.clone())
            .ok_or_else(|| EngineError::not_found(format!("table '{}'", table)))
    }

    async fn execute(
        &self,
        payload: &QueryPayload,
        _database: Option<&str>,
    ) -> EngineResult<QueryResult> {
        self.require_connected()?;
        self.log.push(format!("execute_start:{}", self.id));
        if !self.behavior.execute_delay.is_zero() {
            tokio::time::sleep(self.behavior.execute_delay).await;
        }
        self.log.push(format!("execute_end:{}", self.id));

        let mut row = Map::new();
        row.insert("payload".to_string(), json!(payload.label()));
        row.insert("adapter".to_string(), json!(self.id));
        Ok(QueryResult::new(vec![row]))
    }

    async fn preview_table(
        &self,
        _database: Option<&str>,
        table: &str,
        limit: usize,
    ) -> EngineResult<QueryResult> {
        self.require_connected()?;
        self.log.push(format!("preview:{}:{}", table, limit));
        Ok(QueryResult::new(vec![]))
    }

    async fn table_relationships(
        &self,
        _database: Option<&str>,
        table: &str,
    ) -> EngineResult<Vec<Relationship>> {
        self.require_connected()?;
        if !self.kind.is_relational() {
            return Err(EngineError::unsupported("table_relationships", "document engine"));
        }
        self.pause(table).await;
        self.log.push(format!("relationships:{}", table));
        Ok(self
            .behavior
            .relationships
            .get(table)
            .cloned()
            .unwrap_or_default())
    }

    async fn close(&self) {
        self.log.push(format!("close:{}", self.id));
    }
}

pub struct MockFactory {
    pub behavior: Arc<MockBehavior>,
    pub log: Arc<MockLog>,
}

impl AdapterFactory for MockFactory {
    fn create(&self, kind: EngineKind) -> Box<dyn EngineAdapter> {
        let id = self.log.adapters.fetch_add(1, Ordering::SeqCst) + 1;
        Box::new(MockAdapter {
            id,
            kind,
            behavior: self.behavior.clone(),
            log: self.log.clone(),
            connected: false,
        })
    }
}

/// Registry backed by mock adapters, plus the shared event log.
pub fn mock_registry(behavior: MockBehavior) -> (Arc<ConnectionRegistry>, Arc<MockLog>) {
    mock_registry_with_timeout(behavior, Duration::from_secs(5))
}

pub fn mock_registry_with_timeout(
    behavior: MockBehavior,
    connect_timeout: Duration,
) -> (Arc<ConnectionRegistry>, Arc<MockLog>) {
    let log = Arc::new(MockLog::default());
    let factory = MockFactory {
        behavior: Arc::new(behavior),
        log: log.clone(),
    };
    (
        Arc::new(ConnectionRegistry::new(Arc::new(factory), connect_timeout)),
        log,
    )
}

pub fn column(name: &str, declared_type: &str, nullable: bool) -> ColumnDescriptor {
    ColumnDescriptor::new(name, declared_type, nullable)
}

pub fn mysql_config() -> EngineConfig {
    EngineConfig::new(EngineKind::MySql)
        .with_host("localhost")
        .with_database("shop")
}
