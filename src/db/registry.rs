//! The single active session.
//!
//! The registry owns at most one connected adapter. State transitions
//! (`connect`, `disconnect`) take the write half of one `RwLock`; every other
//! operation runs under a [`SessionLease`], an owned read guard held for the
//! whole call. A `connect` racing an in-flight `execute` therefore waits for
//! it to finish before the old adapter is closed, and the execute can never
//! land on a swapped engine.
//!
//! Adapter calls run on spawned tasks holding a clone of the lease. Dropping
//! the caller's future does not cancel engine I/O mid-flight.
//!
//! Lock order: a lease is never taken while another lease or the write guard
//! is held by the same task.

use crate::db::adapter::{AdapterFactory, EngineAdapter};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    ColumnDescriptor, ConnectionInfo, DEFAULT_PREVIEW_LIMIT, EngineConfig, EngineKind,
    QueryPayload, QueryResult, Relationship, SessionId, TableSummary,
};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedRwLockReadGuard, RwLock};
use tracing::{debug, error, info, warn};

/// A connected adapter bound to the configuration it was created from.
pub struct ActiveSession {
    pub id: SessionId,
    pub config: EngineConfig,
    adapter: Arc<dyn EngineAdapter>,
    connected_at: DateTime<Utc>,
    server_version: Option<String>,
}

impl ActiveSession {
    pub fn engine(&self) -> EngineKind {
        self.config.engine
    }

    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            session_id: self.id,
            engine: self.config.engine,
            host: self.config.host.clone(),
            database: self.config.default_database().map(str::to_string),
            server_version: self.server_version.clone(),
            connected_at: self.connected_at,
        }
    }
}

enum SessionState {
    Disconnected,
    Connected(ActiveSession),
}

/// Snapshot returned by [`ConnectionRegistry::status`].
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RegistryStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<ConnectionInfo>,
}

/// Read access to the active session for the duration of one operation.
///
/// Clones share one read guard; the session stays pinned until the last
/// clone is dropped.
#[derive(Clone)]
pub struct SessionLease {
    guard: Arc<OwnedRwLockReadGuard<SessionState, ActiveSession>>,
}

impl SessionLease {
    pub fn id(&self) -> SessionId {
        self.guard.id
    }

    pub fn engine(&self) -> EngineKind {
        self.guard.engine()
    }

    pub fn info(&self) -> ConnectionInfo {
        self.guard.info()
    }

    pub fn adapter(&self) -> &dyn EngineAdapter {
        self.guard.adapter.as_ref()
    }

    /// Run one adapter call on its own task.
    ///
    /// The task owns a clone of the lease, so a caller that stops waiting
    /// leaves the call running to completion with the session pinned; only
    /// its result is dropped.
    async fn detached<T, F, Fut>(&self, operation: &'static str, call: F) -> EngineResult<T>
    where
        T: Send + 'static,
        F: FnOnce(SessionLease) -> Fut,
        Fut: Future<Output = EngineResult<T>> + Send + 'static,
    {
        let task = tokio::spawn(call(self.clone()));
        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!(session_id = %self.id(), operation, error = %e, "Engine task failed");
                Err(EngineError::internal(format!("{} task failed: {}", operation, e)))
            }
        }
    }

    pub async fn list_databases(&self) -> EngineResult<Vec<String>> {
        self.detached("list databases", |lease| async move {
            lease.adapter().list_databases().await
        })
        .await
    }

    pub async fn list_tables(&self, database: Option<&str>) -> EngineResult<Vec<TableSummary>> {
        let database = database.map(str::to_string);
        self.detached("list tables", move |lease| async move {
            lease.adapter().list_tables(database.as_deref()).await
        })
        .await
    }

    pub async fn describe_table(
        &self,
        database: Option<&str>,
        table: &str,
    ) -> EngineResult<Vec<ColumnDescriptor>> {
        let database = database.map(str::to_string);
        let table = table.to_string();
        self.detached("describe table", move |lease| async move {
            lease.adapter().describe_table(database.as_deref(), &table).await
        })
        .await
    }

    pub async fn preview_table(
        &self,
        database: Option<&str>,
        table: &str,
        limit: Option<usize>,
    ) -> EngineResult<QueryResult> {
        let limit = limit.unwrap_or(DEFAULT_PREVIEW_LIMIT).max(1);
        let database = database.map(str::to_string);
        let table = table.to_string();
        self.detached("preview table", move |lease| async move {
            lease
                .adapter()
                .preview_table(database.as_deref(), &table, limit)
                .await
        })
        .await
    }

    pub async fn table_relationships(
        &self,
        database: Option<&str>,
        table: &str,
    ) -> EngineResult<Vec<Relationship>> {
        let database = database.map(str::to_string);
        let table = table.to_string();
        self.detached("table relationships", move |lease| async move {
            lease
                .adapter()
                .table_relationships(database.as_deref(), &table)
                .await
        })
        .await
    }

    /// Interpret `raw` for the session's engine and run it.
    ///
    /// Unknown document operations are rejected here, before any engine I/O.
    pub async fn execute(
        &self,
        raw: JsonValue,
        database: Option<&str>,
    ) -> EngineResult<QueryResult> {
        let payload = QueryPayload::for_engine(self.engine(), raw)?;
        debug!(
            session_id = %self.id(),
            payload = payload.label(),
            database = ?database,
            "Executing payload"
        );
        self.run_payload("execute", payload, database).await
    }

    /// Submit the full text of a script as one payload.
    pub async fn import_script(
        &self,
        script: &str,
        database: Option<&str>,
    ) -> EngineResult<QueryResult> {
        if script.trim().is_empty() {
            return Err(EngineError::invalid_input("Import script is empty"));
        }
        let payload = QueryPayload::from_script(self.engine(), script)?;
        info!(
            session_id = %self.id(),
            bytes = script.len(),
            database = ?database,
            "Importing script"
        );
        self.run_payload("import", payload, database).await
    }

    async fn run_payload(
        &self,
        operation: &'static str,
        payload: QueryPayload,
        database: Option<&str>,
    ) -> EngineResult<QueryResult> {
        let database = database.map(str::to_string);
        self.detached(operation, move |lease| async move {
            lease.adapter().execute(&payload, database.as_deref()).await
        })
        .await
    }
}

/// Owner of the single active session.
pub struct ConnectionRegistry {
    factory: Arc<dyn AdapterFactory>,
    connect_timeout: Duration,
    state: Arc<RwLock<SessionState>>,
}

impl ConnectionRegistry {
    pub fn new(factory: Arc<dyn AdapterFactory>, connect_timeout: Duration) -> Self {
        Self {
            factory,
            connect_timeout,
            state: Arc::new(RwLock::new(SessionState::Disconnected)),
        }
    }

    /// Replace the active session with a new one built from `config`.
    ///
    /// The previous adapter is closed first. On failure the new adapter is
    /// closed too and the registry is left `Disconnected`.
    pub async fn connect(&self, config: EngineConfig) -> EngineResult<ConnectionInfo> {
        let mut state = self.state.write().await;

        if let SessionState::Connected(previous) =
            std::mem::replace(&mut *state, SessionState::Disconnected)
        {
            info!(
                session_id = %previous.id,
                engine = %previous.engine(),
                "Closing previous session"
            );
            previous.adapter.close().await;
        }

        let engine = config.engine;
        let mut adapter = self.factory.create(engine);
        let connected =
            match tokio::time::timeout(self.connect_timeout, adapter.connect(&config)).await {
                Ok(result) => result,
                Err(_) => Err(EngineError::timeout(
                    "connect",
                    self.connect_timeout.as_secs(),
                )),
            };

        if let Err(e) = connected {
            adapter.close().await;
            warn!(engine = %engine, error = %e, "Connect failed; registry is disconnected");
            return Err(e);
        }

        let session = ActiveSession {
            id: SessionId::new(),
            server_version: adapter.server_version(),
            adapter: Arc::from(adapter),
            connected_at: Utc::now(),
            config,
        };
        let connection = session.info();
        info!(
            session_id = %session.id,
            engine = %engine,
            database = ?connection.database,
            "Session connected"
        );
        *state = SessionState::Connected(session);
        Ok(connection)
    }

    /// Close the active session, if any. Idempotent.
    pub async fn disconnect(&self) -> bool {
        let mut state = self.state.write().await;
        match std::mem::replace(&mut *state, SessionState::Disconnected) {
            SessionState::Connected(session) => {
                info!(session_id = %session.id, engine = %session.engine(), "Session closed");
                session.adapter.close().await;
                true
            }
            SessionState::Disconnected => {
                debug!("Disconnect requested with no active session");
                false
            }
        }
    }

    /// Alias of [`disconnect`](Self::disconnect) used on shutdown.
    pub async fn close(&self) {
        self.disconnect().await;
    }

    pub async fn status(&self) -> RegistryStatus {
        let state = self.state.read().await;
        match &*state {
            SessionState::Connected(session) => RegistryStatus {
                connected: true,
                session: Some(session.info()),
            },
            SessionState::Disconnected => RegistryStatus {
                connected: false,
                session: None,
            },
        }
    }

    /// Lease the active session for one operation.
    ///
    /// With `expected`, the call fails with `StaleSession` if the registry has
    /// been reconnected since that session id was issued.
    pub async fn lease(&self, expected: Option<SessionId>) -> EngineResult<SessionLease> {
        let state = Arc::clone(&self.state).read_owned().await;
        let guard = OwnedRwLockReadGuard::try_map(state, |state| match state {
            SessionState::Connected(session) => Some(session),
            SessionState::Disconnected => None,
        })
        .map_err(|_| EngineError::NotConnected)?;

        if let Some(expected) = expected {
            if guard.id != expected {
                return Err(EngineError::stale_session(
                    expected.to_string(),
                    guard.id.to_string(),
                ));
            }
        }

        Ok(SessionLease {
            guard: Arc::new(guard),
        })
    }

    pub async fn list_databases(&self) -> EngineResult<Vec<String>> {
        self.lease(None).await?.list_databases().await
    }

    pub async fn list_tables(&self, database: Option<&str>) -> EngineResult<Vec<TableSummary>> {
        self.lease(None).await?.list_tables(database).await
    }

    pub async fn describe_table(
        &self,
        database: Option<&str>,
        table: &str,
    ) -> EngineResult<Vec<ColumnDescriptor>> {
        self.lease(None).await?.describe_table(database, table).await
    }

    pub async fn preview_table(
        &self,
        database: Option<&str>,
        table: &str,
        limit: Option<usize>,
    ) -> EngineResult<QueryResult> {
        self.lease(None)
            .await?
            .preview_table(database, table, limit)
            .await
    }

    pub async fn execute(
        &self,
        raw: JsonValue,
        database: Option<&str>,
        expected: Option<SessionId>,
    ) -> EngineResult<QueryResult> {
        self.lease(expected).await?.execute(raw, database).await
    }

    pub async fn import_script(
        &self,
        script: &str,
        database: Option<&str>,
    ) -> EngineResult<QueryResult> {
        self.lease(None).await?.import_script(script, database).await
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::adapter::DefaultAdapterFactory;
    use crate::error::ErrorKind;

    fn registry() -> ConnectionRegistry {
        ConnectionRegistry::new(
            Arc::new(DefaultAdapterFactory::default()),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_new_registry_is_disconnected() {
        let registry = registry();
        let status = registry.status().await;
        assert!(!status.connected);
        assert!(status.session.is_none());

        let err = registry.list_databases().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConnected);
        let err = registry.lease(None).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn test_disconnect_without_session_is_noop() {
        let registry = registry();
        assert!(!registry.disconnect().await);
        assert!(!registry.disconnect().await);
    }

    #[tokio::test]
    async fn test_connect_with_bad_uri_stays_disconnected() {
        let registry = registry();
        let config = EngineConfig::new(EngineKind::MySql).with_host("bad host name");
        assert!(registry.connect(config).await.is_err());
        assert!(!registry.status().await.connected);
    }
}
