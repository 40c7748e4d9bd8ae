//! Per-database connection pools for PostgreSQL retargeting.
//!
//! A PostgreSQL connection is bound to one database for its lifetime, so a
//! call aimed at another database gets a lazily created pool scoped to it.
//!
//! # Design Decisions
//!
//! - **`OnceCell` per database key**: Single-flight pool creation prevents resource leaks
//!   from concurrent requests to the same database
//! - **`AtomicUsize` for active tracking**: Lock-free active count protects pools from
//!   premature cleanup while in use
//! - **[`PoolLease`]**: the active count is released synchronously in `Drop`, so an
//!   early return or a panic cannot leak a borrow
//! - **`std::sync::Mutex` for cleanup handle**: Synchronous storage avoids async in Drop
//!
//! # Concurrency Safety
//!
//! - All locks are released before async operations (await points)
//! - Cleanup re-checks idleness under the write lock before removing a pool
//! - A pool removed while a caller still holds its cell stays valid (the `Arc`
//!   keeps it alive); the only cost is a later re-creation

use crate::config::PoolOptions;
use crate::db::adapter::connection_error;
use crate::error::{EngineError, EngineResult};
use crate::models::EngineKind;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{OnceCell, RwLock as TokioRwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Entry for a database-specific connection pool.
pub struct DatabasePoolEntry {
    pub pool: PgPool,
    pub database: String,
    /// Uses std::sync::RwLock (not tokio) to avoid holding locks across await points.
    last_accessed: std::sync::RwLock<Instant>,
    pub created_at: Instant,
    /// Count of active borrows. Cleanup skips pools with active_count > 0.
    active_count: AtomicUsize,
}

impl DatabasePoolEntry {
    fn new(pool: PgPool, database: String) -> Self {
        let now = Instant::now();
        Self {
            pool,
            database,
            last_accessed: std::sync::RwLock::new(now),
            created_at: now,
            active_count: AtomicUsize::new(0),
        }
    }

    pub fn increment_active(&self) {
        self.active_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrement active usage count. Saturates at 0 to prevent underflow from
    /// extra release calls.
    pub fn decrement_active(&self) {
        let result = self
            .active_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                Some(count.saturating_sub(1))
            });

        if let Ok(0) = result {
            warn!(
                database = %self.database,
                "Active count underflow detected - extra release call"
            );
        }
    }

    pub fn active_count(&self) -> usize {
        self.active_count.load(Ordering::Acquire)
    }

    /// Update last accessed time. Synchronous - does not hold locks across await.
    pub fn touch(&self) {
        if let Ok(mut last_accessed) = self.last_accessed.write() {
            *last_accessed = Instant::now();
        }
    }

    pub fn last_accessed(&self) -> Instant {
        self.last_accessed
            .read()
            .map(|guard| *guard)
            .unwrap_or(self.created_at)
    }
}

impl std::fmt::Debug for DatabasePoolEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabasePoolEntry")
            .field("database", &self.database)
            .field("created_at", &self.created_at)
            .field("active_count", &self.active_count.load(Ordering::Relaxed))
            .finish()
    }
}

type PoolCell = Arc<OnceCell<DatabasePoolEntry>>;

/// A borrowed pool. Scoped leases release their active count on drop.
pub struct PoolLease {
    pool: PgPool,
    cell: Option<PoolCell>,
}

impl PoolLease {
    /// Lease the session's own pool; nothing to release.
    pub fn session(pool: PgPool) -> Self {
        Self { pool, cell: None }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn is_scoped(&self) -> bool {
        self.cell.is_some()
    }
}

impl Drop for PoolLease {
    fn drop(&mut self) {
        if let Some(entry) = self.cell.as_ref().and_then(|cell| cell.get()) {
            entry.touch();
            entry.decrement_active();
        }
    }
}

/// Configuration for creating database-specific pools.
#[derive(Debug, Clone)]
pub struct DatabasePoolConfig {
    /// Options of the session connection; only the database name is replaced.
    pub base_options: PgConnectOptions,
    pub pool_options: PoolOptions,
    pub idle_timeout: Duration,
    pub cleanup_interval: Duration,
}

impl DatabasePoolConfig {
    pub fn new(base_options: PgConnectOptions, pool_options: PoolOptions) -> Self {
        Self {
            base_options,
            idle_timeout: Duration::from_secs(pool_options.database_pool_idle_timeout_or_default()),
            cleanup_interval: Duration::from_secs(
                pool_options.database_pool_cleanup_interval_or_default(),
            ),
            pool_options,
        }
    }
}

/// Manages lazily created pools keyed by database name.
pub struct DatabasePoolManager {
    config: DatabasePoolConfig,
    /// Per-database lazy pools. OnceCell ensures single-flight creation.
    pools: TokioRwLock<HashMap<String, PoolCell>>,
    /// Cleanup task handle. Uses std::sync::Mutex for synchronous storage.
    cleanup_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl DatabasePoolManager {
    /// Create a new database pool manager.
    ///
    /// Spawns a background cleanup task that periodically removes idle pools.
    pub fn new(config: DatabasePoolConfig) -> Arc<Self> {
        let manager = Arc::new(Self::unstarted(config));

        // Weak reference to avoid a cycle between the manager and its task
        let weak_manager = Arc::downgrade(&manager);
        let cleanup_interval = manager.config.cleanup_interval;
        let idle_timeout = manager.config.idle_timeout;

        let handle = tokio::spawn(async move {
            Self::cleanup_task(weak_manager, cleanup_interval, idle_timeout).await;
        });

        if let Ok(mut guard) = manager.cleanup_handle.lock() {
            *guard = Some(handle);
        }

        manager
    }

    fn unstarted(config: DatabasePoolConfig) -> Self {
        Self {
            config,
            pools: TokioRwLock::new(HashMap::new()),
            cleanup_handle: std::sync::Mutex::new(None),
        }
    }

    /// Lease the pool for `database`, creating it on first use.
    ///
    /// Concurrent requests for the same database wait for the first creation
    /// to complete.
    pub async fn acquire(&self, database: &str) -> EngineResult<PoolLease> {
        if database.trim().is_empty() {
            return Err(EngineError::invalid_input(
                "Database name cannot be empty. Omit the database parameter to use the default database.",
            ));
        }

        let cell = {
            let pools = self.pools.read().await;
            if let Some(cell) = pools.get(database) {
                Arc::clone(cell)
            } else {
                drop(pools);
                let mut pools = self.pools.write().await;
                // Double-check after acquiring write lock
                Arc::clone(
                    pools
                        .entry(database.to_string())
                        .or_insert_with(|| Arc::new(OnceCell::new())),
                )
            }
        };

        let entry = cell
            .get_or_try_init(|| async {
                info!(database = %database, "Creating database-scoped pool");
                let pool = self.create_database_pool(database).await?;
                Ok::<_, EngineError>(DatabasePoolEntry::new(pool, database.to_string()))
            })
            .await?;

        entry.touch();
        entry.increment_active();
        debug!(database = %database, active = entry.active_count(), "Leased database pool");

        Ok(PoolLease {
            pool: entry.pool.clone(),
            cell: Some(cell),
        })
    }

    /// Get the number of active pools (initialized OnceCells).
    pub async fn pool_count(&self) -> usize {
        let pools = self.pools.read().await;
        pools.values().filter(|cell| cell.get().is_some()).count()
    }

    /// Close all database pools and cancel the cleanup task.
    pub async fn close_all(&self) {
        if let Ok(mut handle_guard) = self.cleanup_handle.lock() {
            if let Some(handle) = handle_guard.take() {
                handle.abort();
            }
        }

        // Drain pools under lock, close outside lock
        let pools_to_close: Vec<_> = {
            let mut pools = self.pools.write().await;
            pools.drain().collect()
        };

        for (database, cell) in pools_to_close {
            if let Some(entry) = cell.get() {
                info!(database = %database, "Closing database pool");
                entry.pool.close().await;
            }
        }
    }

    async fn create_database_pool(&self, database: &str) -> EngineResult<PgPool> {
        let options = self.config.base_options.clone().database(database);
        let pool_opts = &self.config.pool_options;

        PgPoolOptions::new()
            .min_connections(pool_opts.min_connections_or_default())
            .max_connections(pool_opts.max_connections_or_default())
            .acquire_timeout(Duration::from_secs(pool_opts.acquire_timeout_or_default()))
            .idle_timeout(Some(Duration::from_secs(pool_opts.idle_timeout_or_default())))
            .test_before_acquire(pool_opts.test_before_acquire_or_default())
            .connect_with(options)
            .await
            .map_err(|e| {
                let error_str = e.to_string().to_lowercase();
                if error_str.contains("does not exist") {
                    return EngineError::not_found(format!("database '{}'", database));
                }
                connection_error(EngineKind::Postgres, e)
            })
    }

    /// Background task to cleanup idle pools.
    ///
    /// Only removes pools that are initialized, not in use, and idle longer
    /// than the configured timeout. The task exits when the manager is dropped.
    async fn cleanup_task(
        weak_manager: Weak<Self>,
        cleanup_interval: Duration,
        idle_timeout: Duration,
    ) {
        let mut interval = tokio::time::interval(cleanup_interval);

        loop {
            interval.tick().await;

            let Some(manager) = weak_manager.upgrade() else {
                info!("Database pool manager dropped, cleanup task exiting");
                return;
            };

            let now = Instant::now();
            let candidates: Vec<String> = {
                let pools = manager.pools.read().await;
                pools
                    .iter()
                    .filter_map(|(database, cell)| {
                        let entry = cell.get()?;
                        let idle = now.saturating_duration_since(entry.last_accessed());
                        (entry.active_count() == 0 && idle > idle_timeout)
                            .then(|| database.clone())
                    })
                    .collect()
            };

            for database in candidates {
                let removed_cell = {
                    let mut pools = manager.pools.write().await;

                    // Re-check under the write lock
                    let still_idle = pools
                        .get(&database)
                        .and_then(|cell| cell.get())
                        .map(|entry| {
                            entry.active_count() == 0
                                && now.saturating_duration_since(entry.last_accessed())
                                    > idle_timeout
                        })
                        .unwrap_or(false);

                    if !still_idle {
                        debug!(database = %database, "Pool became active during cleanup, skipping");
                        continue;
                    }
                    pools.remove(&database)
                };

                if let Some(entry) = removed_cell.as_ref().and_then(|cell| cell.get()) {
                    info!(database = %database, "Closing idle database pool");
                    entry.pool.close().await;
                }
            }

            // Drop strong reference before sleeping to allow manager deallocation
            drop(manager);
        }
    }
}

impl std::fmt::Debug for DatabasePoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabasePoolManager")
            .field("idle_timeout", &self.config.idle_timeout)
            .field("cleanup_interval", &self.config.cleanup_interval)
            .finish()
    }
}
