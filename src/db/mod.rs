//! Database abstraction layer.
//!
//! This module provides the engine side of the gateway:
//! - The `EngineAdapter` capability interface and one adapter per engine
//! - The connection registry owning the single active session
//! - Schema normalization and relationship extraction
//! - Per-database pools for PostgreSQL retargeting

pub mod adapter;
pub mod database_pool;
pub mod executor;
pub mod identifiers;
pub mod mongo;
pub mod mysql;
pub mod normalize;
pub mod postgres;
pub mod registry;
pub mod relationships;
pub mod rows;

pub use adapter::{AdapterFactory, DefaultAdapterFactory, EngineAdapter};
pub use database_pool::{DatabasePoolConfig, DatabasePoolManager, PoolLease};
pub use mongo::MongoAdapter;
pub use mysql::MySqlAdapter;
pub use postgres::PostgresAdapter;
pub use registry::{ActiveSession, ConnectionRegistry, RegistryStatus, SessionLease};
pub use relationships::{RelationshipSet, extract_relationships, not_applicable_reason};
