//! Data models for the database gateway.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{ConnectionInfo, DEFAULT_MONGODB_URI, EngineConfig, EngineKind, SessionId};
pub use query::{
    DEFAULT_PREVIEW_LIMIT, DEFAULT_ROW_LIMIT, DocumentOperation, DocumentOperationKind,
    MAX_ROW_LIMIT, QueryPayload, QueryResult,
};
pub use schema::{ColumnDescriptor, Relationship, TableDescriptor, TableSummary};
