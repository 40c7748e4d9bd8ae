//! Tool implementations shared by the MCP service and the REST routes.
//!
//! This module contains all gateway tool handlers:
//! - `connection`: connect, disconnect and status
//! - `schema`: list databases/tables, describe and preview tables
//! - `query`: execute an untrusted payload against the session
//! - `import`: submit a whole script as one payload
//! - `erd`: entity-relationship diagram generation

pub mod connection;
pub mod erd;
pub mod import;
pub mod query;
pub mod schema;

pub use connection::{ConnectInput, ConnectOutput, ConnectionToolHandler, DisconnectOutput};
pub use erd::{ErdInput, ErdOutput, ErdToolHandler};
pub use import::{ImportInput, ImportOutput, ImportToolHandler};
pub use query::{ExecuteInput, ExecuteOutput, QueryToolHandler};
pub use schema::{
    DescribeTableInput, DescribeTableOutput, ListDatabasesOutput, ListTablesInput,
    ListTablesOutput, PreviewTableInput, SchemaToolHandler,
};
