//! Database Gateway Library
//!
//! One switchable session to a MySQL, PostgreSQL or MongoDB server, with a
//! uniform operation surface (list, describe, preview, execute), relationship
//! extraction and Mermaid ERD rendering. Exposed over MCP (stdio or HTTP) and
//! plain REST routes.

pub mod config;
pub mod db;
pub mod erd;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use db::ConnectionRegistry;
pub use error::{EngineError, EngineResult};
pub use mcp::GatewayService;
