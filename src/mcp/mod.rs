//! MCP server integration module.
//!
//! This module exposes the gateway tool handlers over the MCP protocol
//! using the rmcp framework.

pub mod service;

pub use service::GatewayService;
