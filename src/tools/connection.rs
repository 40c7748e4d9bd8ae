//! Session lifecycle tools.
//!
//! This module implements the `connect`, `disconnect` and `status` tools.

use crate::db::{ConnectionRegistry, RegistryStatus};
use crate::error::EngineResult;
use crate::models::{ConnectionInfo, EngineConfig};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Input for the connect tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ConnectInput {
    /// Connection settings. Replaces the active session, if any.
    #[serde(flatten)]
    pub config: EngineConfig,
}

/// Output from the connect tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ConnectOutput {
    /// Pass `connection.session_id` to `execute` to guard against reconnects
    pub connection: ConnectionInfo,
    pub message: String,
}

/// Output from the disconnect tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DisconnectOutput {
    /// False if there was no active session
    pub disconnected: bool,
}

pub struct ConnectionToolHandler {
    registry: Arc<ConnectionRegistry>,
}

impl ConnectionToolHandler {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub async fn connect(&self, input: ConnectInput) -> EngineResult<ConnectOutput> {
        let engine = input.config.engine;
        let connection = self.registry.connect(input.config).await?;
        let message = match &connection.database {
            Some(db) => format!("Connected to {} database '{}'", engine, db),
            None => format!("Connected to {}", engine),
        };
        Ok(ConnectOutput {
            connection,
            message,
        })
    }

    pub async fn disconnect(&self) -> DisconnectOutput {
        let disconnected = self.registry.disconnect().await;
        info!(disconnected, "Disconnect handled");
        DisconnectOutput { disconnected }
    }

    pub async fn status(&self) -> RegistryStatus {
        self.registry.status().await
    }
}
