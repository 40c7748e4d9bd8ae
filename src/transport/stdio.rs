//! Stdio transport for the gateway.
//!
//! This transport uses standard input/output for MCP communication,
//! which is the standard mode for CLI-based MCP integrations. The REST
//! routes are only served by the HTTP transport.

use crate::db::ConnectionRegistry;
use crate::erd::ErdBuilder;
use crate::error::{EngineError, EngineResult};
use crate::mcp::GatewayService;
use crate::transport::{Transport, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use std::sync::Arc;
use tracing::{info, warn};

/// Stdio transport implementation.
///
/// This transport reads JSON-RPC messages from stdin and writes
/// responses to stdout as MCP JSON-RPC messages.
pub struct StdioTransport {
    registry: Arc<ConnectionRegistry>,
    erd_builder: ErdBuilder,
}

impl StdioTransport {
    pub fn new(registry: Arc<ConnectionRegistry>, erd_builder: ErdBuilder) -> Self {
        Self {
            registry,
            erd_builder,
        }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> EngineResult<()> {
        info!("Starting gateway with stdio transport");

        let service = GatewayService::new(self.registry.clone(), self.erd_builder);
        let running_service = service.serve(stdio()).await.map_err(|e| {
            EngineError::internal(format!("Failed to start stdio transport: {}", e))
        })?;

        let shutdown_requested = tokio::select! {
            result = running_service.waiting() => {
                match result {
                    Ok(_quit_reason) => info!("Stdio transport completed normally"),
                    Err(e) => {
                        warn!(error = %e, "Stdio transport error");
                        self.registry.close().await;
                        return Err(EngineError::internal(format!(
                            "Stdio transport error: {}",
                            e
                        )));
                    }
                }
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received (send again to force exit)");
                true
            }
        };

        if shutdown_requested {
            tokio::spawn(async {
                wait_for_signal().await;
                warn!("Received second signal, forcing immediate exit");
                std::process::exit(1);
            });
        }

        info!("Closing the active session");
        self.registry.close().await;

        if shutdown_requested {
            // stdin reads block; select! cannot interrupt them
            info!("Exiting process");
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DefaultAdapterFactory;
    use std::time::Duration;

    #[test]
    fn test_stdio_transport_creation() {
        let registry = Arc::new(ConnectionRegistry::new(
            Arc::new(DefaultAdapterFactory::default()),
            Duration::from_secs(1),
        ));
        let transport = StdioTransport::new(registry, ErdBuilder::default());
        assert_eq!(transport.name(), "stdio");
    }
}
