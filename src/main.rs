//! Database Gateway - Main entry point.
//!
//! Serves one switchable MySQL/PostgreSQL/MongoDB session over MCP (stdio or
//! Streamable HTTP) and REST.

use db_gateway::config::{Config, TransportMode};
use db_gateway::db::{ConnectionRegistry, DefaultAdapterFactory};
use db_gateway::erd::ErdBuilder;
use db_gateway::logging::init_tracing;
use db_gateway::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    init_tracing(&config)?;

    info!(
        transport = %config.transport,
        "Starting Database Gateway v{}",
        env!("CARGO_PKG_VERSION")
    );

    let factory = Arc::new(DefaultAdapterFactory::new(config.adapter_settings()));
    let registry = Arc::new(ConnectionRegistry::new(
        factory,
        config.connect_timeout_duration(),
    ));
    let erd_builder = ErdBuilder::new(config.introspection_concurrency);

    // A failed startup connection leaves the gateway running disconnected
    match config.startup_engine_config() {
        Ok(Some(engine_config)) => {
            info!(engine = %engine_config.engine, "Opening startup connection");
            match registry.connect(engine_config).await {
                Ok(connection) => info!(
                    session_id = %connection.session_id,
                    "Startup connection established"
                ),
                Err(e) => warn!(error = %e, "Startup connection failed; waiting for connect requests"),
            }
        }
        Ok(None) => info!("No startup connection configured"),
        Err(e) => warn!(error = %e, "Invalid startup connection settings"),
    }

    let result = match config.transport {
        TransportMode::Stdio => {
            info!("Using stdio transport");
            StdioTransport::new(registry, erd_builder).run().await
        }
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            HttpTransport::new(
                registry,
                erd_builder,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            )
            .run()
            .await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
