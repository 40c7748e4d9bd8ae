//! HTTP transport: REST routes plus MCP over Streamable HTTP.
//!
//! One axum server carries both surfaces. They share the same
//! `ConnectionRegistry`, so a session opened over REST is visible to MCP
//! clients and the other way round.

use crate::db::ConnectionRegistry;
use crate::erd::ErdBuilder;
use crate::error::{EngineError, EngineResult};
use crate::mcp::GatewayService;
use crate::transport::rest::{self, RestState};
use crate::transport::{Transport, wait_for_signal};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// HTTP transport implementation.
///
/// This transport provides:
/// - REST routes (`/connect`, `/tables/{database}`, `/erd/{database}`, ...)
/// - MCP protocol messages at the configured endpoint, with SSE streaming
pub struct HttpTransport {
    registry: Arc<ConnectionRegistry>,
    erd_builder: ErdBuilder,
    /// Host to bind to
    host: String,
    /// Port to bind to
    port: u16,
    /// MCP endpoint path
    endpoint: String,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    ///
    /// # Arguments
    ///
    /// * `registry` - The shared session registry
    /// * `erd_builder` - ERD pipeline settings
    /// * `host` - Host address to bind to
    /// * `port` - Port to bind to
    /// * `endpoint` - MCP endpoint path (e.g., "/mcp")
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        erd_builder: ErdBuilder,
        host: impl Into<String>,
        port: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            erd_builder,
            host: host.into(),
            port,
            endpoint: endpoint.into(),
        }
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the MCP endpoint path.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// REST routes with the MCP service nested at the endpoint.
    pub fn app(&self) -> axum::Router {
        let registry = self.registry.clone();
        let erd_builder = self.erd_builder;
        let service = StreamableHttpService::new(
            move || Ok(GatewayService::new(registry.clone(), erd_builder)),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        let rest = rest::router(RestState {
            registry: self.registry.clone(),
            erd_builder: self.erd_builder,
        });

        // nest_service doesn't support the root path; use fallback_service there
        let app = if self.endpoint == "/" {
            rest.fallback_service(service)
        } else {
            rest.nest_service(&self.endpoint, service)
        };

        app.layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> EngineResult<()> {
        let bind_addr = self.bind_addr();
        info!("Starting gateway with HTTP transport on {}", bind_addr);

        let app = self.app();
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            EngineError::internal(format!(
                "Failed to bind to {}: {}. Check that the port is available",
                bind_addr, e
            ))
        })?;

        info!(endpoint = %self.endpoint, "MCP endpoint and REST routes ready");

        // SSE connections may keep the server alive indefinitely
        const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();
        let shutdown_signal = async move {
            wait_for_signal().await;
            shutdown_notify_clone.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        self.registry.close().await;
                        return Err(EngineError::internal(format!("HTTP server error: {}", e)));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for connections to close (send signal again to force exit)..."
                );

                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        info!("Closing the active session");
        self.registry.close().await;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
