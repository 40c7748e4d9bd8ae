//! Configuration handling for the database gateway.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use crate::models::{DEFAULT_ROW_LIMIT, EngineConfig, EngineKind, MAX_ROW_LIMIT};
use clap::{Parser, ValueEnum};
use std::time::Duration;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 3002;
pub const DEFAULT_MCP_ENDPOINT: &str = "/mcp";
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_INTROSPECTION_CONCURRENCY: usize = 4;

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

// Per-database pool defaults (PostgreSQL retargeting)
pub const DEFAULT_DATABASE_POOL_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_DATABASE_POOL_CLEANUP_INTERVAL_SECS: u64 = 60;

/// Connection pool configuration options.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PoolOptions {
    /// Maximum connections in pool (default: 10)
    pub max_connections: Option<u32>,
    /// Minimum connections in pool (default: 1)
    pub min_connections: Option<u32>,
    /// Idle timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Connection acquire timeout in seconds (default: 30). Callers block at
    /// most this long when the pool is exhausted.
    pub acquire_timeout_secs: Option<u64>,
    /// Whether to test connections before use (default: true)
    pub test_before_acquire: Option<bool>,
    /// Idle timeout for per-database pools in seconds (default: 600)
    pub database_pool_idle_timeout_secs: Option<u64>,
    /// Cleanup interval for per-database pools in seconds (default: 60)
    pub database_pool_cleanup_interval_secs: Option<u64>,
}

impl PoolOptions {
    /// Get max_connections with default value.
    pub fn max_connections_or_default(&self) -> u32 {
        self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS)
    }

    /// Get min_connections with default value.
    pub fn min_connections_or_default(&self) -> u32 {
        self.min_connections.unwrap_or(DEFAULT_MIN_CONNECTIONS)
    }

    /// Get idle_timeout with default value.
    pub fn idle_timeout_or_default(&self) -> u64 {
        self.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS)
    }

    /// Get acquire_timeout with default value.
    pub fn acquire_timeout_or_default(&self) -> u64 {
        self.acquire_timeout_secs
            .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS)
    }

    /// Get test_before_acquire with default value.
    pub fn test_before_acquire_or_default(&self) -> bool {
        self.test_before_acquire.unwrap_or(true)
    }

    /// Get database_pool_idle_timeout with default value.
    pub fn database_pool_idle_timeout_or_default(&self) -> u64 {
        self.database_pool_idle_timeout_secs
            .unwrap_or(DEFAULT_DATABASE_POOL_IDLE_TIMEOUT_SECS)
    }

    /// Get database_pool_cleanup_interval with default value.
    pub fn database_pool_cleanup_interval_or_default(&self) -> u64 {
        self.database_pool_cleanup_interval_secs
            .unwrap_or(DEFAULT_DATABASE_POOL_CLEANUP_INTERVAL_SECS)
    }

    /// Validate pool options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(max) = self.max_connections {
            if max == 0 {
                return Err("max_connections must be greater than 0".to_string());
            }
        }
        if let Some(min) = self.min_connections {
            if min > self.max_connections_or_default() {
                return Err(format!(
                    "min_connections ({}) cannot exceed max_connections ({})",
                    min,
                    self.max_connections_or_default()
                ));
            }
        }
        if self.acquire_timeout_secs == Some(0) {
            return Err("acquire_timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Runtime settings shared by every engine adapter.
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub pool: PoolOptions,
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
    /// Maximum rows materialized per execute
    pub row_limit: usize,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            pool: PoolOptions::default(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            row_limit: DEFAULT_ROW_LIMIT,
        }
    }
}

/// Transport mode for the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// MCP over standard input/output (for CLI integration)
    Stdio,
    /// HTTP: REST routes for the web client plus the MCP streamable-HTTP endpoint
    #[default]
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Configuration for the database gateway.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "db-gateway",
    about = "Multi-engine database gateway for MySQL, PostgreSQL and MongoDB",
    version,
    author
)]
pub struct Config {
    /// Transport mode (http or stdio)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "http",
        env = "GATEWAY_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_HTTP_HOST,
        env = "GATEWAY_HTTP_HOST"
    )]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "GATEWAY_HTTP_PORT"
    )]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_MCP_ENDPOINT,
        env = "GATEWAY_MCP_ENDPOINT"
    )]
    pub mcp_endpoint: String,

    /// Query timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        env = "GATEWAY_QUERY_TIMEOUT"
    )]
    pub query_timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "GATEWAY_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Maximum rows returned by a single execute
    #[arg(
        long,
        default_value_t = DEFAULT_ROW_LIMIT,
        env = "GATEWAY_ROW_LIMIT"
    )]
    pub row_limit: usize,

    /// Concurrent metadata queries issued while building an ERD
    #[arg(
        long,
        default_value_t = DEFAULT_INTROSPECTION_CONCURRENCY,
        env = "GATEWAY_INTROSPECTION_CONCURRENCY"
    )]
    pub introspection_concurrency: usize,

    /// Maximum connections per pool
    #[arg(long, env = "GATEWAY_MAX_CONNECTIONS")]
    pub max_connections: Option<u32>,

    /// Minimum connections per pool
    #[arg(long, env = "GATEWAY_MIN_CONNECTIONS")]
    pub min_connections: Option<u32>,

    /// Seconds a caller waits for a pooled connection before failing
    #[arg(long, env = "GATEWAY_ACQUIRE_TIMEOUT")]
    pub acquire_timeout: Option<u64>,

    /// Seconds an idle pooled connection is kept
    #[arg(long, env = "GATEWAY_IDLE_TIMEOUT")]
    pub idle_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "GATEWAY_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "GATEWAY_JSON_LOGS")]
    pub json_logs: bool,

    /// Engine to connect to at startup (mysql, postgres, mongodb)
    #[arg(long, env = "GATEWAY_ENGINE")]
    pub engine: Option<EngineKind>,

    /// Database host for the startup connection
    #[arg(long, env = "GATEWAY_DB_HOST")]
    pub db_host: Option<String>,

    /// Database port for the startup connection
    #[arg(long, env = "GATEWAY_DB_PORT")]
    pub db_port: Option<u16>,

    /// Database user for the startup connection
    #[arg(long, env = "GATEWAY_DB_USER")]
    pub db_user: Option<String>,

    /// Database password for the startup connection
    #[arg(long, env = "GATEWAY_DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// Default database for the startup connection
    #[arg(long, env = "GATEWAY_DB_NAME")]
    pub db_name: Option<String>,

    /// Full connection URI for the startup connection (overrides the parts above)
    #[arg(long, env = "GATEWAY_DB_URI", hide_env_values = true)]
    pub db_uri: Option<String>,

    /// Require TLS for the startup connection
    #[arg(long, env = "GATEWAY_DB_TLS")]
    pub db_tls: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            transport: TransportMode::Http,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            row_limit: DEFAULT_ROW_LIMIT,
            introspection_concurrency: DEFAULT_INTROSPECTION_CONCURRENCY,
            max_connections: None,
            min_connections: None,
            acquire_timeout: None,
            idle_timeout: None,
            log_level: "info".to_string(),
            json_logs: false,
            engine: None,
            db_host: None,
            db_port: None,
            db_user: None,
            db_password: None,
            db_name: None,
            db_uri: None,
            db_tls: false,
        }
    }

    /// Validate cross-field constraints that clap cannot express.
    pub fn validate(&self) -> Result<(), String> {
        self.pool_options().validate()?;
        if self.introspection_concurrency == 0 {
            return Err("introspection_concurrency must be greater than 0".to_string());
        }
        if self.row_limit == 0 || self.row_limit > MAX_ROW_LIMIT {
            return Err(format!(
                "row_limit must be between 1 and {}",
                MAX_ROW_LIMIT
            ));
        }
        if self.query_timeout == 0 || self.connect_timeout == 0 {
            return Err("timeouts must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            idle_timeout_secs: self.idle_timeout,
            acquire_timeout_secs: self.acquire_timeout,
            ..PoolOptions::default()
        }
    }

    pub fn adapter_settings(&self) -> AdapterSettings {
        AdapterSettings {
            pool: self.pool_options(),
            connect_timeout: self.connect_timeout_duration(),
            query_timeout: self.query_timeout_duration(),
            row_limit: self.row_limit,
        }
    }

    /// Build the startup connection, if one was requested.
    pub fn startup_engine_config(&self) -> Result<Option<EngineConfig>, String> {
        if let Some(uri) = self.db_uri.as_deref().filter(|s| !s.trim().is_empty()) {
            let mut config = EngineConfig::from_uri(uri).map_err(|e| e.to_string())?;
            if let Some(engine) = self.engine {
                config.engine = engine;
            }
            if let Some(db) = &self.db_name {
                config.database = Some(db.clone());
            }
            return Ok(Some(config));
        }

        let Some(engine) = self.engine else {
            return Ok(None);
        };

        Ok(Some(EngineConfig {
            engine,
            host: self.db_host.clone(),
            port: self.db_port,
            user: self.db_user.clone(),
            password: self.db_password.clone(),
            database: self.db_name.clone(),
            use_tls: self.db_tls,
            connection_uri: None,
        }))
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Get the query timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
