//! Error types for the database gateway.
//!
//! Every failure in the gateway is returned as an [`EngineError`]. Nothing here
//! is fatal to the process: the presentation layers turn these into
//! `{success: false, error}` payloads or MCP error responses.

use serde::Serialize;
use thiserror::Error;

/// Coarse error category exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConnectionRefused,
    NotConnected,
    StaleSession,
    UnsupportedOperation,
    QueryExecutionError,
    InvalidInput,
    NotFound,
    Timeout,
    Internal,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Connection refused: {message}")]
    ConnectionRefused { message: String, suggestion: String },

    #[error("Not connected: call connect before issuing database operations")]
    NotConnected,

    #[error("Session {expected} is no longer active (current session: {current})")]
    StaleSession { expected: String, current: String },

    #[error("Unsupported operation: {operation} - {reason}")]
    UnsupportedOperation { operation: String, reason: String },

    #[error("Query failed: {message}")]
    QueryExecution {
        message: String,
        /// Driver error code, e.g. "42P01" or a MongoDB command code
        code: Option<String>,
    },

    #[error("Invalid identifier '{identifier}': only letters, digits and underscores are allowed")]
    InvalidIdentifier { identifier: String },

    #[error("Not found: {object}")]
    NotFound { object: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl EngineError {
    /// Create a connection refused error with a helpful suggestion.
    pub fn connection_refused(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConnectionRefused {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn stale_session(expected: impl Into<String>, current: impl Into<String>) -> Self {
        Self::StaleSession {
            expected: expected.into(),
            current: current.into(),
        }
    }

    /// Create an unsupported operation error.
    pub fn unsupported(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a query execution error, passing the driver message through verbatim.
    pub fn query(message: impl Into<String>, code: Option<String>) -> Self {
        Self::QueryExecution {
            message: message.into(),
            code,
        }
    }

    pub fn invalid_identifier(identifier: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            identifier: identifier.into(),
        }
    }

    pub fn not_found(object: impl Into<String>) -> Self {
        Self::NotFound {
            object: object.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConnectionRefused { .. } => ErrorKind::ConnectionRefused,
            Self::NotConnected => ErrorKind::NotConnected,
            Self::StaleSession { .. } => ErrorKind::StaleSession,
            Self::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
            Self::QueryExecution { .. } => ErrorKind::QueryExecutionError,
            Self::InvalidIdentifier { .. } | Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::ConnectionRefused { suggestion, .. } => Some(suggestion),
            Self::NotConnected => Some("Connect to a database first"),
            Self::StaleSession { .. } => {
                Some("The connection was replaced; refresh the session id and retry")
            }
            Self::InvalidIdentifier { .. } => {
                Some("Rename the object or query it through execute with explicit quoting")
            }
            _ => None,
        }
    }
}

/// Convert sqlx errors to EngineError.
impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => EngineError::connection_refused(
                msg.to_string(),
                "Check the connection settings and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                EngineError::query(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => EngineError::query("No rows returned", None),
            sqlx::Error::PoolTimedOut => EngineError::timeout("connection pool acquire", 0),
            sqlx::Error::PoolClosed => EngineError::NotConnected,
            sqlx::Error::Io(io_err) => EngineError::connection_refused(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => EngineError::connection_refused(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration or disable use_tls",
            ),
            sqlx::Error::Protocol(msg) => EngineError::connection_refused(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                EngineError::query(format!("Column not found: {}", col), None)
            }
            sqlx::Error::ColumnDecode { index, source } => {
                EngineError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                EngineError::internal(format!("Decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => EngineError::internal("Database worker crashed"),
            _ => EngineError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Convert MongoDB driver errors to EngineError.
impl From<mongodb::error::Error> for EngineError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind as MongoKind;

        match err.kind.as_ref() {
            MongoKind::Authentication { .. } => EngineError::connection_refused(
                err.to_string(),
                "Verify the username, password and authentication database",
            ),
            MongoKind::ServerSelection { .. } | MongoKind::Io(_) | MongoKind::DnsResolve { .. } => {
                EngineError::connection_refused(
                    err.to_string(),
                    "Check that the MongoDB server is running and reachable",
                )
            }
            MongoKind::Command(command) => {
                EngineError::query(command.message.clone(), Some(command.code.to_string()))
            }
            MongoKind::InvalidArgument { .. } => EngineError::invalid_input(err.to_string()),
            _ => EngineError::query(err.to_string(), None),
        }
    }
}

/// Result type alias for gateway operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Build suggestion data as JSON value.
fn suggestion_data(suggestion: Option<&str>) -> Option<serde_json::Value> {
    suggestion.map(|s| serde_json::json!({ "suggestion": s }))
}

/// Convert EngineError to MCP ErrorData for semantic error categorization.
impl From<EngineError> for rmcp::ErrorData {
    fn from(err: EngineError) -> Self {
        let data = suggestion_data(err.suggestion());
        match &err {
            EngineError::InvalidInput { .. }
            | EngineError::InvalidIdentifier { .. }
            | EngineError::UnsupportedOperation { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), data)
            }
            EngineError::QueryExecution { message, code } => {
                let msg = match code {
                    Some(code) => format!("{} (code: {})", message, code),
                    None => message.clone(),
                };
                rmcp::ErrorData::invalid_params(msg, data)
            }
            EngineError::NotConnected
            | EngineError::StaleSession { .. }
            | EngineError::NotFound { .. } => {
                rmcp::ErrorData::resource_not_found(err.to_string(), data)
            }
            EngineError::ConnectionRefused { .. }
            | EngineError::Timeout { .. }
            | EngineError::Internal { .. } => rmcp::ErrorData::internal_error(err.to_string(), data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::connection_refused("Access denied", "Check credentials");
        assert!(err.to_string().contains("Connection refused"));
        assert_eq!(err.kind(), ErrorKind::ConnectionRefused);
    }

    #[test]
    fn test_query_error_passes_message_verbatim() {
        let err = EngineError::query("Table 'shop.nope' doesn't exist", Some("42S02".into()));
        assert_eq!(err.kind(), ErrorKind::QueryExecutionError);
        assert!(err.to_string().contains("Table 'shop.nope' doesn't exist"));
    }

    #[test]
    fn test_identifier_error_is_invalid_input() {
        let err = EngineError::invalid_identifier("users; DROP");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_pool_closed_maps_to_not_connected() {
        let err: EngineError = sqlx::Error::PoolClosed.into();
        assert_eq!(err.kind(), ErrorKind::NotConnected);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::UnsupportedOperation).unwrap();
        assert_eq!(json, "\"unsupported_operation\"");
    }

    #[test]
    fn test_invalid_input_maps_to_invalid_params() {
        let mcp_err: rmcp::ErrorData = EngineError::invalid_input("bad input").into();
        assert_eq!(mcp_err.code.0, -32602);
    }

    #[test]
    fn test_unsupported_maps_to_invalid_params() {
        let mcp_err: rmcp::ErrorData = EngineError::unsupported("deleteMany", "not allowed").into();
        assert_eq!(mcp_err.code.0, -32602);
    }

    #[test]
    fn test_not_connected_maps_to_resource_not_found() {
        let mcp_err: rmcp::ErrorData = EngineError::NotConnected.into();
        assert_eq!(mcp_err.code.0, -32002);
        assert_eq!(mcp_err.data.unwrap()["suggestion"], "Connect to a database first");
    }

    #[test]
    fn test_connection_maps_to_internal_error() {
        let mcp_err: rmcp::ErrorData = EngineError::connection_refused("failed", "try again").into();
        assert_eq!(mcp_err.code.0, -32603);
        assert_eq!(mcp_err.data.unwrap()["suggestion"], "try again");
    }

    #[test]
    fn test_query_error_includes_code() {
        let mcp_err: rmcp::ErrorData =
            EngineError::query("syntax error", Some("42601".to_string())).into();
        assert!(mcp_err.message.contains("42601"));
    }
}
