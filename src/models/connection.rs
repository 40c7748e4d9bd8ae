//! Connection-related data models.
//!
//! This module defines the engine kinds the gateway can talk to, the
//! configuration used to open a session, and the session identity returned
//! to callers.

use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Default MongoDB endpoint used when neither host nor URI is supplied.
pub const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017";

/// Supported engine kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Includes MariaDB
    #[serde(alias = "mariadb")]
    MySql,
    #[serde(alias = "postgresql")]
    Postgres,
    #[serde(alias = "mongo")]
    MongoDb,
}

impl EngineKind {
    /// Parse engine kind from a connection string scheme.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.trim().to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::Postgres)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySql)
        } else if lower.starts_with("mongodb://") || lower.starts_with("mongodb+srv://") {
            Some(Self::MongoDb)
        } else {
            None
        }
    }

    /// Get the display name for this engine kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::Postgres => "PostgreSQL",
            Self::MongoDb => "MongoDB",
        }
    }

    /// URL scheme used when building a connection string from parts.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::MongoDb => "mongodb",
        }
    }

    /// Get the default port for this engine kind.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::Postgres => 5432,
            Self::MongoDb => 27017,
        }
    }

    pub fn is_relational(&self) -> bool {
        !matches!(self, Self::MongoDb)
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mongodb" | "mongo" => Ok(Self::MongoDb),
            other => Err(format!(
                "unknown engine '{}': expected mysql, postgres or mongodb",
                other
            )),
        }
    }
}

/// Configuration for a gateway session.
///
/// Immutable once bound to an active session; replacing it triggers a full
/// reconnect. Field aliases accept the payload shape of the web client
/// (`type`, `uri`).
#[derive(Clone, Serialize, Deserialize, JsonSchema)]
pub struct EngineConfig {
    /// Engine kind: "mysql", "postgres" or "mongodb"
    #[serde(alias = "type", alias = "engine_kind")]
    pub engine: EngineKind,
    /// Server host (default: localhost)
    #[serde(default)]
    pub host: Option<String>,
    /// Server port (default: engine default port)
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default, alias = "username")]
    pub user: Option<String>,
    /// Contains sensitive data - never log
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Default database for the session
    #[serde(default, alias = "databaseName")]
    pub database: Option<String>,
    /// Require TLS on the wire
    #[serde(default, alias = "useTLS")]
    pub use_tls: bool,
    /// Full connection URI. Takes precedence over the individual fields.
    /// Contains sensitive data - never log
    #[serde(default, alias = "uri", alias = "connectionURI", skip_serializing)]
    pub connection_uri: Option<String>,
}

impl EngineConfig {
    /// Create a configuration for the given engine with every other field defaulted.
    pub fn new(engine: EngineKind) -> Self {
        Self {
            engine,
            host: None,
            port: None,
            user: None,
            password: None,
            database: None,
            use_tls: false,
            connection_uri: None,
        }
    }

    /// Create a configuration from a full connection URI.
    pub fn from_uri(uri: impl Into<String>) -> EngineResult<Self> {
        let uri = uri.into();
        let engine = EngineKind::from_connection_string(&uri).ok_or_else(|| {
            EngineError::invalid_input(
                "Unknown connection URI scheme: expected mysql://, postgres:// or mongodb://",
            )
        })?;
        let database = Url::parse(&uri).ok().and_then(|url| {
            url.path()
                .trim_start_matches('/')
                .split('/')
                .next()
                .filter(|s| !s.is_empty())
                .map(String::from)
        });
        Ok(Self {
            database,
            connection_uri: Some(uri),
            ..Self::new(engine)
        })
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// The configured default database, ignoring empty strings.
    pub fn default_database(&self) -> Option<&str> {
        self.database.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Build the driver connection URL.
    ///
    /// An explicit `connection_uri` wins; its scheme must match `engine`.
    /// With `use_tls` the engine's TLS parameter is added to either form
    /// unless the URI already carries one.
    pub fn connection_url(&self) -> EngineResult<String> {
        if self.use_tls && self.engine.is_relational() && !RELATIONAL_TLS_AVAILABLE {
            return Err(EngineError::invalid_input(format!(
                "TLS requested for {} but this build has no TLS support; \
                 rebuild with --features tls-native or --features tls-rustls",
                self.engine
            )));
        }

        if let Some(uri) = self
            .connection_uri
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return match EngineKind::from_connection_string(uri) {
                Some(kind) if kind == self.engine => Ok(if self.use_tls {
                    with_tls_param(uri, self.engine)
                } else {
                    uri.to_string()
                }),
                Some(kind) => Err(EngineError::invalid_input(format!(
                    "Connection URI is for {} but engine is {}",
                    kind, self.engine
                ))),
                None => Err(EngineError::invalid_input(
                    "Unknown connection URI scheme: expected mysql://, postgres:// or mongodb://",
                )),
            };
        }

        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        if self.engine == EngineKind::MongoDb
            && host.is_none()
            && self.port.is_none()
            && self.user.is_none()
        {
            return Ok(DEFAULT_MONGODB_URI.to_string());
        }

        let host = host.unwrap_or("localhost");
        let mut url = Url::parse(&format!("{}://{}", self.engine.scheme(), host))
            .map_err(|e| EngineError::invalid_input(format!("Invalid host '{}': {}", host, e)))?;

        let invalid = |what: &str| EngineError::invalid_input(format!("Cannot set {} on URL", what));
        url.set_port(Some(self.port.unwrap_or(self.engine.default_port())))
            .map_err(|_| invalid("port"))?;
        if let Some(user) = self.user.as_deref().filter(|s| !s.is_empty()) {
            url.set_username(user).map_err(|_| invalid("user"))?;
            if let Some(password) = self.password.as_deref().filter(|s| !s.is_empty()) {
                url.set_password(Some(password))
                    .map_err(|_| invalid("password"))?;
            }
        }

        match self.engine {
            EngineKind::MySql | EngineKind::Postgres => {
                if let Some(db) = self.default_database() {
                    url.set_path(&format!("/{}", db));
                }
            }
            // The path of a MongoDB URI names the auth database, not the working one.
            EngineKind::MongoDb => url.set_path("/"),
        }

        if self.use_tls {
            let (key, value) = tls_param(self.engine);
            url.query_pairs_mut().append_pair(key, value);
        }

        Ok(url.to_string())
    }

    /// Get a display-safe version of the connection URL (credentials masked).
    pub fn masked_connection_url(&self) -> String {
        match self.connection_url() {
            Ok(raw) => match Url::parse(&raw) {
                Ok(mut url) => {
                    if url.password().is_some() {
                        let _ = url.set_password(Some("****"));
                    }
                    url.to_string()
                }
                Err(_) => format!("{}://****", self.engine.scheme()),
            },
            Err(_) => format!("{}://<invalid>", self.engine.scheme()),
        }
    }
}

/// Whether sqlx was built with a TLS backend.
const RELATIONAL_TLS_AVAILABLE: bool = cfg!(any(feature = "tls-native", feature = "tls-rustls"));

/// Query keys the drivers read as a TLS setting.
const TLS_QUERY_KEYS: &[&str] = &["ssl-mode", "sslmode", "ssl_mode", "ssl", "tls"];

fn tls_param(engine: EngineKind) -> (&'static str, &'static str) {
    match engine {
        EngineKind::MySql => ("ssl-mode", "REQUIRED"),
        EngineKind::Postgres => ("sslmode", "require"),
        EngineKind::MongoDb => ("tls", "true"),
    }
}

/// Append the engine's TLS parameter to a user URI.
///
/// Works on the raw string: MongoDB seed lists (`host1,host2`) are not valid
/// `Url` authorities. An explicit TLS setting in the URI is left untouched.
fn with_tls_param(uri: &str, engine: EngineKind) -> String {
    let (base, query) = match uri.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (uri, None),
    };

    let already_set = query
        .into_iter()
        .flat_map(|q| q.split('&'))
        .filter_map(|pair| pair.split('=').next())
        .any(|key| TLS_QUERY_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key)));
    if already_set {
        return uri.to_string();
    }

    let (key, value) = tls_param(engine);
    match query {
        Some(q) if !q.is_empty() => format!("{}&{}={}", uri, key, value),
        Some(_) => format!("{}{}={}", uri, key, value),
        None => {
            let authority = base.split_once("://").map(|(_, rest)| rest).unwrap_or(base);
            // MongoDB options must follow a path separator
            let slash = if engine == EngineKind::MongoDb && !authority.contains('/') {
                "/"
            } else {
                ""
            };
            format!("{}{}?{}={}", base, slash, key, value)
        }
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("database", &self.database)
            .field("use_tls", &self.use_tls)
            .field(
                "connection_uri",
                &self.connection_uri.as_ref().map(|_| self.masked_connection_url()),
            )
            .finish()
    }
}

/// Identity of one bound session. A new id is minted on every successful connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| EngineError::invalid_input(format!("Invalid session id '{}': {}", s, e)))
    }
}

/// Information about the active session, returned after a successful connect.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ConnectionInfo {
    pub session_id: SessionId,
    pub engine: EngineKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Default database of the session, if one was configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    pub connected_at: DateTime<Utc>,
}
