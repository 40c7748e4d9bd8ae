//! Script import tool.
//!
//! The full script text is submitted as a single `execute` payload. It is not
//! split or validated statement by statement; MySQL and PostgreSQL run the
//! statements in sequence and the affected-row counts are summed.

use crate::db::ConnectionRegistry;
use crate::error::{EngineError, EngineResult};
use crate::models::QueryResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Input for the import_script tool. Exactly one of `script` or `path`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ImportInput {
    /// Script text: SQL statements, or one MongoDB operation descriptor
    #[serde(default)]
    pub script: Option<String>,
    /// Path of a script file readable by the gateway process
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

/// Output from the import_script tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ImportOutput {
    /// Size of the submitted script
    pub bytes: usize,
    #[serde(flatten)]
    pub result: QueryResult,
}

/// Read a script file as UTF-8 text.
pub async fn read_script(path: impl AsRef<Path>) -> EngineResult<String> {
    let path = path.as_ref();
    tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            EngineError::not_found(format!("script file '{}'", path.display()))
        }
        std::io::ErrorKind::InvalidData => EngineError::invalid_input(format!(
            "Script file '{}' is not valid UTF-8",
            path.display()
        )),
        _ => EngineError::invalid_input(format!(
            "Cannot read script file '{}': {}",
            path.display(),
            e
        )),
    })
}

pub struct ImportToolHandler {
    registry: Arc<ConnectionRegistry>,
}

impl ImportToolHandler {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub async fn import(&self, input: ImportInput) -> EngineResult<ImportOutput> {
        let script = match (input.script, input.path.as_deref()) {
            (Some(script), None) => script,
            (None, Some(path)) => read_script(path).await?,
            (Some(_), Some(_)) => {
                return Err(EngineError::invalid_input(
                    "Provide either 'script' or 'path', not both",
                ));
            }
            (None, None) => {
                return Err(EngineError::invalid_input(
                    "Provide the script text in 'script' or a file in 'path'",
                ));
            }
        };

        let bytes = script.len();
        let result = self
            .registry
            .import_script(&script, input.database.as_deref())
            .await?;

        info!(
            bytes,
            rows_affected = ?result.rows_affected,
            "Script imported"
        );
        Ok(ImportOutput { bytes, result })
    }
}
