//! ERD generation tool.

use crate::db::ConnectionRegistry;
use crate::erd::{ErdBuilder, ErdOutcome};
use crate::error::EngineResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Input for the erd tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ErdInput {
    /// Database to diagram. Defaults to the session's database.
    #[serde(default)]
    pub database: Option<String>,
}

/// Output from the erd tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ErdOutput {
    pub erd: ErdOutcome,
}

pub struct ErdToolHandler {
    registry: Arc<ConnectionRegistry>,
    builder: ErdBuilder,
}

impl ErdToolHandler {
    pub fn new(registry: Arc<ConnectionRegistry>, builder: ErdBuilder) -> Self {
        Self { registry, builder }
    }

    /// The whole pipeline runs under one lease, so a concurrent reconnect
    /// cannot mix two sessions into one diagram.
    pub async fn erd(&self, input: ErdInput) -> EngineResult<ErdOutcome> {
        let lease = self.registry.lease(None).await?;
        self.builder.build(&lease, input.database.as_deref()).await
    }
}
