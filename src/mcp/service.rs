//! MCP service implementation using rmcp.
//!
//! This module defines the GatewayService struct with every gateway tool
//! exposed via the MCP protocol using the rmcp framework's macros.

use crate::db::{ConnectionRegistry, RegistryStatus};
use crate::erd::ErdBuilder;
use crate::models::QueryResult;
use crate::tools::{
    ConnectInput, ConnectOutput, ConnectionToolHandler, DescribeTableInput, DescribeTableOutput,
    DisconnectOutput, ErdInput, ErdOutput, ErdToolHandler, ExecuteInput, ExecuteOutput,
    ImportInput, ImportOutput, ImportToolHandler, ListDatabasesOutput, ListTablesInput,
    ListTablesOutput, PreviewTableInput, QueryToolHandler, SchemaToolHandler,
};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct GatewayService {
    /// The single active session shared by every transport
    registry: Arc<ConnectionRegistry>,
    erd_builder: ErdBuilder,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl GatewayService {
    pub fn new(registry: Arc<ConnectionRegistry>, erd_builder: ErdBuilder) -> Self {
        Self {
            registry,
            erd_builder,
            tool_router: Self::tool_router(),
        }
    }

    fn schema(&self) -> SchemaToolHandler {
        SchemaToolHandler::new(self.registry.clone())
    }
}

#[tool_router]
impl GatewayService {
    #[tool(
        description = "Connect to a MySQL, PostgreSQL or MongoDB server.\nReplaces the active session; the previous one is closed first.\nGive either `uri` or host/port/user/password/database.\nReturns a session_id usable with `execute`."
    )]
    async fn connect(
        &self,
        Parameters(input): Parameters<ConnectInput>,
    ) -> Result<Json<ConnectOutput>, McpError> {
        let handler = ConnectionToolHandler::new(self.registry.clone());
        Ok(Json(handler.connect(input).await?))
    }

    #[tool(description = "Close the active session. Safe to call when not connected.")]
    async fn disconnect(&self) -> Json<DisconnectOutput> {
        let handler = ConnectionToolHandler::new(self.registry.clone());
        Json(handler.disconnect().await)
    }

    #[tool(description = "Report whether a session is active and which engine it targets.")]
    async fn status(&self) -> Json<RegistryStatus> {
        let handler = ConnectionToolHandler::new(self.registry.clone());
        Json(handler.status().await)
    }

    #[tool(description = "List all databases on the connected server.")]
    async fn list_databases(&self) -> Result<Json<ListDatabasesOutput>, McpError> {
        Ok(Json(self.schema().list_databases().await?))
    }

    #[tool(
        description = "List tables (MySQL, PostgreSQL) or collections (MongoDB) with approximate row counts.\nDefaults to the session's database."
    )]
    async fn list_tables(
        &self,
        Parameters(input): Parameters<ListTablesInput>,
    ) -> Result<Json<ListTablesOutput>, McpError> {
        Ok(Json(self.schema().list_tables(input).await?))
    }

    #[tool(
        description = "Describe the columns of a table.\nFor MongoDB the fields are inferred from one sampled document."
    )]
    async fn describe_table(
        &self,
        Parameters(input): Parameters<DescribeTableInput>,
    ) -> Result<Json<DescribeTableOutput>, McpError> {
        Ok(Json(self.schema().describe_table(input).await?))
    }

    #[tool(description = "Return the first rows of a table or collection (default 100).")]
    async fn preview_table(
        &self,
        Parameters(input): Parameters<PreviewTableInput>,
    ) -> Result<Json<QueryResult>, McpError> {
        Ok(Json(self.schema().preview_table(input).await?))
    }

    #[tool(
        description = "Run a query against the active session.\nMySQL/PostgreSQL: a SQL string, executed verbatim.\nMongoDB: {\"collection\": \"users\", \"operation\": \"find\" | \"aggregate\" | \"insertOne\", ...params}.\nResults are capped by the row limit; `truncated` is set when rows were cut."
    )]
    async fn execute(
        &self,
        Parameters(input): Parameters<ExecuteInput>,
    ) -> Result<Json<ExecuteOutput>, McpError> {
        let handler = QueryToolHandler::new(self.registry.clone());
        Ok(Json(handler.execute(input).await?))
    }

    #[tool(
        description = "Import a script: its full text is submitted as one execute payload.\nGive the text in `script` or a file path in `path`."
    )]
    async fn import_script(
        &self,
        Parameters(input): Parameters<ImportInput>,
    ) -> Result<Json<ImportOutput>, McpError> {
        let handler = ImportToolHandler::new(self.registry.clone());
        Ok(Json(handler.import(input).await?))
    }

    #[tool(
        description = "Generate a Mermaid entity-relationship diagram from table columns and foreign keys.\nReturns status \"not_applicable\" for MongoDB."
    )]
    async fn erd(
        &self,
        Parameters(input): Parameters<ErdInput>,
    ) -> Result<Json<ErdOutput>, McpError> {
        let handler = ErdToolHandler::new(self.registry.clone(), self.erd_builder);
        let erd = handler.erd(input).await?;
        Ok(Json(ErdOutput { erd }))
    }
}

#[tool_handler]
impl ServerHandler for GatewayService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_owned(),
                title: Some("Database Gateway".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Gateway to one MySQL, PostgreSQL or MongoDB server at a time.\n\
                \n\
                ## Workflow\n\
                1. Call `connect` (or `status` to see if a session already exists)\n\
                2. Explore with `list_databases`, `list_tables`, `describe_table`, `preview_table`\n\
                3. Run queries with `execute`; pass the `session_id` from `connect` to fail\n\
                   instead of running against a newer session\n\
                4. `erd` renders a Mermaid diagram of a relational database\n\
                \n\
                ## Query Payloads\n\
                - MySQL/PostgreSQL: a SQL string, run verbatim\n\
                - MongoDB: an object with `collection`, `operation` (find, aggregate, insertOne)\n\
                  and its parameters (`filter`, `projection`, `sort`, `limit`, `pipeline`, `document`)\n\
                \n\
                ## Notes\n\
                - Only one session exists; `connect` replaces it\n\
                - MongoDB schemas are inferred from one sampled document\n\
                - `erd` returns `not_applicable` for MongoDB"
                    .to_string(),
            ),
        }
    }
}
