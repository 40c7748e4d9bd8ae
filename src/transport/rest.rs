//! REST routes for browser clients.
//!
//! Every response body is an envelope:
//! `{"success": true, "data": ...}` or
//! `{"success": false, "error": {"kind", "message", "suggestion"?}}`.
//! Errors are display text for the client, never a crash signal.

use crate::db::ConnectionRegistry;
use crate::erd::ErdBuilder;
use crate::error::{EngineError, EngineResult, ErrorKind};
use crate::tools::{
    ConnectInput, ConnectionToolHandler, DescribeTableInput, ErdInput, ErdToolHandler,
    ExecuteInput, ImportInput, ImportToolHandler, ListTablesInput, PreviewTableInput,
    QueryToolHandler, SchemaToolHandler,
};
use axum::{
    Json, Router,
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Shared state for REST handlers.
#[derive(Clone)]
pub struct RestState {
    pub registry: Arc<ConnectionRegistry>,
    pub erd_builder: ErdBuilder,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: ErrorKind,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<String>,
}

#[derive(Debug, Serialize)]
struct Envelope<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

/// HTTP status for an error category.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotConnected | ErrorKind::StaleSession => StatusCode::CONFLICT,
        ErrorKind::InvalidInput | ErrorKind::QueryExecutionError => StatusCode::BAD_REQUEST,
        ErrorKind::UnsupportedOperation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::ConnectionRefused => StatusCode::BAD_GATEWAY,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Wrap a handler result in the response envelope.
pub fn respond<T: Serialize>(result: EngineResult<T>) -> Response {
    match result {
        Ok(data) => Json(Envelope {
            success: true,
            data: Some(data),
            error: None,
        })
        .into_response(),
        Err(err) => {
            let kind = err.kind();
            let status = status_for(kind);
            if status.is_server_error() {
                warn!(error = %err, "Request failed");
            }
            let body = Envelope::<()> {
                success: false,
                data: None,
                error: Some(ErrorBody {
                    kind,
                    message: err.to_string(),
                    suggestion: err.suggestion().map(str::to_string),
                }),
            };
            (status, Json(body)).into_response()
        }
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> EngineResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| EngineError::invalid_input(e.body_text()))
}

#[derive(Debug, Default, Deserialize)]
pub struct PreviewParams {
    pub limit: Option<usize>,
}

/// Build the REST router.
pub fn router(state: RestState) -> Router {
    Router::new()
        .route("/connect", post(connect))
        .route("/disconnect", post(disconnect))
        .route("/status", get(status))
        .route("/databases", get(list_databases))
        .route("/tables/{database}", get(list_tables))
        .route("/table/{database}/{table}", get(describe_table))
        .route("/table-data/{database}/{table}", get(preview_table))
        .route("/execute", post(execute))
        .route("/import", post(import))
        .route("/erd/{database}", get(erd))
        .with_state(state)
}

pub async fn connect(
    State(state): State<RestState>,
    payload: Result<Json<ConnectInput>, JsonRejection>,
) -> Response {
    let handler = ConnectionToolHandler::new(state.registry);
    let result = match body(payload) {
        Ok(input) => handler.connect(input).await,
        Err(e) => Err(e),
    };
    respond(result)
}

pub async fn disconnect(State(state): State<RestState>) -> Response {
    let handler = ConnectionToolHandler::new(state.registry);
    respond(Ok(handler.disconnect().await))
}

pub async fn status(State(state): State<RestState>) -> Response {
    let handler = ConnectionToolHandler::new(state.registry);
    respond(Ok(handler.status().await))
}

pub async fn list_databases(State(state): State<RestState>) -> Response {
    respond(SchemaToolHandler::new(state.registry).list_databases().await)
}

pub async fn list_tables(
    State(state): State<RestState>,
    Path(database): Path<String>,
) -> Response {
    let input = ListTablesInput {
        database: Some(database),
    };
    respond(SchemaToolHandler::new(state.registry).list_tables(input).await)
}

pub async fn describe_table(
    State(state): State<RestState>,
    Path((database, table)): Path<(String, String)>,
) -> Response {
    let input = DescribeTableInput {
        table,
        database: Some(database),
    };
    respond(SchemaToolHandler::new(state.registry).describe_table(input).await)
}

pub async fn preview_table(
    State(state): State<RestState>,
    Path((database, table)): Path<(String, String)>,
    params: Result<Query<PreviewParams>, QueryRejection>,
) -> Response {
    let params = match params {
        Ok(Query(params)) => params,
        Err(e) => return respond::<()>(Err(EngineError::invalid_input(e.body_text()))),
    };
    let input = PreviewTableInput {
        table,
        database: Some(database),
        limit: params.limit,
    };
    respond(SchemaToolHandler::new(state.registry).preview_table(input).await)
}

pub async fn execute(
    State(state): State<RestState>,
    payload: Result<Json<ExecuteInput>, JsonRejection>,
) -> Response {
    let handler = QueryToolHandler::new(state.registry);
    let result = match body(payload) {
        Ok(input) => handler.execute(input).await,
        Err(e) => Err(e),
    };
    respond(result)
}

pub async fn import(
    State(state): State<RestState>,
    payload: Result<Json<ImportInput>, JsonRejection>,
) -> Response {
    let handler = ImportToolHandler::new(state.registry);
    let result = match body(payload) {
        Ok(input) => handler.import(input).await,
        Err(e) => Err(e),
    };
    respond(result)
}

pub async fn erd(State(state): State<RestState>, Path(database): Path<String>) -> Response {
    let handler = ErdToolHandler::new(state.registry, state.erd_builder);
    let input = ErdInput {
        database: Some(database),
    };
    respond(handler.erd(input).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DefaultAdapterFactory;
    use serde_json::Value as JsonValue;
    use std::time::Duration;

    fn state() -> RestState {
        RestState {
            registry: Arc::new(ConnectionRegistry::new(
                Arc::new(DefaultAdapterFactory::default()),
                Duration::from_secs(1),
            )),
            erd_builder: ErdBuilder::default(),
        }
    }

    async fn read_json(response: Response) -> (StatusCode, JsonValue) {
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::NotConnected), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::StaleSession), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorKind::UnsupportedOperation),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(ErrorKind::ConnectionRefused), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorKind::Timeout), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let (status, body) = read_json(respond(Ok(vec!["shop"]))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"][0], "shop");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_error_envelope_carries_suggestion() {
        let err = EngineError::connection_refused("bad password", "Verify the username and password");
        let (status, body) = read_json(respond::<()>(Err(err))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["kind"], "connection_refused");
        assert_eq!(body["error"]["suggestion"], "Verify the username and password");
    }

    #[tokio::test]
    async fn test_status_route_when_disconnected() {
        let (status, body) = read_json(super::status(State(state())).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["connected"], false);
    }

    #[tokio::test]
    async fn test_list_databases_route_not_connected() {
        let (status, body) = read_json(list_databases(State(state())).await).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["kind"], "not_connected");
    }

    #[tokio::test]
    async fn test_erd_route_not_connected() {
        let response = erd(State(state()), Path("shop".to_string())).await;
        let (status, body) = read_json(response).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
    }
}
