//! REST handlers driven against the in-memory adapter.

mod common;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use common::{MockBehavior, column, mock_registry};
use db_gateway::erd::ErdBuilder;
use db_gateway::models::Relationship;
use db_gateway::tools::{ConnectInput, ExecuteInput};
use db_gateway::transport::rest::{self, PreviewParams, RestState};
use serde_json::{Value as JsonValue, json};
use std::collections::HashMap;

async fn read_json(response: Response) -> (StatusCode, JsonValue) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn state(behavior: MockBehavior) -> RestState {
    let (registry, _) = mock_registry(behavior);
    RestState {
        registry,
        erd_builder: ErdBuilder::default(),
    }
}

fn connect_input(body: JsonValue) -> ConnectInput {
    serde_json::from_value(body).unwrap()
}

#[tokio::test]
async fn test_connect_then_status() {
    let state = state(MockBehavior::default());

    let input = connect_input(json!({"type": "mysql", "host": "db", "databaseName": "shop"}));
    let (status, body) = read_json(rest::connect(State(state.clone()), Ok(Json(input))).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["connection"]["engine"], "mysql");

    let (_, body) = read_json(rest::status(State(state.clone())).await).await;
    assert_eq!(body["data"]["connected"], true);
    assert_eq!(body["data"]["session"]["database"], "shop");

    let (_, body) = read_json(rest::disconnect(State(state.clone())).await).await;
    assert_eq!(body["data"]["disconnected"], true);
}

#[tokio::test]
async fn test_connect_refused_maps_to_bad_gateway() {
    let state = state(MockBehavior {
        refuse_connect: true,
        ..Default::default()
    });

    let input = connect_input(json!({"type": "postgres", "host": "db"}));
    let (status, body) = read_json(rest::connect(State(state), Ok(Json(input))).await).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["kind"], "connection_refused");
    assert!(body["error"]["suggestion"].is_string());
}

#[tokio::test]
async fn test_tables_and_describe_routes() {
    let state = state(MockBehavior {
        tables: vec![(
            "users".to_string(),
            vec![column("id", "int", false), column("email", "varchar", true)],
        )],
        ..Default::default()
    });
    let input = connect_input(json!({"type": "mysql", "host": "db"}));
    rest::connect(State(state.clone()), Ok(Json(input))).await;

    let (status, body) =
        read_json(rest::list_tables(State(state.clone()), Path("shop".to_string())).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["tables"][0]["name"], "users");

    let path = Path(("shop".to_string(), "users".to_string()));
    let (_, body) = read_json(rest::describe_table(State(state.clone()), path).await).await;
    assert_eq!(body["data"]["columns"][1]["name"], "email");
    assert_eq!(body["data"]["columns"][1]["nullable"], true);

    let path = Path(("shop".to_string(), "missing".to_string()));
    let (status, body) = read_json(rest::describe_table(State(state.clone()), path).await).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");

    let path = Path(("shop".to_string(), "users".to_string()));
    let params = Ok(Query(PreviewParams { limit: Some(10) }));
    let (status, _) = read_json(rest::preview_table(State(state), path, params).await).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_execute_route_stale_session() {
    let state = state(MockBehavior::default());
    let input = connect_input(json!({"type": "mysql", "host": "db"}));
    let (_, first) = read_json(rest::connect(State(state.clone()), Ok(Json(input))).await).await;
    let input = connect_input(json!({"type": "mysql", "host": "db"}));
    rest::connect(State(state.clone()), Ok(Json(input))).await;

    let stale: ExecuteInput = serde_json::from_value(json!({
        "query": "SELECT 1",
        "session_id": first["data"]["connection"]["session_id"],
    }))
    .unwrap();
    let (status, body) = read_json(rest::execute(State(state.clone()), Ok(Json(stale))).await).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "stale_session");

    let fresh: ExecuteInput = serde_json::from_value(json!({"sql": "SELECT 1"})).unwrap();
    let (status, body) = read_json(rest::execute(State(state), Ok(Json(fresh))).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["row_count"], 1);
}

#[tokio::test]
async fn test_execute_route_unsupported_document_operation() {
    let state = state(MockBehavior::default());
    let input = connect_input(json!({"type": "mongodb", "uri": "mongodb://db:27017/shop"}));
    rest::connect(State(state.clone()), Ok(Json(input))).await;

    let input: ExecuteInput = serde_json::from_value(json!({
        "query": {"collection": "users", "operation": "deleteMany"}
    }))
    .unwrap();
    let (status, body) = read_json(rest::execute(State(state), Ok(Json(input))).await).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "unsupported_operation");
}

#[tokio::test]
async fn test_erd_route_renders_diagram() {
    let mut relationships = HashMap::new();
    relationships.insert(
        "orders".to_string(),
        vec![Relationship::new("orders", "user_id", "users", "id")],
    );
    let state = state(MockBehavior {
        tables: vec![
            ("orders".to_string(), vec![column("user_id", "int", false)]),
            ("users".to_string(), vec![column("id", "int", false)]),
        ],
        relationships,
        ..Default::default()
    });
    let input = connect_input(json!({"type": "postgres", "host": "db"}));
    rest::connect(State(state.clone()), Ok(Json(input))).await;

    let (status, body) = read_json(rest::erd(State(state), Path("shop".to_string())).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "rendered");
    let source = body["data"]["diagram"]["source"].as_str().unwrap();
    assert!(source.starts_with("erDiagram\n"));
    assert!(source.ends_with("    orders ||--o{ users : \"references\"\n"));
}
