//! ERD rendering and pipeline tests.

mod common;

use common::{MockBehavior, column, mock_registry, mysql_config};
use db_gateway::db::normalize::{RawColumn, normalize_columns};
use db_gateway::erd::{EMPTY_DIAGRAM, ErdBuilder, ErdOutcome, render};
use db_gateway::tools::{ErdInput, ErdToolHandler};
use db_gateway::models::{ColumnDescriptor, EngineConfig, EngineKind, Relationship, TableDescriptor};
use std::collections::HashMap;
use std::time::Duration;

fn raw(name: &str, column_type: &str) -> RawColumn {
    RawColumn {
        name: name.to_string(),
        column_type: column_type.to_string(),
        is_nullable: "NO".to_string(),
        is_primary_key: name == "id",
    }
}

#[test]
fn test_render_orders_users_example() {
    let users = TableDescriptor::new("users", normalize_columns(vec![raw("id", "int(11)")]));
    let orders = TableDescriptor::new(
        "orders",
        normalize_columns(vec![raw("id", "int(11)"), raw("user_id", "int(11)")]),
    );
    let relationships = vec![Relationship::new("orders", "user_id", "users", "id")];

    let doc = render(&[orders, users], &relationships);

    assert_eq!(
        doc.source,
        "erDiagram\n    orders {\n        int id\n        int user_id\n    }\n    users {\n        int id\n    }\n    orders ||--o{ users : \"references\"\n"
    );
    assert!(!doc.has_diagnostics());
}

#[test]
fn test_render_simplifies_unnormalized_descriptors() {
    let users = TableDescriptor::new("users", vec![ColumnDescriptor::new("id", "int(11)", false)]);
    let orders = TableDescriptor::new(
        "orders",
        vec![
            ColumnDescriptor::new("id", "int(11)", false),
            ColumnDescriptor::new("user_id", "int(11)", true),
        ],
    );
    let relationships = vec![Relationship::new("orders", "user_id", "users", "id")];

    let doc = render(&[orders, users], &relationships);

    assert_eq!(
        doc.source,
        "erDiagram\n    orders {\n        int id\n        int user_id\n    }\n    users {\n        int id\n    }\n    orders ||--o{ users : \"references\"\n"
    );
}

#[test]
fn test_render_is_deterministic() {
    let tables = vec![
        TableDescriptor::new("order-items", vec![column("qty", "int", false)]),
        TableDescriptor::new("orders", vec![column("id", "bigint", false)]),
    ];
    let relationships = vec![Relationship::new("order-items", "order_id", "orders", "id")];

    let first = render(&tables, &relationships);
    let second = render(&tables, &relationships);
    assert_eq!(first, second);
    assert!(first.source.contains("order_items ||--o{ orders : \"references\""));
}

#[test]
fn test_render_without_tables_is_marker() {
    assert_eq!(render(&[], &[]).source, EMPTY_DIAGRAM);
}

#[test]
fn test_render_without_relationships_has_no_edges() {
    let tables = vec![TableDescriptor::new(
        "users",
        vec![column("id", "int", false)],
    )];
    let doc = render(&tables, &[]);
    assert!(!doc.source.contains("||--o{"));
}

#[test]
fn test_render_reports_table_collision() {
    let tables = vec![
        TableDescriptor::new("order items", vec![]),
        TableDescriptor::new("order-items", vec![]),
    ];
    let doc = render(&tables, &[]);
    assert_eq!(doc.diagnostics.len(), 1);
    assert_eq!(doc.diagnostics[0].sanitized, "order_items");
    assert_eq!(doc.diagnostics[0].table, None);
}

fn shop_behavior() -> MockBehavior {
    let mut relationships = HashMap::new();
    relationships.insert(
        "orders".to_string(),
        vec![Relationship::new("orders", "user_id", "users", "id")],
    );
    // the first table is the slowest, so completion order differs from input order
    let mut delays = HashMap::new();
    delays.insert("orders".to_string(), Duration::from_millis(80));
    delays.insert("users".to_string(), Duration::from_millis(10));

    MockBehavior {
        tables: vec![
            (
                "orders".to_string(),
                vec![column("id", "int", false), column("user_id", "int", false)],
            ),
            ("users".to_string(), vec![column("id", "int", false)]),
        ],
        relationships,
        delays,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_builder_keeps_listing_order() {
    let (registry, _) = mock_registry(shop_behavior());
    registry.connect(mysql_config()).await.unwrap();
    let lease = registry.lease(None).await.unwrap();

    let outcome = ErdBuilder::new(4).build(&lease, Some("shop")).await.unwrap();
    let ErdOutcome::Rendered {
        diagram,
        table_count,
        relationship_count,
    } = outcome
    else {
        panic!("relational engine should render");
    };

    assert_eq!(table_count, 2);
    assert_eq!(relationship_count, 1);
    assert_eq!(
        diagram.source,
        "erDiagram\n    orders {\n        int id\n        int user_id\n    }\n    users {\n        int id\n    }\n    orders ||--o{ users : \"references\"\n"
    );
}

#[tokio::test]
async fn test_erd_handler_runs_on_spawned_task() {
    let (registry, log) = mock_registry(shop_behavior());
    registry.connect(mysql_config()).await.unwrap();
    let handler = ErdToolHandler::new(registry, ErdBuilder::new(4));

    let outcome = tokio::spawn(async move { handler.erd(ErdInput::default()).await })
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(
        outcome,
        ErdOutcome::Rendered {
            table_count: 2,
            relationship_count: 1,
            ..
        }
    ));
    assert_eq!(log.count("describe"), 2);
    assert_eq!(log.count("relationships"), 2);
}

#[tokio::test]
async fn test_builder_sequential_matches_concurrent() {
    let (registry, _) = mock_registry(shop_behavior());
    registry.connect(mysql_config()).await.unwrap();
    let lease = registry.lease(None).await.unwrap();

    let sequential = ErdBuilder::new(1).build(&lease, None).await.unwrap();
    let concurrent = ErdBuilder::new(8).build(&lease, None).await.unwrap();

    let (
        ErdOutcome::Rendered { diagram: a, .. },
        ErdOutcome::Rendered { diagram: b, .. },
    ) = (sequential, concurrent)
    else {
        panic!("relational engine should render");
    };
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_builder_empty_database() {
    let (registry, _) = mock_registry(MockBehavior::default());
    registry.connect(mysql_config()).await.unwrap();
    let lease = registry.lease(None).await.unwrap();

    let ErdOutcome::Rendered { diagram, table_count, .. } =
        ErdBuilder::default().build(&lease, None).await.unwrap()
    else {
        panic!("relational engine should render");
    };
    assert_eq!(table_count, 0);
    assert_eq!(diagram.source, EMPTY_DIAGRAM);
}

#[tokio::test]
async fn test_builder_document_engine_not_applicable() {
    let (registry, log) = mock_registry(shop_behavior());
    registry
        .connect(EngineConfig::new(EngineKind::MongoDb).with_database("shop"))
        .await
        .unwrap();
    let lease = registry.lease(None).await.unwrap();

    let outcome = ErdBuilder::default().build(&lease, None).await.unwrap();
    match outcome {
        ErdOutcome::NotApplicable { engine, reason } => {
            assert_eq!(engine, EngineKind::MongoDb);
            assert!(reason.contains("foreign keys"));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(log.count("list_tables"), 0);
    assert_eq!(log.count("describe"), 0);
}

#[tokio::test]
async fn test_erd_outcome_serializes_with_status_tag() {
    let (registry, _) = mock_registry(MockBehavior::default());
    registry
        .connect(EngineConfig::new(EngineKind::MongoDb))
        .await
        .unwrap();
    let lease = registry.lease(None).await.unwrap();

    let outcome = ErdBuilder::default().build(&lease, None).await.unwrap();
    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value["status"], "not_applicable");
    assert_eq!(value["engine"], "mongodb");
}
