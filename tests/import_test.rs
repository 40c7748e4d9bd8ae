//! Script import tests: file reading and input validation.

mod common;

use common::{MockBehavior, mock_registry, mysql_config};
use db_gateway::error::ErrorKind;
use db_gateway::tools::ImportInput;
use db_gateway::tools::ImportToolHandler;
use db_gateway::tools::import::read_script;
use std::io::Write;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_read_script_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "CREATE TABLE t (id INT);").unwrap();
    writeln!(file, "INSERT INTO t VALUES (1);").unwrap();

    let script = read_script(file.path()).await.unwrap();
    assert!(script.starts_with("CREATE TABLE t"));
    assert_eq!(script.lines().count(), 2);
}

#[tokio::test]
async fn test_read_script_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_script(dir.path().join("missing.sql")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_read_script_rejects_binary() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&[0xff, 0xfe, 0x00, 0x80]).unwrap();

    let err = read_script(file.path()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_import_requires_exactly_one_source() {
    let (registry, log) = mock_registry(MockBehavior::default());
    registry.connect(mysql_config()).await.unwrap();
    let handler = ImportToolHandler::new(registry);

    let err = handler.import(ImportInput::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let both = ImportInput {
        script: Some("SELECT 1".to_string()),
        path: Some("/tmp/x.sql".to_string()),
        database: None,
    };
    let err = handler.import(both).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(log.count("execute_start"), 0);
}

#[tokio::test]
async fn test_import_file_submits_one_payload() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "INSERT INTO t VALUES (1);\nINSERT INTO t VALUES (2);").unwrap();

    let (registry, log) = mock_registry(MockBehavior::default());
    registry.connect(mysql_config()).await.unwrap();
    let handler = ImportToolHandler::new(registry);

    let output = handler
        .import(ImportInput {
            script: None,
            path: Some(file.path().display().to_string()),
            database: Some("shop".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(
        output.bytes,
        "INSERT INTO t VALUES (1);\nINSERT INTO t VALUES (2);".len()
    );
    assert_eq!(log.count("execute_start"), 1);
}

#[tokio::test]
async fn test_import_without_session() {
    let (registry, _) = mock_registry(MockBehavior::default());
    let handler = ImportToolHandler::new(registry);

    let err = handler
        .import(ImportInput {
            script: Some("SELECT 1".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotConnected);
}
