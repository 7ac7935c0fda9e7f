//! Integration tests for storage persistence
//!
//! These tests verify that:
//! - Statuses written by a cycle survive a restart
//! - Deleting an application keeps its servers, unassigned
//! - Dangling application references are rejected
//! - Writes against vanished rows affect nothing

use std::sync::Arc;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use server_inventory::{
    ApplicationStatus, ServerKind, ServerStatus, StatusEngine,
    storage::{StatusStore, StorageError, sqlite::SqliteStore},
};
use tempfile::tempdir;

use crate::helpers::*;

#[tokio::test]
async fn test_cycle_results_survive_restart() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("inventory.db");

    let (web_id, db_id, app_id) = {
        let store = Arc::new(SqliteStore::new(&db_path).await.unwrap());
        let app = store
            .create_application(create_test_application("shop"))
            .await
            .unwrap();
        let mut web = create_test_server("web", ONLINE_PORT, Some(app.id));
        web.kind = ServerKind::from_label("Web");
        let web = store.create_server(web).await.unwrap();
        let db = store
            .create_server(create_test_server("db", 5432, Some(app.id)))
            .await
            .unwrap();

        let engine = StatusEngine::new(store.clone(), Arc::new(StubProber), 4);
        let report = engine.run_cycle().await.unwrap();
        assert_eq!(report.failures, 0);

        store.close().await;
        (web.id, db.id, app.id)
    };

    let store = SqliteStore::new(&db_path).await.unwrap();

    let web = store.get_server(web_id).await.unwrap().unwrap();
    assert_eq!(web.status, ServerStatus::Online);
    assert_eq!(web.kind, ServerKind::Http { tls: false });
    assert_eq!(web.owner_name.as_deref(), Some("ops"));
    assert!(web.last_checked.is_some());

    let db = store.get_server(db_id).await.unwrap().unwrap();
    assert_eq!(db.status, ServerStatus::Offline);
    assert_eq!(db.message, "connection refused");

    let app = store.get_application(app_id).await.unwrap().unwrap();
    assert_eq!(app.status, ApplicationStatus::Partial);
    assert_eq!(app.message, "1/2 servers online");

    let members = store.list_applications_with_member_statuses().await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(
        members[0].statuses,
        vec![ServerStatus::Online, ServerStatus::Offline]
    );

    store.close().await;
}

#[tokio::test]
async fn test_new_entities_start_unknown() {
    let temp_dir = tempdir().unwrap();
    let store = SqliteStore::new(temp_dir.path().join("inventory.db"))
        .await
        .unwrap();

    let app = store
        .create_application(create_test_application("fresh"))
        .await
        .unwrap();
    let server = store
        .create_server(create_test_server("fresh-1", 22, Some(app.id)))
        .await
        .unwrap();

    assert_eq!(app.status, ApplicationStatus::Unknown);
    assert_eq!(server.status, ServerStatus::Unknown);
    assert_eq!(server.message, "");
    assert!(server.last_checked.is_none());
}

#[tokio::test]
async fn test_delete_application_unassigns_members() {
    let temp_dir = tempdir().unwrap();
    let store = SqliteStore::new(temp_dir.path().join("inventory.db"))
        .await
        .unwrap();

    let app = store
        .create_application(create_test_application("legacy"))
        .await
        .unwrap();
    let server = store
        .create_server(create_test_server("legacy-1", 22, Some(app.id)))
        .await
        .unwrap();

    assert!(store.delete_application(app.id).await.unwrap());
    assert!(!store.delete_application(app.id).await.unwrap());

    let server = store.get_server(server.id).await.unwrap().unwrap();
    assert_eq!(server.application_id, None);
    assert!(store.get_application_members(app.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dangling_reference_is_rejected() {
    let temp_dir = tempdir().unwrap();
    let store = SqliteStore::new(temp_dir.path().join("inventory.db"))
        .await
        .unwrap();

    let result = store
        .create_server(create_test_server("orphan", 22, Some(404)))
        .await;
    assert_matches!(result, Err(StorageError::InvalidReference(_)));

    assert!(store.list_all_servers().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_status_write_on_deleted_rows() {
    let temp_dir = tempdir().unwrap();
    let store = SqliteStore::new(temp_dir.path().join("inventory.db"))
        .await
        .unwrap();

    let server = store
        .create_server(create_test_server("gone", 22, None))
        .await
        .unwrap();
    assert!(store.delete_server(server.id).await.unwrap());

    let affected = store
        .write_server_status(server.id, ServerStatus::Online, "ok")
        .await
        .unwrap();
    assert_eq!(affected, 0);

    let affected = store
        .write_application_status(77, ApplicationStatus::Online, "all servers online")
        .await
        .unwrap();
    assert_eq!(affected, 0);
}
