//! Cycle behaviour under failures
//!
//! - A panicking probe marks its server `error`, everything else proceeds
//! - A server deleted mid-cycle is skipped quietly
//! - Applications are aggregated from the statuses just written
//! - A failed status write is counted and the rest of the cycle persists

use std::sync::Arc;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use server_inventory::{
    ApplicationStatus, ServerStatus, StatusEngine,
    storage::{MemoryStore, StatusStore, StorageError},
};

use crate::helpers::*;

#[tokio::test]
async fn test_panicking_probe_does_not_stop_the_cycle() {
    let (store, engine) = memory_engine();
    let app = store
        .create_application(create_test_application("shop"))
        .await
        .unwrap();
    let healthy = store
        .create_server(create_test_server("web", ONLINE_PORT, Some(app.id)))
        .await
        .unwrap();
    let broken = store
        .create_server(create_test_server("db", PANIC_PORT, Some(app.id)))
        .await
        .unwrap();
    let down = store
        .create_server(create_test_server("cache", 6379, None))
        .await
        .unwrap();

    let report = engine.run_cycle().await.unwrap();

    assert_eq!(report.failures, 1);
    assert_eq!(report.servers.len(), 3);

    let healthy = store.get_server(healthy.id).await.unwrap().unwrap();
    assert_eq!(healthy.status, ServerStatus::Online);

    let broken = store.get_server(broken.id).await.unwrap().unwrap();
    assert_eq!(broken.status, ServerStatus::Error);
    assert!(
        broken.message.starts_with("probe failed:"),
        "unexpected message: {}",
        broken.message
    );

    let down = store.get_server(down.id).await.unwrap().unwrap();
    assert_eq!(down.status, ServerStatus::Offline);
    assert_eq!(down.message, "connection refused");

    let app = store.get_application(app.id).await.unwrap().unwrap();
    assert_eq!(app.status, ApplicationStatus::Partial);
    assert_eq!(app.message, "1/2 servers online");
    assert!(app.last_checked.is_some());
}

#[tokio::test]
async fn test_server_deleted_mid_cycle_is_skipped() {
    let store = Arc::new(MemoryStore::new());
    let victim = store
        .create_server(create_test_server("doomed", 22, None))
        .await
        .unwrap();
    let survivor = store
        .create_server(create_test_server("survivor", 22, None))
        .await
        .unwrap();

    let prober = DeletingProber {
        store: store.clone(),
        victim: victim.id,
    };
    let engine = StatusEngine::new(store.clone(), Arc::new(prober), 2);

    let report = engine.run_cycle().await.unwrap();

    assert_eq!(report.failures, 0);
    let persisted: Vec<(i64, bool)> = report
        .servers
        .iter()
        .map(|check| (check.server_id, check.persisted))
        .collect();
    assert_eq!(persisted, vec![(victim.id, false), (survivor.id, true)]);

    assert!(store.get_server(victim.id).await.unwrap().is_none());
    let survivor = store.get_server(survivor.id).await.unwrap().unwrap();
    assert_eq!(survivor.status, ServerStatus::Online);
}

#[tokio::test]
async fn test_empty_inventory_cycle() {
    let (_store, engine) = memory_engine();

    let report = engine.run_cycle().await.unwrap();

    assert!(report.servers.is_empty());
    assert!(report.applications.is_empty());
    assert!(report.finished_at >= report.started_at);
}

#[tokio::test]
async fn test_application_status_follows_member_changes() {
    let (store, engine) = memory_engine();
    let app = store
        .create_application(create_test_application("api"))
        .await
        .unwrap();
    let server = store
        .create_server(create_test_server("api-1", 8080, Some(app.id)))
        .await
        .unwrap();

    engine.run_cycle().await.unwrap();
    let stored = store.get_application(app.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ApplicationStatus::Offline);
    assert_eq!(stored.message, "all servers offline");

    let mut update = create_test_server("api-1", ONLINE_PORT, Some(app.id));
    update.hostname = "10.1.1.1".to_string();
    store.update_server(server.id, update).await.unwrap();

    engine.run_cycle().await.unwrap();
    let stored = store.get_application(app.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ApplicationStatus::Online);
    assert_eq!(stored.message, "all servers online");
}

#[tokio::test]
async fn test_test_all_twice_gives_same_statuses() {
    let (store, engine) = memory_engine();
    let app = store
        .create_application(create_test_application("shop"))
        .await
        .unwrap();
    for (name, port) in [("a", ONLINE_PORT), ("b", ONLINE_PORT), ("c", 9)] {
        store
            .create_server(create_test_server(name, port, Some(app.id)))
            .await
            .unwrap();
    }

    engine.test_all().await.unwrap();
    let first = store.list_all_servers().await.unwrap();
    let first_app = store.get_application(app.id).await.unwrap().unwrap();

    engine.test_all().await.unwrap();
    let second = store.list_all_servers().await.unwrap();
    let second_app = store.get_application(app.id).await.unwrap().unwrap();

    let statuses = |servers: &[server_inventory::Server]| {
        servers
            .iter()
            .map(|s| (s.id, s.status, s.message.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(statuses(&first), statuses(&second));
    assert_eq!(first_app.status, second_app.status);
    assert_eq!(second_app.message, "2/3 servers online");
}

#[tokio::test]
async fn test_failed_status_write_does_not_stop_the_cycle() {
    // ids are handed out from 1, so the second server is the one that fails
    let store = Arc::new(FailingStore::failing_writes_for(2));
    let engine = StatusEngine::new(store.clone(), Arc::new(StubProber), 4);

    let app = store
        .create_application(create_test_application("shop"))
        .await
        .unwrap();
    let web = store
        .create_server(create_test_server("web", ONLINE_PORT, Some(app.id)))
        .await
        .unwrap();
    let db = store
        .create_server(create_test_server("db", ONLINE_PORT, Some(app.id)))
        .await
        .unwrap();
    assert_eq!(db.id, 2);

    let report = engine.run_cycle().await.unwrap();

    assert_eq!(report.failures, 1);
    let db_check = report.servers.iter().find(|s| s.server_id == db.id).unwrap();
    assert!(!db_check.persisted);
    let web_check = report.servers.iter().find(|s| s.server_id == web.id).unwrap();
    assert!(web_check.persisted);

    let web = store.get_server(web.id).await.unwrap().unwrap();
    assert_eq!(web.status, ServerStatus::Online);
    let db = store.get_server(db.id).await.unwrap().unwrap();
    assert_eq!(db.status, ServerStatus::Unknown);

    // aggregation sees what was actually stored
    assert_eq!(report.applications.len(), 1);
    assert!(report.applications[0].persisted);
    let app = store.get_application(app.id).await.unwrap().unwrap();
    assert_eq!(app.status, ApplicationStatus::Partial);
    assert_eq!(app.message, "1/2 servers online");
}

#[tokio::test]
async fn test_failed_listing_returns_storage_error() {
    let store = Arc::new(FailingStore::failing_listings(1));
    let engine = StatusEngine::new(store.clone(), Arc::new(StubProber), 4);
    store
        .create_server(create_test_server("web", ONLINE_PORT, None))
        .await
        .unwrap();

    assert_matches!(engine.run_cycle().await, Err(StorageError::QueryFailed(_)));

    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.count_servers(ServerStatus::Online), 1);
}
